//! chainroute CLI — compare bridge routes and network fees from the terminal.
//!
//! # Commands
//! ```text
//! chainroute routes    --from ethereum --to arbitrum --amount 250 [--token USDC] [--weights 1,0,0]
//! chainroute fees      [--network stellar|layerzero|hop|all]
//! chainroute providers
//! chainroute circuits  [--probe]
//! chainroute info
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use chainroute_aggregator::{BridgeAggregator, FeeEstimationService, RankingWeights, RouteRanker};
use chainroute_core::{FeeNetwork, PolicyRegistry, RateLimitedClient, RouteRequest};
use chainroute_http::ReqwestTransport;

mod logging;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(
    name = "chainroute",
    about = "Compare cross-chain bridge routes and network fees",
    long_about = "
ChainRoute queries every configured bridge and fee provider concurrently,
guards each one with its own rate limiter and circuit breaker, and falls
back to cached or static data when a provider is down.

ENVIRONMENT VARIABLES:
  RUST_LOG    Overrides the log filter from the settings file
",
    version
)]
struct Cli {
    /// JSON settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print client metrics and circuit state to stderr when done
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote a transfer on every enabled bridge and rank the results
    Routes {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Human-readable amount, e.g. 250.5
        #[arg(long)]
        amount: String,
        /// Token symbol or contract address
        #[arg(long)]
        token: Option<String>,
        /// Slippage tolerance in percent
        #[arg(long)]
        slippage: Option<f64>,
        #[arg(long)]
        recipient: Option<String>,
        /// Ranking weights as cost,latency,reliability
        #[arg(long)]
        weights: Option<RankingWeights>,
        /// Include per-dimension scores
        #[arg(long)]
        scores: bool,
    },

    /// Fee estimates for one network or all of them
    Fees {
        #[arg(long, default_value = "all")]
        network: String,
    },

    /// List configured providers
    Providers,

    /// Show circuit breaker state per provider group
    Circuits {
        /// Query every fee oracle first so the breakers see traffic
        #[arg(long)]
        probe: bool,
    },

    /// Show build and capability info
    Info,
}

/// Everything a command needs, built once from settings.
struct App {
    settings: Settings,
    client: Arc<RateLimitedClient>,
    aggregator: BridgeAggregator,
    fees: FeeEstimationService,
}

impl App {
    fn build(settings: Settings) -> Result<Self> {
        let transport = Arc::new(
            ReqwestTransport::new(settings.transport_config()).context("building HTTP transport")?,
        );
        let registry = Arc::new(PolicyRegistry::new(settings.registry_config()));
        let client = Arc::new(RateLimitedClient::new(
            transport,
            registry,
            settings.client_config(),
        ));
        let providers = chainroute_providers::build_all(client.clone(), settings.providers.clone());
        let aggregator = BridgeAggregator::new(providers.bridges, settings.aggregator_config());
        let fees = FeeEstimationService::new(providers.oracles, settings.fee_config());
        tracing::debug!(
            bridges = ?aggregator.enabled_providers(),
            networks = ?fees.networks(),
            "chainroute ready"
        );
        Ok(Self {
            settings,
            client,
            aggregator,
            fees,
        })
    }

    /// Client groups of the configured providers.
    fn provider_groups(&self) -> Vec<(&'static str, &str, bool)> {
        let p = &self.settings.providers;
        vec![
            ("stellar", p.stellar.group.as_str(), p.stellar.enabled),
            ("layerzero", p.layerzero.group.as_str(), p.layerzero.enabled),
            ("hop", p.hop.group.as_str(), p.hop.enabled),
        ]
    }

    fn diagnostics(&self) -> serde_json::Value {
        json!({
            "metrics": self.client.metrics(),
            "circuits": self.client.registry().circuit_statuses(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.verbose {
        settings.log.level = "debug".into();
    }
    logging::init_tracing(&settings.log);

    if let Commands::Info = cli.command {
        return cmd_info();
    }

    let app = App::build(settings)?;
    run(&app, cli.command).await?;

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&app.diagnostics())?);
    }
    Ok(())
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Routes {
            from,
            to,
            amount,
            token,
            slippage,
            recipient,
            weights,
            scores,
        } => {
            let mut req = RouteRequest::new(from, to, amount);
            req.token_address = token;
            req.slippage_tolerance = slippage;
            req.recipient_address = recipient;
            cmd_routes(app, &req, weights, scores).await
        }
        Commands::Fees { network } => cmd_fees(app, &network).await,
        Commands::Providers => cmd_providers(app),
        Commands::Circuits { probe } => cmd_circuits(app, probe).await,
        Commands::Info => cmd_info(),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_routes(
    app: &App,
    req: &RouteRequest,
    weights: Option<RankingWeights>,
    scores: bool,
) -> Result<()> {
    let weights = weights.unwrap_or(app.settings.aggregator.weights);
    let result = app.aggregator.get_routes_weighted(req, &weights).await;

    let mut out = serde_json::to_value(&result)?;
    if scores {
        let scored = RouteRanker::new().rank_scored(result.routes.clone(), &weights);
        out["scores"] = scored
            .iter()
            .map(|s| json!({ "id": s.route.id, "provider": s.route.provider, "score": s.score, "breakdown": s.breakdown }))
            .collect();
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_fees(app: &App, network: &str) -> Result<()> {
    let out = if network.eq_ignore_ascii_case("all") {
        serde_json::to_value(app.fees.get_all_fee_estimates().await)?
    } else {
        let network: FeeNetwork = network.parse()?;
        serde_json::to_value(app.fees.get_fee_estimate(network).await)?
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_providers(app: &App) -> Result<()> {
    let p = &app.settings.providers;
    let out = json!([
        {
            "name": "stellar",
            "enabled": p.stellar.enabled,
            "group": p.stellar.group,
            "baseUrl": p.stellar.horizon_url,
            "roles": ["fees"],
        },
        {
            "name": "layerzero",
            "enabled": p.layerzero.enabled,
            "group": p.layerzero.group,
            "baseUrl": p.layerzero.base_url,
            "fallbackEnabled": p.layerzero.fallback_enabled,
            "roles": ["routes", "fees"],
        },
        {
            "name": "hop",
            "enabled": p.hop.enabled,
            "group": p.hop.group,
            "baseUrl": p.hop.base_url,
            "fallbackEnabled": p.hop.fallback_enabled,
            "roles": ["routes", "fees"],
        },
    ]);
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_circuits(app: &App, probe: bool) -> Result<()> {
    if probe {
        app.fees.get_all_fee_estimates().await;
    }
    let registry = app.client.registry();
    let statuses: Vec<_> = app
        .provider_groups()
        .into_iter()
        .filter(|(_, _, enabled)| *enabled)
        .filter_map(|(provider, group, _)| {
            // Untouched groups start closed; materialize them so they show up.
            registry.group(group);
            let status = registry.circuit_status(group)?;
            Some(json!({ "provider": provider, "status": status }))
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&statuses)?);
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("ChainRoute v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Providers:");
    println!("  stellar     Horizon fee_stats              (fees)");
    println!("  layerzero   estimate-fees                  (routes, fees)");
    println!("  hop         v1/quote                       (routes, fees)");
    println!();
    println!("Resilience:");
    println!("  ✓ Token bucket per provider group      (default 10 burst, 10/s)");
    println!("  ✓ Circuit breaker per provider group   (default 5 failures, 30s recovery)");
    println!("  ✓ Retry with full-jitter backoff       (default 3 retries, Retry-After aware)");
    println!("  ✓ Global concurrency cap               (default 10 in flight)");
    println!("  ✓ Live → cache → static fallback       (default 5 min cache)");
    println!();
    println!("Ranking:     weighted cost / latency / reliability, min–max normalized");
    println!("Fee networks: {}", FeeNetwork::ALL.map(|n| n.as_str()).join(", "));
    Ok(())
}
