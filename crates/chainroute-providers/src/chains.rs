//! Chain name normalization shared by the adapters.

/// Lower-case a chain name and fold common aliases onto one slug.
pub fn canonical(chain: &str) -> String {
    let lower = chain.trim().to_ascii_lowercase();
    let slug = match lower.as_str() {
        "eth" | "mainnet" | "ethereum-mainnet" => "ethereum",
        "matic" | "polygon-pos" => "polygon",
        "arb" | "arbitrum-one" | "arbitrum one" => "arbitrum",
        "op" | "optimism-mainnet" => "optimism",
        "xdai" => "gnosis",
        "bnb" | "binance" | "bnb-chain" => "bsc",
        "avax" => "avalanche",
        "arbitrum-nova" => "nova",
        "xlm" => "stellar",
        _ => return lower,
    };
    slug.to_string()
}

/// Symbol of the chain's native gas token.
pub fn native_currency(chain: &str) -> Option<&'static str> {
    match canonical(chain).as_str() {
        "ethereum" | "arbitrum" | "optimism" | "base" | "nova" => Some("ETH"),
        "polygon" => Some("MATIC"),
        "bsc" => Some("BNB"),
        "avalanche" => Some("AVAX"),
        "gnosis" => Some("XDAI"),
        "stellar" => Some("XLM"),
        _ => None,
    }
}
