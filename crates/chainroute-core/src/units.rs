//! Conversion between human-readable decimal amounts and smallest-unit integers.
//!
//! Upstreams disagree on precision: Stellar fees come in stroops (7 decimals),
//! EVM native fees in wei (18 decimals), stable tokens in 6 decimals.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Stellar lumens: 1 XLM = 10^7 stroops.
pub const STELLAR_DECIMALS: u32 = 7;
/// EVM native gas tokens: 1 ETH = 10^18 wei.
pub const EVM_NATIVE_DECIMALS: u32 = 18;
/// USDC / USDT.
pub const STABLE_DECIMALS: u32 = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount out of range: {0}")]
    Overflow(String),
    #[error("unsupported precision: {0} decimals")]
    Precision(u32),
}

fn scale_factor(decimals: u32) -> Result<Decimal, UnitsError> {
    10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(UnitsError::Precision(decimals))
}

/// Parse a decimal string such as `"100.25"`.
pub fn parse_amount(raw: &str) -> Result<Decimal, UnitsError> {
    let amount = Decimal::from_str(raw.trim()).map_err(|_| UnitsError::Invalid(raw.to_string()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UnitsError::Negative(raw.to_string()));
    }
    Ok(amount)
}

/// `100.25` with 6 decimals → `100250000`. Digits beyond `decimals` are truncated.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u128, UnitsError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UnitsError::Negative(amount.to_string()));
    }
    amount
        .checked_mul(scale_factor(decimals)?)
        .and_then(|scaled| scaled.trunc().to_u128())
        .ok_or_else(|| UnitsError::Overflow(amount.to_string()))
}

/// `"100250000"` with 6 decimals → `100.25`.
pub fn from_base_units(raw: &str, decimals: u32) -> Result<Decimal, UnitsError> {
    let raw = raw.trim();
    let value: i128 = raw.parse().map_err(|_| UnitsError::Invalid(raw.to_string()))?;
    if value < 0 {
        return Err(UnitsError::Negative(raw.to_string()));
    }
    if decimals > 28 {
        return Err(UnitsError::Precision(decimals));
    }
    Decimal::try_from_i128_with_scale(value, decimals)
        .map(|d| d.normalize())
        .map_err(|_| UnitsError::Overflow(raw.to_string()))
}

/// Integer smallest-unit amount → decimal.
pub fn from_base_units_u128(value: u128, decimals: u32) -> Result<Decimal, UnitsError> {
    from_base_units(&value.to_string(), decimals)
}

/// Apply a basis-point rate and round down to the token's precision.
/// The result never exceeds `amount`.
pub fn apply_bps(amount: Decimal, bps: u32, decimals: u32) -> Decimal {
    let fee = (amount / Decimal::from(10_000u32))
        .checked_mul(Decimal::from(bps))
        .map_or(amount, |fee| fee.min(amount));
    fee.round_dp_with_strategy(decimals, rust_decimal::RoundingStrategy::ToZero)
}

/// `fee / input * 100`, or zero when the input is zero.
///
/// Saturates at `f64::MAX` when the ratio does not fit a `Decimal`, e.g. a
/// whole-unit fee on a dust-sized input.
pub fn percentage_of(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|pct| pct.to_f64())
        .unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stable_round_trip() {
        assert_eq!(to_base_units(dec!(100.25), STABLE_DECIMALS).unwrap(), 100_250_000);
        assert_eq!(from_base_units("100250000", STABLE_DECIMALS).unwrap(), dec!(100.25));
    }

    #[test]
    fn stroops_to_xlm() {
        assert_eq!(from_base_units("100", STELLAR_DECIMALS).unwrap(), dec!(0.00001));
    }

    #[test]
    fn wei_to_eth() {
        let eth = from_base_units("1234500000000000000", EVM_NATIVE_DECIMALS).unwrap();
        assert_eq!(eth, dec!(1.2345));
    }

    #[test]
    fn excess_precision_is_truncated() {
        assert_eq!(to_base_units(dec!(1.0000009), STABLE_DECIMALS).unwrap(), 1_000_000);
    }

    #[test]
    fn rejects_garbage_and_negatives() {
        assert!(matches!(parse_amount("abc"), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_amount("-1"), Err(UnitsError::Negative(_))));
        assert!(matches!(from_base_units("-5", 6), Err(UnitsError::Negative(_))));
    }

    #[test]
    fn bps_scaled_to_token_precision() {
        // 4 bps of 1000.123456 USDC = 0.40004938... → 0.400049
        assert_eq!(apply_bps(dec!(1000.123456), 4, STABLE_DECIMALS), dec!(0.400049));
    }

    #[test]
    fn percentage() {
        assert_eq!(percentage_of(dec!(1), dec!(100)), 1.0);
        assert_eq!(percentage_of(dec!(1), Decimal::ZERO), 0.0);
    }

    #[test]
    fn percentage_of_dust_input_saturates() {
        let dust = Decimal::from_str("0.0000000000000000000000000001").unwrap();
        assert_eq!(percentage_of(dec!(1), dust), f64::MAX);
        assert_eq!(percentage_of(Decimal::MAX, dec!(0.5)), f64::MAX);
    }

    #[test]
    fn bps_never_exceeds_amount() {
        assert_eq!(apply_bps(dec!(10), 20_000, STABLE_DECIMALS), dec!(10));
        assert!(apply_bps(Decimal::MAX, 18, 0) < Decimal::MAX);
    }
}
