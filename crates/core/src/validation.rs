//! Boundary input validation shared by the venue clients and the CLI.
//!
//! These checks run at the edges: before a ticker/quantity/price/size crosses
//! into a venue client call or out to the journal. Internal code that already
//! holds validated values should not re-validate.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

static TICKER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").expect("static pattern is valid"));

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("ticker '{0}' does not match ^[A-Za-z0-9_-]{{1,50}}$")]
    BadTicker(String),
    #[error("quantity {0} is outside [1, 100000]")]
    QuantityOutOfRange(i64),
    #[error("price {0} is outside the open interval (0, 1)")]
    PriceOutOfRange(Decimal),
    #[error("size {0} is outside [10, 1000000] USD")]
    SizeOutOfRange(Decimal),
}

/// Validates a venue market ticker/identifier.
///
/// # Errors
///
/// Returns [`ValidationError::BadTicker`] if the ticker is empty, too long,
/// or contains characters outside `[A-Za-z0-9_-]`.
pub fn validate_ticker(ticker: &str) -> Result<(), ValidationError> {
    if TICKER_PATTERN.is_match(ticker) {
        Ok(())
    } else {
        Err(ValidationError::BadTicker(ticker.to_string()))
    }
}

/// Validates an order quantity (contracts/shares), inclusive of both bounds.
///
/// # Errors
///
/// Returns [`ValidationError::QuantityOutOfRange`] outside `[1, 100_000]`.
pub fn validate_quantity(quantity: i64) -> Result<(), ValidationError> {
    if (1..=100_000).contains(&quantity) {
        Ok(())
    } else {
        Err(ValidationError::QuantityOutOfRange(quantity))
    }
}

/// Validates a per-contract price, which must sit strictly between 0 and 1.
///
/// # Errors
///
/// Returns [`ValidationError::PriceOutOfRange`] if `price <= 0` or `price >= 1`.
pub fn validate_price(price: Decimal) -> Result<(), ValidationError> {
    if price > Decimal::ZERO && price < Decimal::ONE {
        Ok(())
    } else {
        Err(ValidationError::PriceOutOfRange(price))
    }
}

/// Validates a USD position size, inclusive of both bounds.
///
/// # Errors
///
/// Returns [`ValidationError::SizeOutOfRange`] outside `[10, 1_000_000]`.
pub fn validate_size_usd(size: Decimal) -> Result<(), ValidationError> {
    if size >= dec!(10) && size <= dec!(1_000_000) {
        Ok(())
    } else {
        Err(ValidationError::SizeOutOfRange(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_accepts_alnum_dash_underscore() {
        assert!(validate_ticker("PRES-2024-DEM").is_ok());
        assert!(validate_ticker("abc_123").is_ok());
    }

    #[test]
    fn ticker_rejects_empty_and_bad_chars() {
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("has space").is_err());
        assert!(validate_ticker("slash/es").is_err());
    }

    #[test]
    fn ticker_rejects_over_length() {
        let long = "A".repeat(51);
        assert!(validate_ticker(&long).is_err());
        let max = "A".repeat(50);
        assert!(validate_ticker(&max).is_ok());
    }

    #[test]
    fn quantity_boundaries_are_inclusive() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100_000).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(100_001).is_err());
    }

    #[test]
    fn price_is_strictly_exclusive_at_bounds() {
        assert!(validate_price(Decimal::ZERO).is_err());
        assert!(validate_price(Decimal::ONE).is_err());
        assert!(validate_price(dec!(0.5)).is_ok());
        assert!(validate_price(dec!(0.001)).is_ok());
    }

    #[test]
    fn size_boundaries_are_inclusive() {
        assert!(validate_size_usd(dec!(10)).is_ok());
        assert!(validate_size_usd(dec!(1_000_000)).is_ok());
        assert!(validate_size_usd(dec!(9.99)).is_err());
        assert!(validate_size_usd(dec!(1_000_000.01)).is_err());
    }
}
