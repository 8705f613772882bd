//! Fee calculations for cross-venue arbitrage.
//!
//! Fee model per the Detector's step 5: `fee_leg_a = size * fee_rate_a`,
//! `fee_leg_b = size * fee_rate_b + blockchain_fixed_cost`. Sizes here are
//! always USD notional, not per-contract prices — the venue clients handle
//! cents/decimal conversion on their own side.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::VenueId;

/// Default venue-A fee rate (0.7% of notional).
pub const VENUE_A_DEFAULT_FEE_RATE: Decimal = dec!(0.007);

/// Default venue-B fee rate (0.01% of notional).
pub const VENUE_B_DEFAULT_FEE_RATE: Decimal = dec!(0.0001);

/// Default fixed per-trade blockchain settlement cost for venue B.
pub const VENUE_B_DEFAULT_BLOCKCHAIN_COST: Decimal = dec!(0.10);

/// Configuration for fee calculations, mirroring `config::FeesConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    pub venue_a_fee_rate: Decimal,
    pub venue_b_fee_rate: Decimal,
    pub blockchain_cost_usd: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            venue_a_fee_rate: VENUE_A_DEFAULT_FEE_RATE,
            venue_b_fee_rate: VENUE_B_DEFAULT_FEE_RATE,
            blockchain_cost_usd: VENUE_B_DEFAULT_BLOCKCHAIN_COST,
        }
    }
}

impl FeeConfig {
    #[must_use]
    pub fn new(venue_a_fee_rate: Decimal, venue_b_fee_rate: Decimal, blockchain_cost_usd: Decimal) -> Self {
        Self {
            venue_a_fee_rate,
            venue_b_fee_rate,
            blockchain_cost_usd,
        }
    }
}

/// Detailed breakdown of fees on one arbitrage leg pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArbitrageFees {
    pub fee_leg_a: Decimal,
    pub fee_leg_b: Decimal,
    pub total_fee: Decimal,
}

impl ArbitrageFees {
    /// Fees as a fraction of the given position size (for subtracting from gross edge).
    #[must_use]
    pub fn as_edge_fraction(&self, size: Decimal) -> Decimal {
        if size == Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.total_fee / size
    }
}

/// Calculator for cross-venue arbitrage fees.
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    config: FeeConfig,
}

impl FeeCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: FeeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(config: FeeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Fee rate that applies to one leg's venue, including venue B's fixed
    /// blockchain cost folded in as an edge-fraction-equivalent of a unit size.
    #[must_use]
    pub fn fee_rate_for_venue(&self, venue: VenueId) -> Decimal {
        match venue {
            VenueId::VenueA => self.config.venue_a_fee_rate,
            VenueId::VenueB => self.config.venue_b_fee_rate,
        }
    }

    /// Computes `fee_leg_a` and `fee_leg_b` for a given position size, per
    /// the Detector's step 5 fee model.
    #[must_use]
    pub fn calculate_arbitrage_fees(&self, size: Decimal) -> ArbitrageFees {
        let fee_leg_a = size * self.config.venue_a_fee_rate;
        let fee_leg_b = size * self.config.venue_b_fee_rate + self.config.blockchain_cost_usd;
        ArbitrageFees {
            fee_leg_a,
            fee_leg_b,
            total_fee: fee_leg_a + fee_leg_b,
        }
    }

    /// `net_edge = gross_edge - (fee_leg_a + fee_leg_b) / size`.
    #[must_use]
    pub fn net_edge(&self, gross_edge: Decimal, size: Decimal) -> Decimal {
        let fees = self.calculate_arbitrage_fees(size);
        gross_edge - fees.as_edge_fraction(size)
    }
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_config_default_matches_spec_rates() {
        let config = FeeConfig::default();
        assert_eq!(config.venue_a_fee_rate, dec!(0.007));
        assert_eq!(config.venue_b_fee_rate, dec!(0.0001));
        assert_eq!(config.blockchain_cost_usd, dec!(0.10));
    }

    #[test]
    fn calculate_arbitrage_fees_matches_formula() {
        let calc = FeeCalculator::new();
        let fees = calc.calculate_arbitrage_fees(dec!(1000));

        assert_eq!(fees.fee_leg_a, dec!(7.000));
        assert_eq!(fees.fee_leg_b, dec!(0.10) + dec!(0.1000));
        assert_eq!(fees.total_fee, fees.fee_leg_a + fees.fee_leg_b);
    }

    #[test]
    fn net_edge_subtracts_fee_fraction() {
        let calc = FeeCalculator::new();
        let net = calc.net_edge(dec!(0.02), dec!(1000));
        let fees = calc.calculate_arbitrage_fees(dec!(1000));
        assert_eq!(net, dec!(0.02) - fees.total_fee / dec!(1000));
    }

    #[test]
    fn zero_size_has_zero_edge_fraction() {
        let fees = ArbitrageFees {
            fee_leg_a: dec!(0),
            fee_leg_b: dec!(0),
            total_fee: dec!(0),
        };
        assert_eq!(fees.as_edge_fraction(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn fee_rate_for_venue_selects_correct_rate() {
        let calc = FeeCalculator::new();
        assert_eq!(calc.fee_rate_for_venue(VenueId::VenueA), dec!(0.007));
        assert_eq!(calc.fee_rate_for_venue(VenueId::VenueB), dec!(0.0001));
    }
}
