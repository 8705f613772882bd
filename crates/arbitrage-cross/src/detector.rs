//! Cross-venue arbitrage opportunity detection.
//!
//! Given a paired event, quotes from both venues, the event's similarity
//! score, and the capital manager's available bankroll, works out whether
//! either trading direction is profitable after risk scoring, fees, and
//! liquidity/horizon gating, and sizes the winning direction by fractional
//! Kelly.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fees::FeeCalculator;
use crate::risk::RiskAnalyzer;
use crate::types::{Direction, Opportunity, PairedEvent, Quote, RiskTier};

/// Fraction of the Kelly-optimal size actually risked.
pub const KELLY_FRACTION: Decimal = dec!(0.25);

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DetectorRejection {
    #[error("gross edge below threshold")]
    SpreadBelowThreshold,
    #[error("risk tier {0:?} is not executable")]
    RiskTier(RiskTier),
    #[error("net edge is not positive after fees")]
    NetEdgeNonPositive,
    #[error("resting liquidity below target depth on at least one venue")]
    LiquidityFloor,
    #[error("horizon exceeds max_days_to_resolution and edge is not high enough to waive it")]
    HorizonExceeded,
    #[error("sized position is below the minimum trade size")]
    BelowMinimumSize,
    #[error("one or both legs are missing a quote")]
    MissingQuote,
}

/// Configuration for arbitrage detection, mirroring `config::TradingConfig`/
/// `config::CapitalConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub threshold_spread: Decimal,
    pub min_trade_size_usd: Decimal,
    pub max_trade_size_pct: Decimal,
    pub target_liquidity_depth: Decimal,
    pub max_days_to_resolution: i64,
    pub high_return_threshold: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_spread: dec!(0.01),
            min_trade_size_usd: dec!(10),
            max_trade_size_pct: dec!(0.10),
            target_liquidity_depth: dec!(500),
            max_days_to_resolution: 30,
            high_return_threshold: dec!(0.05),
        }
    }
}

impl DetectorConfig {
    /// Tighter thresholds, smaller positions, for lower-risk operation.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            threshold_spread: dec!(0.015),
            min_trade_size_usd: dec!(25),
            max_trade_size_pct: dec!(0.05),
            target_liquidity_depth: dec!(1000),
            max_days_to_resolution: 14,
            high_return_threshold: dec!(0.08),
        }
    }

    /// Looser thresholds for more opportunities.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            threshold_spread: dec!(0.005),
            min_trade_size_usd: dec!(10),
            max_trade_size_pct: dec!(0.15),
            target_liquidity_depth: dec!(200),
            max_days_to_resolution: 60,
            high_return_threshold: dec!(0.03),
        }
    }
}

struct DirectionCandidate {
    direction: Direction,
    price_leg1: Decimal,
    price_leg2: Decimal,
}

/// Detects and sizes cross-venue arbitrage opportunities.
pub struct CrossExchangeDetector {
    config: DetectorConfig,
    fee_calculator: FeeCalculator,
    risk_analyzer: RiskAnalyzer,
}

impl CrossExchangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            fee_calculator: FeeCalculator::new(),
            risk_analyzer: RiskAnalyzer::new(),
        }
    }

    #[must_use]
    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            config,
            fee_calculator: FeeCalculator::new(),
            risk_analyzer: RiskAnalyzer::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluates both trading directions for `pair` and returns the best
    /// surviving `Opportunity`, or the rejection reason for the better of
    /// the two directions if neither survives.
    pub fn detect(
        &self,
        pair: &PairedEvent,
        quote_a: &Quote,
        quote_b: &Quote,
        available_bankroll: Decimal,
    ) -> Result<Opportunity, DetectorRejection> {
        let candidates = self.build_candidates(quote_a, quote_b)?;

        let mut survivors = Vec::new();
        let mut last_rejection = DetectorRejection::MissingQuote;

        for candidate in candidates {
            match self.evaluate_direction(pair, &candidate, available_bankroll) {
                Ok(opp) => survivors.push(opp),
                Err(rejection) => last_rejection = rejection,
            }
        }

        survivors
            .into_iter()
            .max_by(|a, b| {
                a.expected_profit
                    .cmp(&b.expected_profit)
                    .then_with(|| a.annualized_roi.unwrap_or(Decimal::ZERO).cmp(&b.annualized_roi.unwrap_or(Decimal::ZERO)))
            })
            .ok_or(last_rejection)
    }

    fn build_candidates(&self, quote_a: &Quote, quote_b: &Quote) -> Result<Vec<DirectionCandidate>, DetectorRejection> {
        let mut candidates = Vec::new();

        if let (Some(yes_a), Some(no_b)) = (quote_a.best_yes, quote_b.best_no) {
            candidates.push(DirectionCandidate {
                direction: Direction::BuyYesANoB,
                price_leg1: yes_a,
                price_leg2: no_b,
            });
        }
        if let (Some(yes_b), Some(no_a)) = (quote_b.best_yes, quote_a.best_no) {
            candidates.push(DirectionCandidate {
                direction: Direction::BuyYesBNoA,
                price_leg1: yes_b,
                price_leg2: no_a,
            });
        }

        if candidates.is_empty() {
            return Err(DetectorRejection::MissingQuote);
        }
        Ok(candidates)
    }

    fn evaluate_direction(
        &self,
        pair: &PairedEvent,
        candidate: &DirectionCandidate,
        available_bankroll: Decimal,
    ) -> Result<Opportunity, DetectorRejection> {
        let spread = candidate.price_leg1 + candidate.price_leg2;
        let gross_edge = Decimal::ONE - spread;
        if gross_edge < self.config.threshold_spread {
            return Err(DetectorRejection::SpreadBelowThreshold);
        }

        let tentative_size = self.kelly_size(available_bankroll, gross_edge, Decimal::ONE);
        let assessment = self.risk_analyzer.analyze(pair, pair.similarity, gross_edge, tentative_size);
        if !assessment.should_execute() {
            return Err(DetectorRejection::RiskTier(assessment.tier));
        }

        let size = self.kelly_size(available_bankroll, gross_edge, assessment.size_multiplier);
        if size < self.config.min_trade_size_usd {
            return Err(DetectorRejection::BelowMinimumSize);
        }

        let fees = self.fee_calculator.calculate_arbitrage_fees(size);
        let net_edge = gross_edge - fees.as_edge_fraction(size);
        if net_edge <= Decimal::ZERO {
            return Err(DetectorRejection::NetEdgeNonPositive);
        }

        if pair.listing_a.resting_liquidity < self.config.target_liquidity_depth
            || pair.listing_b.resting_liquidity < self.config.target_liquidity_depth
        {
            return Err(DetectorRejection::LiquidityFloor);
        }

        let now = Utc::now();
        let horizon_days = pair
            .listing_a
            .resolution_time
            .or(pair.listing_b.resolution_time)
            .map(|t| {
                let seconds = (t - now).num_seconds().max(0);
                (seconds as f64 / 86_400.0).ceil() as i64
            });

        if let Some(days) = horizon_days {
            if days > self.config.max_days_to_resolution && net_edge < self.config.high_return_threshold {
                return Err(DetectorRejection::HorizonExceeded);
            }
        }

        let annualized_roi = horizon_days
            .filter(|&d| d > 0)
            .map(|d| net_edge * dec!(365) / Decimal::from(d));

        let expected_profit = size * net_edge;

        let (contracts_leg1, size_leg2) = match candidate.direction {
            Direction::BuyYesANoB => (
                (size / candidate.price_leg1).floor().to_i64().unwrap_or(0),
                size / candidate.price_leg2,
            ),
            Direction::BuyYesBNoA => (
                (size / candidate.price_leg2).floor().to_i64().unwrap_or(0),
                size / candidate.price_leg1,
            ),
        };

        debug!(?candidate.direction, %gross_edge, %net_edge, %size, "opportunity survived detection");

        Ok(Opportunity {
            paired_event: pair.clone(),
            direction: candidate.direction,
            price_leg1: candidate.price_leg1,
            price_leg2: candidate.price_leg2,
            spread,
            gross_edge,
            fee_leg1: fees.fee_leg_a,
            fee_leg2: fees.fee_leg_b,
            net_edge,
            position_size_quote: size,
            contracts_leg1,
            size_leg2,
            expected_profit,
            expected_roi: net_edge,
            horizon_days,
            annualized_roi,
            risk_tier: assessment.tier,
            risk_score: assessment.score,
            risk_warnings: assessment.warnings,
            detected_at: now,
        })
    }

    /// `size = min(bankroll * max_pct, bankroll * gross_edge * kelly_fraction) * risk_multiplier`.
    fn kelly_size(&self, bankroll: Decimal, gross_edge: Decimal, risk_multiplier: Decimal) -> Decimal {
        let cap = bankroll * self.config.max_trade_size_pct;
        let kelly = bankroll * gross_edge * KELLY_FRACTION;
        cap.min(kelly) * risk_multiplier
    }
}

impl Default for CrossExchangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Listing, ListingStatus, VenueId};
    use chrono::Duration;

    fn listing(venue: VenueId, liquidity: Decimal, resolution_in_days: i64) -> Listing {
        Listing {
            venue_id: venue,
            native_id: "id".to_string(),
            question: "Will X happen?".to_string(),
            description: String::new(),
            resolution_time: Some(Utc::now() + Duration::days(resolution_in_days)),
            status: ListingStatus::Open,
            volume_to_date: dec!(0),
            resting_liquidity: liquidity,
            raw: serde_json::Value::Null,
        }
    }

    fn pair(liquidity: Decimal, resolution_in_days: i64) -> PairedEvent {
        PairedEvent {
            listing_a: listing(VenueId::VenueA, liquidity, resolution_in_days),
            listing_b: listing(VenueId::VenueB, liquidity, resolution_in_days),
            similarity: 0.95,
        }
    }

    fn quote(yes: Decimal, no: Decimal) -> Quote {
        Quote {
            best_yes: Some(yes),
            best_no: Some(no),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn profitable_spread_is_detected() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(100_000), 10);
        let quote_a = quote(dec!(0.45), dec!(0.45));
        let quote_b = quote(dec!(0.45), dec!(0.45));

        let opp = detector.detect(&pair, &quote_a, &quote_b, dec!(100_000)).unwrap();
        assert!(opp.net_edge > Decimal::ZERO);
        assert!(opp.position_size_quote >= detector.config().min_trade_size_usd);
    }

    #[test]
    fn spread_below_threshold_is_rejected() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(100_000), 10);
        let quote_a = quote(dec!(0.50), dec!(0.50));
        let quote_b = quote(dec!(0.50), dec!(0.50));

        let result = detector.detect(&pair, &quote_a, &quote_b, dec!(100_000));
        assert_eq!(result, Err(DetectorRejection::SpreadBelowThreshold));
    }

    #[test]
    fn thin_liquidity_is_rejected() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(10), 10);
        let quote_a = quote(dec!(0.45), dec!(0.45));
        let quote_b = quote(dec!(0.45), dec!(0.45));

        let result = detector.detect(&pair, &quote_a, &quote_b, dec!(100_000));
        assert_eq!(result, Err(DetectorRejection::LiquidityFloor));
    }

    #[test]
    fn horizon_exceeded_without_high_edge_is_rejected() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(100_000), 365);
        // Small edge so high_return_threshold isn't waived.
        let quote_a = quote(dec!(0.49), dec!(0.49));
        let quote_b = quote(dec!(0.49), dec!(0.49));

        let result = detector.detect(&pair, &quote_a, &quote_b, dec!(100_000));
        assert_eq!(result, Err(DetectorRejection::HorizonExceeded));
    }

    #[test]
    fn high_edge_waives_horizon_gate() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(100_000), 365);
        let quote_a = quote(dec!(0.30), dec!(0.30));
        let quote_b = quote(dec!(0.30), dec!(0.30));

        let opp = detector.detect(&pair, &quote_a, &quote_b, dec!(100_000)).unwrap();
        assert!(opp.net_edge >= detector.config().high_return_threshold);
    }

    #[test]
    fn missing_quote_is_rejected() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(100_000), 10);
        let empty = Quote {
            best_yes: None,
            best_no: None,
            fetched_at: Utc::now(),
        };
        let quote_b = quote(dec!(0.45), dec!(0.45));

        let result = detector.detect(&pair, &empty, &quote_b, dec!(100_000));
        assert_eq!(result, Err(DetectorRejection::MissingQuote));
    }

    #[test]
    fn contract_sizing_uses_floor_for_venue_a_leg() {
        let detector = CrossExchangeDetector::new();
        let pair = pair(dec!(100_000), 10);
        let quote_a = quote(dec!(0.40), dec!(0.40));
        let quote_b = quote(dec!(0.40), dec!(0.40));

        let opp = detector.detect(&pair, &quote_a, &quote_b, dec!(100_000)).unwrap();
        assert!(opp.contracts_leg1 > 0);
    }
}
