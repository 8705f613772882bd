//! Cross-venue arbitrage detection and orchestration.
//!
//! When the same event is priced differently on two prediction-market
//! venues, buying the opposing sides can lock in a guaranteed profit:
//!
//! ```text
//! Venue A:  YES @ $0.45,  NO @ $0.46
//! Venue B:  YES @ $0.52,  NO @ $0.45
//!
//! Buy venue A NO  @ $0.46
//! Buy venue B YES @ $0.52
//! Total cost:        $0.98
//! Guaranteed payout:  $1.00
//! Gross edge:         $0.02 (2%)
//! ```
//!
//! # Modules
//!
//! - [`types`]: shared data model (listings, pairings, opportunities, positions)
//! - [`matcher`]: pairs equivalent markets across venues by text similarity
//! - [`risk`]: scores a pairing's definition/timing/liquidity/edge/regulatory risk
//! - [`fees`]: venue fee models
//! - [`detector`]: sizes and selects profitable, risk-cleared directions
//! - [`capital`]: portfolio state, exposure limits, rebalancing advisories
//! - [`circuit`]: daily-loss / drawdown circuit breaker
//! - [`risk_gate`]: atomic breaker-check + capital-allocate across both
//! - [`venue`]: the venue-agnostic client contract
//! - [`executor`]: two-leg saga execution against `venue::VenueClient`
//! - [`journal`]: durable opportunity/trade/balance history
//! - [`alerting`]: outbound notifications

pub mod alerting;
pub mod capital;
pub mod circuit;
pub mod detector;
pub mod executor;
pub mod fees;
pub mod journal;
pub mod matcher;
pub mod risk;
pub mod risk_gate;
pub mod types;
pub mod venue;

pub use alerting::{AlertChannel, AlertConfig, AlertError, AlertManager, AlertPriority, TelegramAlertChannel};
pub use capital::{CapitalConfig, CapitalError, CapitalManager, RebalanceAmounts};
pub use circuit::{CircuitBreaker, CircuitBreakerConfig, TradingHalted};
pub use detector::{CrossExchangeDetector, DetectorConfig, DetectorRejection, KELLY_FRACTION};
pub use executor::{CrossVenueExecutor, ExecutionOutcome};
pub use fees::{ArbitrageFees, FeeCalculator, FeeConfig};
pub use matcher::{MarketMatcher, MatchConfig};
pub use risk::{RiskAnalyzer, RiskAssessment, RiskConfig};
pub use risk_gate::{GateError, RiskGate};
pub use types::{
    Direction, ExecutionMode, LegFilled, LegOrders, Listing, ListingStatus, Opportunity,
    PairedEvent, PortfolioState, Position, PositionState, Quote, RiskTier, VenueId,
};
pub use venue::{OrderAck, OrderRequest, OrderSide, OrderStatusReport, RemoteOrderStatus, VenueClient, VenueError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_is_accessible() {
        let _ = FeeCalculator::new();
        let _ = CrossExchangeDetector::new();
        let _ = MarketMatcher::new();
        let _ = RiskAnalyzer::new();
        let _ = DetectorConfig::default();
        let _ = MatchConfig::default();
        let _ = FeeConfig::default();
        let _ = CapitalConfig::default();
        let _ = CircuitBreakerConfig::default();
    }

    #[test]
    fn venue_ids_are_distinct() {
        assert_ne!(VenueId::VenueA.to_string(), VenueId::VenueB.to_string());
    }
}
