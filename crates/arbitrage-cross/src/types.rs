//! Shared types for cross-venue arbitrage operations.
//!
//! These mirror the data model flowing through matcher -> risk analyzer ->
//! detector -> capital manager -> executor -> journal: a `Listing` from each
//! venue becomes a `PairedEvent`, which is priced into a `Quote`, sized into
//! an `Opportunity`, and — once executed — tracked as a `Position` against
//! the process-wide `PortfolioState`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which venue a `Listing`, `Quote`, or order leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueId {
    /// Venue A: integer-cent quoting, RSA-PSS signed.
    VenueA,
    /// Venue B: decimal quoting, EIP-712/CLOB signed.
    VenueB,
}

impl VenueId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VenueA => "venue_a",
            Self::VenueB => "venue_b",
        }
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Market status as reported by a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    Open,
    Closed,
    Settled,
}

/// What one venue reports for one market. Immutable for a given snapshot;
/// listings from the same venue are uniquely identified by `(venue_id, native_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub venue_id: VenueId,
    pub native_id: String,
    pub question: String,
    pub description: String,
    pub resolution_time: Option<DateTime<Utc>>,
    pub status: ListingStatus,
    pub volume_to_date: Decimal,
    pub resting_liquidity: Decimal,
    pub raw: serde_json::Value,
}

impl Listing {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ListingStatus::Open
    }
}

/// The matcher's output: two listings from distinct venues judged to refer
/// to the same underlying event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedEvent {
    pub listing_a: Listing,
    pub listing_b: Listing,
    pub similarity: f64,
}

impl PairedEvent {
    /// `|Δ resolution_time|`, or `None` if either side lacks a resolution time.
    #[must_use]
    pub fn resolution_time_delta(&self) -> Option<chrono::Duration> {
        match (self.listing_a.resolution_time, self.listing_b.resolution_time) {
            (Some(a), Some(b)) => Some((a - b).abs()),
            _ => None,
        }
    }
}

/// Best YES and best NO for one listing at one instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub best_yes: Option<Decimal>,
    pub best_no: Option<Decimal>,
    pub fetched_at: DateTime<Utc>,
}

/// Which leg is bought YES and which is bought NO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Buy YES on venue A, NO on venue B.
    BuyYesANoB,
    /// Buy YES on venue B, NO on venue A.
    BuyYesBNoA,
}

/// Coarse risk classification produced by the Risk Analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Whether the Detector is allowed to execute at this tier.
    #[must_use]
    pub fn should_execute(self) -> bool {
        matches!(self, Self::Low | Self::Medium)
    }
}

/// A sized, direction-selected arbitrage candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub paired_event: PairedEvent,
    pub direction: Direction,
    pub price_leg1: Decimal,
    pub price_leg2: Decimal,
    pub spread: Decimal,
    pub gross_edge: Decimal,
    pub fee_leg1: Decimal,
    pub fee_leg2: Decimal,
    pub net_edge: Decimal,
    pub position_size_quote: Decimal,
    pub contracts_leg1: i64,
    pub size_leg2: Decimal,
    pub expected_profit: Decimal,
    pub expected_roi: Decimal,
    pub horizon_days: Option<i64>,
    pub annualized_roi: Option<Decimal>,
    pub risk_tier: RiskTier,
    pub risk_score: f64,
    pub risk_warnings: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

/// Lifecycle state of a `Position`, per §4.7's executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Allocated,
    Placed,
    BothFilled,
    Unwinding,
    Closed,
    Failed,
}

/// Which order was placed (or not) for each leg of a `Position`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegOrders {
    pub leg1_order_id: Option<String>,
    pub leg2_order_id: Option<String>,
}

/// Fill status for each leg of a `Position`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LegFilled {
    pub leg1: bool,
    pub leg2: bool,
}

/// The effect of executing an `Opportunity`: a globally unique, monotonic
/// (within a process) handle tracked by the Capital Manager from allocation
/// through release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub opportunity_ref: Opportunity,
    pub leg_orders: LegOrders,
    pub leg_filled: LegFilled,
    pub allocated_capital: Decimal,
    pub realized_pnl: Option<Decimal>,
    pub state: PositionState,
}

/// Process-wide portfolio snapshot. Owned exclusively by the Capital Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub balance_a: Decimal,
    pub balance_b: Decimal,
    pub locked_capital: Decimal,
    pub open_positions: u32,
    pub daily_start_balance: Decimal,
    pub peak_balance: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub daily_pnl: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl PortfolioState {
    #[must_use]
    pub fn total_balance(&self) -> Decimal {
        self.balance_a + self.balance_b
    }

    #[must_use]
    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }
}

impl Default for PortfolioState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            balance_a: Decimal::ZERO,
            balance_b: Decimal::ZERO,
            locked_capital: Decimal::ZERO,
            open_positions: 0,
            daily_start_balance: Decimal::ZERO,
            peak_balance: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            daily_pnl: Decimal::ZERO,
            last_updated: now,
        }
    }
}

/// Execution mode tag carried by every journal record so paper and live
/// analytics never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Paper,
    Live,
}

impl ExecutionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque per-market attribute bag threaded through from venue clients
/// (used by the risk analyzer's keyword checks without re-parsing `raw`).
pub type ListingMetadata = HashMap<String, String>;
