//! Capital allocation, exposure limits, and rebalancing advisories.
//!
//! Owns the single `PortfolioState` for the process. All reads and writes
//! go through `parking_lot::RwLock` so the Engine Loop, Executor, and any
//! reporting surface can share one source of truth without async lock
//! contention.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::PortfolioState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum TrackedPositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackedPosition {
    size: Decimal,
    status: TrackedPositionStatus,
}

/// Configuration for capital allocation and exposure limits, mirroring
/// `config::CapitalConfig`/`config::RiskConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalConfig {
    pub initial_bankroll: Decimal,
    pub venue_a_allocation_pct: Decimal,
    pub venue_b_allocation_pct: Decimal,
    pub reserve_pct: Decimal,
    pub rebalance_threshold: Decimal,
    pub max_open_positions: u32,
    pub max_exposure_per_event_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: dec!(100_000),
            venue_a_allocation_pct: dec!(0.5),
            venue_b_allocation_pct: dec!(0.5),
            reserve_pct: dec!(0.1),
            rebalance_threshold: dec!(0.15),
            max_open_positions: 20,
            max_exposure_per_event_pct: dec!(0.10),
            max_daily_loss_pct: dec!(0.05),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapitalError {
    #[error("max open positions reached: {open} >= {max}")]
    MaxOpenPositions { open: u32, max: u32 },
    #[error("insufficient available capital: need {need}, have {available}")]
    InsufficientCapital { need: String, available: String },
    #[error("position size {size} exceeds max per-event exposure {max}")]
    ExceedsEventExposure { size: String, max: String },
    #[error("daily loss limit reached: {loss_pct} >= {max_pct}")]
    DailyLossLimitReached { loss_pct: String, max_pct: String },
}

/// Advisory transfer amounts to bring venue balances back within
/// `rebalance_threshold` of their target allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceAmounts {
    pub venue_a_delta: Decimal,
    pub venue_b_delta: Decimal,
    pub transfer_to_venue_a: bool,
    pub transfer_amount: Decimal,
}

/// Tracks allocated capital, open position count, and P&L against a single
/// `PortfolioState`, gating new allocations against the configured limits.
pub struct CapitalManager {
    config: CapitalConfig,
    portfolio: RwLock<PortfolioState>,
    positions: RwLock<HashMap<String, TrackedPosition>>,
}

impl CapitalManager {
    #[must_use]
    pub fn new(config: CapitalConfig) -> Self {
        let bankroll = config.initial_bankroll;
        let portfolio = PortfolioState {
            balance_a: bankroll * config.venue_a_allocation_pct,
            balance_b: bankroll * config.venue_b_allocation_pct,
            daily_start_balance: bankroll,
            peak_balance: bankroll,
            ..PortfolioState::default()
        };

        Self {
            config,
            portfolio: RwLock::new(portfolio),
            positions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn portfolio_state(&self) -> PortfolioState {
        self.portfolio.read().clone()
    }

    #[must_use]
    pub fn available_capital(&self) -> Decimal {
        let portfolio = self.portfolio.read();
        let reserve = portfolio.total_balance() * self.config.reserve_pct;
        (portfolio.total_balance() - portfolio.locked_capital - reserve).max(Decimal::ZERO)
    }

    pub fn can_open_position(&self, position_size: Decimal) -> Result<(), CapitalError> {
        let portfolio = self.portfolio.read();

        if portfolio.open_positions >= self.config.max_open_positions {
            return Err(CapitalError::MaxOpenPositions {
                open: portfolio.open_positions,
                max: self.config.max_open_positions,
            });
        }

        let reserve = portfolio.total_balance() * self.config.reserve_pct;
        let available = (portfolio.total_balance() - portfolio.locked_capital - reserve).max(Decimal::ZERO);
        if position_size > available {
            return Err(CapitalError::InsufficientCapital {
                need: position_size.to_string(),
                available: available.to_string(),
            });
        }

        let max_position = portfolio.total_balance() * self.config.max_exposure_per_event_pct;
        if position_size > max_position {
            return Err(CapitalError::ExceedsEventExposure {
                size: position_size.to_string(),
                max: max_position.to_string(),
            });
        }

        if portfolio.daily_start_balance > Decimal::ZERO {
            let daily_loss_pct = portfolio.daily_pnl.abs() / portfolio.daily_start_balance;
            if portfolio.daily_pnl < Decimal::ZERO && daily_loss_pct >= self.config.max_daily_loss_pct {
                return Err(CapitalError::DailyLossLimitReached {
                    loss_pct: daily_loss_pct.to_string(),
                    max_pct: self.config.max_daily_loss_pct.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Allocates capital for a new position, returning `Err` (without
    /// mutating state) if any gate fails.
    pub fn allocate(&self, position_size: Decimal, position_id: impl Into<String>) -> Result<(), CapitalError> {
        self.can_open_position(position_size)?;

        let mut portfolio = self.portfolio.write();
        portfolio.locked_capital += position_size;
        portfolio.open_positions += 1;

        let position_id = position_id.into();
        self.positions.write().insert(
            position_id.clone(),
            TrackedPosition {
                size: position_size,
                status: TrackedPositionStatus::Open,
            },
        );

        info!(
            position_id = %position_id,
            size = %position_size,
            locked = %portfolio.locked_capital,
            open_positions = portfolio.open_positions,
            "allocated capital"
        );
        Ok(())
    }

    /// Releases capital for a closed position and folds `pnl` into realized
    /// and daily P&L.
    pub fn release(&self, position_id: &str, pnl: Decimal) {
        let size = {
            let mut positions = self.positions.write();
            match positions.get_mut(position_id) {
                Some(pos) => {
                    pos.status = TrackedPositionStatus::Closed;
                    pos.size
                }
                None => {
                    warn!(position_id, "releasing untracked position");
                    Decimal::ZERO
                }
            }
        };

        let mut portfolio = self.portfolio.write();
        portfolio.locked_capital = (portfolio.locked_capital - size).max(Decimal::ZERO);
        portfolio.open_positions = portfolio.open_positions.saturating_sub(1);
        portfolio.realized_pnl += pnl;
        portfolio.daily_pnl += pnl;
        portfolio.last_updated = chrono::Utc::now();
        if portfolio.total_balance() + pnl > portfolio.peak_balance {
            portfolio.peak_balance = portfolio.total_balance() + pnl;
        }

        info!(position_id, %pnl, total_pnl = %portfolio.total_pnl(), "released capital");
    }

    pub fn update_balances(&self, balance_a: Decimal, balance_b: Decimal) {
        let mut portfolio = self.portfolio.write();
        portfolio.balance_a = balance_a;
        portfolio.balance_b = balance_b;
        portfolio.last_updated = chrono::Utc::now();
        if portfolio.total_balance() > portfolio.peak_balance {
            portfolio.peak_balance = portfolio.total_balance();
        }
    }

    #[must_use]
    pub fn needs_rebalancing(&self) -> bool {
        let portfolio = self.portfolio.read();
        if portfolio.total_balance() == Decimal::ZERO {
            return false;
        }
        let venue_a_ratio = portfolio.balance_a / portfolio.total_balance();
        (venue_a_ratio - self.config.venue_a_allocation_pct).abs() > self.config.rebalance_threshold
    }

    #[must_use]
    pub fn rebalance_amounts(&self) -> RebalanceAmounts {
        let portfolio = self.portfolio.read();
        let total = portfolio.total_balance();
        let target_a = total * self.config.venue_a_allocation_pct;
        let target_b = total * self.config.venue_b_allocation_pct;
        let venue_a_delta = target_a - portfolio.balance_a;
        let venue_b_delta = target_b - portfolio.balance_b;

        RebalanceAmounts {
            venue_a_delta,
            venue_b_delta,
            transfer_to_venue_a: venue_a_delta > Decimal::ZERO,
            transfer_amount: venue_a_delta.abs(),
        }
    }

    pub fn reset_daily_metrics(&self) {
        let mut portfolio = self.portfolio.write();
        portfolio.daily_start_balance = portfolio.total_balance();
        portfolio.daily_pnl = Decimal::ZERO;
        info!(starting_balance = %portfolio.daily_start_balance, "daily capital metrics reset");
    }
}
