//! Daily-loss / peak-drawdown circuit breaker.
//!
//! Once tripped the breaker stays open until `manual_reset` is called —
//! there is no time-based auto-recovery. Grounded on the dual-latch
//! condition of the original Python `CircuitBreaker`: either the daily
//! loss percentage or the drawdown-from-peak percentage crossing its
//! configured limit halts trading.

use chrono::{DateTime, Timelike, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TradingHalted {
    #[error("trading halted: {0}")]
    Reason(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub max_daily_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Hour (0-23, UTC) at which the daily baseline rolls over. Default
    /// midnight.
    pub reset_hour: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: dec!(0.05),
            max_drawdown_pct: dec!(0.15),
            reset_hour: 0,
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    daily_start_balance: Option<Decimal>,
    daily_start_date: Option<DateTime<Utc>>,
    peak_balance: Option<Decimal>,
    open: bool,
    halt_reason: Option<String>,
    total_halts: u32,
    last_halt_time: Option<DateTime<Utc>>,
}

/// Halts trading, manual-reset-only, on daily loss or peak drawdown
/// breaches. `peak_balance` is monotonic: it only ever increases.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(BreakerState::default()),
        }
    }

    /// Checks the breaker against `current_balance`, tripping it (and
    /// returning `Err`) if either latch condition is met. Updates the
    /// daily baseline on first call and rolls it over on calendar-day
    /// change.
    pub fn check(&self, current_balance: Decimal, now: DateTime<Utc>) -> Result<(), TradingHalted> {
        let mut state = self.state.write();

        if state.open {
            return Err(TradingHalted::Reason(
                state.halt_reason.clone().unwrap_or_else(|| "unknown".to_string()),
            ));
        }

        if self.should_reset_daily(state.daily_start_date, now) {
            state.daily_start_balance = Some(current_balance);
            state.daily_start_date = Some(now);
        }

        if state.peak_balance.map(|p| current_balance > p).unwrap_or(true) {
            state.peak_balance = Some(current_balance);
        }

        let daily_start = state.daily_start_balance.unwrap_or(current_balance);
        if daily_start > Decimal::ZERO {
            let daily_loss_pct = (daily_start - current_balance) / daily_start;
            if daily_loss_pct >= self.config.max_daily_loss_pct {
                let reason = format!(
                    "daily loss limit exceeded: {:.4} (max {:.4})",
                    daily_loss_pct, self.config.max_daily_loss_pct
                );
                Self::trip(&mut state, reason.clone(), now);
                return Err(TradingHalted::Reason(reason));
            }
        }

        let peak = state.peak_balance.unwrap_or(current_balance);
        if peak > Decimal::ZERO {
            let drawdown_pct = (peak - current_balance) / peak;
            if drawdown_pct >= self.config.max_drawdown_pct {
                let reason = format!(
                    "max drawdown exceeded: {:.4} (max {:.4})",
                    drawdown_pct, self.config.max_drawdown_pct
                );
                Self::trip(&mut state, reason.clone(), now);
                return Err(TradingHalted::Reason(reason));
            }
        }

        Ok(())
    }

    /// True on a new calendar day, or on the same day once the clock has
    /// passed the configured reset hour since the last baseline was set.
    fn should_reset_daily(&self, daily_start_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(start) = daily_start_date else {
            return true;
        };
        if start.date_naive() != now.date_naive() {
            return true;
        }
        start.hour() < self.config.reset_hour && self.config.reset_hour <= now.hour()
    }

    fn trip(state: &mut BreakerState, reason: String, now: DateTime<Utc>) {
        state.open = true;
        state.halt_reason = Some(reason.clone());
        state.total_halts += 1;
        state.last_halt_time = Some(now);
        error!(reason = %reason, "circuit breaker tripped, trading halted");
    }

    /// Manually resets the breaker. Does not reset the daily baseline or
    /// peak balance.
    pub fn manual_reset(&self) {
        let mut state = self.state.write();
        if state.open {
            warn!(reason = ?state.halt_reason, "manually resetting circuit breaker");
        }
        state.open = false;
        state.halt_reason = None;
    }

    #[must_use]
    pub fn is_trading_allowed(&self) -> bool {
        !self.state.read().open
    }

    #[must_use]
    pub fn total_halts(&self) -> u32 {
        self.state.read().total_halts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn first_check_establishes_baseline_without_tripping() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(breaker.check(dec!(100_000), at(0)).is_ok());
        assert!(breaker.is_trading_allowed());
    }

    #[test]
    fn daily_loss_trips_the_breaker() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        breaker.check(dec!(100_000), at(0)).unwrap();
        let result = breaker.check(dec!(94_000), at(1));
        assert!(result.is_err());
        assert!(!breaker.is_trading_allowed());
    }

    #[test]
    fn drawdown_from_peak_trips_even_without_daily_loss() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        breaker.check(dec!(100_000), at(0)).unwrap();
        breaker.check(dec!(120_000), at(1)).unwrap();
        // Daily loss vs 100k baseline is 0, but drawdown from 120k peak is 16.7%.
        let result = breaker.check(dec!(100_000), at(2));
        assert!(result.is_err());
    }

    #[test]
    fn open_breaker_rejects_without_re_evaluating() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        breaker.check(dec!(100_000), at(0)).unwrap();
        breaker.check(dec!(94_000), at(1)).unwrap_err();
        let result = breaker.check(dec!(200_000), at(2));
        assert!(result.is_err());
    }

    #[test]
    fn manual_reset_reopens_trading() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        breaker.check(dec!(100_000), at(0)).unwrap();
        breaker.check(dec!(94_000), at(1)).unwrap_err();
        breaker.manual_reset();
        assert!(breaker.is_trading_allowed());
        assert_eq!(breaker.total_halts(), 1);
    }

    #[test]
    fn new_calendar_day_rolls_baseline_forward() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        breaker.check(dec!(100_000), at(0)).unwrap();
        let tomorrow = at(0) + chrono::Duration::days(1);
        assert!(breaker.check(dec!(96_000), tomorrow).is_ok());
    }
}
