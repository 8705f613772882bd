//! Combines the capital manager and circuit breaker behind one mutex.
//!
//! `CapitalManager::can_open_position`/`allocate` and
//! `CircuitBreaker::check` each hold their own internal lock, so calling
//! them back-to-back from two different places leaves a window where a
//! concurrent halt transition and a new allocation can interleave. `RiskGate`
//! owns both and exposes `try_allocate`, which performs the breaker check
//! and the capital check-and-allocate as one critical section.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::capital::{CapitalError, CapitalManager};
use crate::circuit::{CircuitBreaker, TradingHalted};

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Halted(#[from] TradingHalted),
    #[error(transparent)]
    Capital(#[from] CapitalError),
}

pub struct RiskGate {
    capital: Arc<CapitalManager>,
    circuit_breaker: Arc<CircuitBreaker>,
    gate: Mutex<()>,
}

impl RiskGate {
    #[must_use]
    pub fn new(capital: Arc<CapitalManager>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            capital,
            circuit_breaker,
            gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn capital(&self) -> Arc<CapitalManager> {
        self.capital.clone()
    }

    #[must_use]
    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        self.circuit_breaker.clone()
    }

    /// Checks the breaker against `current_balance`, then — without
    /// releasing the gate — runs the capital manager's `can_open`/allocate
    /// check for `position_size`. A halt that lands between the two checks
    /// sees the same serialization point as a concurrent allocation.
    pub fn try_allocate(
        &self,
        position_size: Decimal,
        position_id: impl Into<String>,
        current_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let _held = self.gate.lock();
        self.circuit_breaker.check(current_balance, now)?;
        self.capital.allocate(position_size, position_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capital::CapitalConfig;
    use crate::circuit::CircuitBreakerConfig;
    use rust_decimal_macros::dec;

    #[test]
    fn try_allocate_declines_once_breaker_is_open() {
        let gate = RiskGate::new(
            Arc::new(CapitalManager::new(CapitalConfig::default())),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        );
        gate.circuit_breaker().check(dec!(100_000), Utc::now()).unwrap();
        gate.circuit_breaker().check(dec!(80_000), Utc::now()).unwrap_err();

        let result = gate.try_allocate(dec!(100), "pos-1", dec!(80_000), Utc::now());
        assert!(matches!(result, Err(GateError::Halted(_))));
    }

    #[test]
    fn try_allocate_declines_when_capital_manager_rejects() {
        let gate = RiskGate::new(
            Arc::new(CapitalManager::new(CapitalConfig { max_open_positions: 0, ..CapitalConfig::default() })),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        );

        let result = gate.try_allocate(dec!(100), "pos-1", dec!(100_000), Utc::now());
        assert!(matches!(result, Err(GateError::Capital(_))));
    }

    #[test]
    fn try_allocate_succeeds_and_locks_capital() {
        let gate = RiskGate::new(
            Arc::new(CapitalManager::new(CapitalConfig::default())),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        );

        gate.try_allocate(dec!(1000), "pos-1", dec!(100_000), Utc::now()).unwrap();
        assert_eq!(gate.capital().portfolio_state().locked_capital, dec!(1000));
    }
}
