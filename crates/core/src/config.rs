//! Persistent application configuration.
//!
//! Mirrors the layered document described in the external-interfaces
//! section: a YAML/TOML persistent document merged with environment
//! variables at load time (see [`crate::config_loader::ConfigLoader`]).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub capital: CapitalConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub threshold_spread: Decimal,
    pub min_trade_size_usd: Decimal,
    pub max_trade_size_pct: Decimal,
    pub target_liquidity_depth: Decimal,
    pub slippage_tolerance: Decimal,
    pub auto_execute: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            threshold_spread: Decimal::new(1, 2),        // 0.01
            min_trade_size_usd: Decimal::new(10, 0),      // 10
            max_trade_size_pct: Decimal::new(10, 2),      // 0.10
            target_liquidity_depth: Decimal::new(500, 0), // 500
            slippage_tolerance: Decimal::new(2, 2),       // 0.02
            auto_execute: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalConfig {
    pub initial_bankroll: Decimal,
    pub kalshi_allocation_pct: Decimal,
    pub polymarket_allocation_pct: Decimal,
    pub reserve_pct: Decimal,
    pub rebalance_threshold: Decimal,
    pub max_days_to_resolution: i64,
    pub high_return_threshold: Decimal,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: Decimal::new(100_000, 0),
            kalshi_allocation_pct: Decimal::new(50, 2),
            polymarket_allocation_pct: Decimal::new(50, 2),
            reserve_pct: Decimal::new(10, 2),
            rebalance_threshold: Decimal::new(15, 2),
            max_days_to_resolution: 30,
            high_return_threshold: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_open_positions: u32,
    pub max_exposure_per_event: Decimal,
    pub max_daily_loss_pct: Decimal,
    /// Hour (0-23, UTC) the circuit breaker rolls its daily baseline over.
    #[serde(default)]
    pub circuit_breaker_reset_hour: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_open_positions: 20,
            max_exposure_per_event: Decimal::new(10, 2),
            max_daily_loss_pct: Decimal::new(5, 2),
            circuit_breaker_reset_hour: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesConfig {
    pub kalshi_fee_pct: Decimal,
    pub polymarket_fee_pct: Decimal,
    pub blockchain_cost_usd: Decimal,
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            kalshi_fee_pct: Decimal::new(7, 3),       // 0.007
            polymarket_fee_pct: Decimal::new(1, 4),   // 0.0001
            blockchain_cost_usd: Decimal::new(10, 2), // 0.10
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_sec: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_sec: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub alert_channels: Vec<String>,
    pub alert_threshold_spread: Decimal,
    pub alert_min_opportunity_usd: Decimal,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            alert_channels: Vec::new(),
            alert_threshold_spread: Decimal::new(15, 3), // 0.015
            alert_min_opportunity_usd: Decimal::new(500, 0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/arbitrage.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            capital: CapitalConfig::default(),
            risk: RiskConfig::default(),
            fees: FeesConfig::default(),
            polling: PollingConfig::default(),
            monitoring: MonitoringConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// The runtime-mutable document (§6): toggles an operator can flip without
/// restarting the process. Persisted as JSON, merged over the YAML document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    pub paper_trading: bool,
    pub auto_execute: bool,
    pub engine_running: bool,
    pub paper_balance: Decimal,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            paper_trading: true,
            auto_execute: false,
            engine_running: false,
            paper_balance: Decimal::new(100_000, 0),
            last_updated: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trading_config_has_sane_thresholds() {
        let cfg = TradingConfig::default();
        assert_eq!(cfg.threshold_spread, Decimal::new(1, 2));
        assert!(!cfg.auto_execute);
    }

    #[test]
    fn default_app_config_round_trips_through_json() {
        let cfg = AppConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trading.threshold_spread, cfg.trading.threshold_spread);
    }

    #[test]
    fn runtime_config_defaults_to_paper_mode() {
        let rc = RuntimeConfig::default();
        assert!(rc.paper_trading);
        assert!(!rc.auto_execute);
        assert!(!rc.engine_running);
    }
}
