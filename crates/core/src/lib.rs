pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod secrets;
pub mod validation;

pub use config::{AppConfig, CapitalConfig, DatabaseConfig, FeesConfig, MonitoringConfig, PollingConfig, RiskConfig, RuntimeConfig, TradingConfig};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use secrets::{
    KalshiCredentials, PolymarketCredentials, SecretsError, SecretsManager, TelegramCredentials,
};
pub use validation::{validate_price, validate_quantity, validate_size_usd, validate_ticker, ValidationError};
