use crate::config::{AppConfig, RuntimeConfig};
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Yaml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the persistent application configuration by merging the YAML
    /// document with environment variables (`APP_` prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/config.yaml")
    }

    /// Loads the persistent application configuration from an explicit path,
    /// used when `--config <path>` is passed on the CLI.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Loads the runtime-mutable document (paper_trading, auto_execute,
    /// engine_running, ...), defaulting missing fields so a brand-new
    /// deployment with no runtime file yet still starts in paper mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed as JSON.
    pub fn load_runtime(path: &str) -> Result<RuntimeConfig> {
        let config: RuntimeConfig = Figment::new()
            .merge(Json::string(&serde_json::to_string(&RuntimeConfig::default())?))
            .merge(Json::file(path))
            .extract()?;

        Ok(config)
    }

    /// Persists the runtime-mutable document back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_runtime(path: &str, config: &RuntimeConfig) -> Result<()> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
