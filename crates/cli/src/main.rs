use std::sync::Arc;
use std::time::Duration;

use algo_trade_arbitrage_cross::journal::{self, ArbitrageRepository};
use algo_trade_arbitrage_cross::{
    AlertConfig, AlertManager, CapitalConfig, CapitalManager, CircuitBreaker, CircuitBreakerConfig,
    CrossExchangeDetector, CrossVenueExecutor, DetectorConfig, ExecutionMode, MarketMatcher,
    MatchConfig, RiskGate, TelegramAlertChannel, VenueClient,
};
use algo_trade_core::{AppConfig, ConfigLoader, ConfigWatcher, RuntimeConfig, SecretsManager};
use algo_trade_kalshi::{KalshiClient, KalshiClientConfig, KalshiVenueClient};
use algo_trade_polymarket::arbitrage::{LiveExecutor, PaperExecutor, PaperExecutorConfig, PolymarketExecutor};
use algo_trade_polymarket::{PolymarketClient, PolymarketVenueClient};
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tokio::sync::{broadcast, watch};

mod engine;

use engine::{ArbitrageEngine, ArbitrageEngineConfig};

#[derive(Parser)]
#[command(name = "arb-engine")]
#[command(about = "Cross-venue prediction-market arbitrage engine", long_about = None)]
struct Cli {
    /// Config document path (YAML, merged with `APP_`-prefixed env vars).
    #[arg(long, default_value = "config/app.yaml")]
    config: String,

    /// DEBUG, INFO, WARNING, or ERROR.
    #[arg(long, default_value = "INFO")]
    log_level: String,

    /// Overrides `trading.auto_execute` from the config document.
    #[arg(long)]
    auto_execute: Option<bool>,

    /// Forces paper trading regardless of config, and implies execution of
    /// detected opportunities (no capital is ever actually at risk).
    #[arg(long)]
    dry_run: bool,

    /// Overrides `trading.threshold_spread` from the config document.
    #[arg(long)]
    threshold: Option<String>,

    /// Sends a test message through every configured alert channel, then exits.
    #[arg(long)]
    test_alerts: bool,

    /// Applies pending database migrations, then exits without starting the engine.
    #[arg(long)]
    init_db: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypts a plaintext credential for storage as `<NAME>_ENCRYPTED`.
    EncryptCredentials {
        /// The plaintext value to encrypt (reads `MASTER_PASSWORD` from the environment).
        #[arg(long)]
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Some(Commands::EncryptCredentials { value }) = &cli.command {
        return encrypt_credential(value);
    }

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "fatal error");
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let default_filter = match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

fn encrypt_credential(value: &str) -> anyhow::Result<()> {
    let manager = SecretsManager::new(None).context("failed to build secrets manager; set MASTER_PASSWORD")?;
    let encrypted = manager.encrypt_secret(value)?;
    println!("{encrypted}");
    Ok(())
}

/// Copies whatever `SecretsManager` resolved (plaintext or `_ENCRYPTED`) into
/// the fixed environment variable names `KalshiAuthConfig`/`WalletConfig`
/// read directly, so the venue clients never need to know about the
/// encrypted-credential layer themselves.
fn apply_resolved_credentials(secrets: &SecretsManager, dry_run: bool) {
    if let Some(creds) = secrets.kalshi_credentials() {
        let (api_key_env, private_key_env) = if dry_run {
            ("KALSHI_DEMO_API_KEY", "KALSHI_DEMO_PRIVATE_KEY")
        } else {
            ("KALSHI_API_KEY", "KALSHI_PRIVATE_KEY")
        };
        std::env::set_var(api_key_env, creds.api_key_id.expose_secret());
        std::env::set_var(private_key_env, creds.private_key_pem.expose_secret());
    }
    if let Some(creds) = secrets.polymarket_credentials() {
        std::env::set_var("POLYMARKET_PRIVATE_KEY", creds.wallet_private_key.expose_secret());
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ConfigLoader::load_from(&cli.config).unwrap_or_else(|err| {
        tracing::warn!(error = %err, path = %cli.config, "failed to load config document, using defaults");
        AppConfig::default()
    });
    if let Some(auto_execute) = cli.auto_execute {
        config.trading.auto_execute = auto_execute;
    }
    if let Some(threshold) = &cli.threshold {
        config.trading.threshold_spread = threshold.parse().context("invalid --threshold")?;
    }

    let pool = journal::connect(&config.database.url).await.context("failed to initialize database")?;
    if cli.init_db {
        tracing::info!(url = %config.database.url, "database migrations applied");
        return Ok(());
    }

    if let Ok(secrets) = SecretsManager::new(None) {
        apply_resolved_credentials(&secrets, cli.dry_run);
    } else {
        tracing::warn!("no MASTER_PASSWORD set; venue clients will read credentials from plaintext env vars only");
    }

    let mode = if cli.dry_run { ExecutionMode::Paper } else { ExecutionMode::Live };
    let auto_execute = config.trading.auto_execute || cli.dry_run;
    let runtime_rx = spawn_runtime_watcher(&config, cli.dry_run, auto_execute);

    let alerts = build_alert_manager(&config);
    if cli.test_alerts {
        let ok = alerts.test_connection().await;
        println!("{}", if ok { "alert channels OK" } else { "alert channel check FAILED" });
        std::process::exit(if ok { 0 } else { 1 });
    }

    let (venue_a, venue_b) = build_venue_clients(cli.dry_run).await.context("failed to initialize venue clients")?;

    let capital = Arc::new(CapitalManager::new(CapitalConfig {
        initial_bankroll: config.capital.initial_bankroll,
        venue_a_allocation_pct: config.capital.kalshi_allocation_pct,
        venue_b_allocation_pct: config.capital.polymarket_allocation_pct,
        reserve_pct: config.capital.reserve_pct,
        rebalance_threshold: config.capital.rebalance_threshold,
        max_open_positions: config.risk.max_open_positions,
        max_exposure_per_event_pct: config.risk.max_exposure_per_event,
        max_daily_loss_pct: config.risk.max_daily_loss_pct,
    }));
    let circuit_breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        max_daily_loss_pct: config.risk.max_daily_loss_pct,
        max_drawdown_pct: config.risk.max_daily_loss_pct * rust_decimal_macros::dec!(3),
        reset_hour: config.risk.circuit_breaker_reset_hour,
    }));
    let executor = CrossVenueExecutor::new(venue_a.clone(), venue_b.clone(), circuit_breaker.clone());
    let risk_gate = Arc::new(RiskGate::new(capital, circuit_breaker));
    let repository = ArbitrageRepository::new(pool, mode);

    let detector = CrossExchangeDetector::with_config(DetectorConfig {
        threshold_spread: config.trading.threshold_spread,
        min_trade_size_usd: config.trading.min_trade_size_usd,
        max_trade_size_pct: config.trading.max_trade_size_pct,
        target_liquidity_depth: config.trading.target_liquidity_depth,
        max_days_to_resolution: config.capital.max_days_to_resolution,
        high_return_threshold: config.capital.high_return_threshold,
    });
    let matcher = MarketMatcher::with_config(MatchConfig::default());

    let engine = ArbitrageEngine::new(
        venue_a,
        venue_b,
        matcher,
        detector,
        risk_gate,
        executor,
        repository,
        Arc::new(alerts),
        ArbitrageEngineConfig { poll_interval: Duration::from_secs(config.polling.interval_sec), runtime: runtime_rx, mode },
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received");
            let _ = ctrl_c_tx.send(());
        }
    });

    engine.run(shutdown_rx).await
}

/// Seeds the runtime-mutable document (`auto_execute`/`engine_running`/
/// `paper_trading` toggles an operator can flip without restarting) and, if
/// the file already exists on disk, starts a background watcher that
/// broadcasts every edit to the engine. A fresh deployment with no runtime
/// file yet just runs with the seeded defaults until one is created.
fn spawn_runtime_watcher(config: &AppConfig, dry_run: bool, auto_execute: bool) -> watch::Receiver<RuntimeConfig> {
    const RUNTIME_PATH: &str = "config/runtime.json";

    let seed = RuntimeConfig {
        paper_trading: dry_run,
        auto_execute,
        engine_running: true,
        paper_balance: config.capital.initial_bankroll,
        last_updated: Utc::now(),
    };
    let initial = if std::path::Path::new(RUNTIME_PATH).exists() {
        ConfigLoader::load_runtime(RUNTIME_PATH).unwrap_or(seed)
    } else {
        seed
    };

    let (watcher, rx) = ConfigWatcher::new(initial);
    if std::path::Path::new(RUNTIME_PATH).exists() {
        tokio::spawn(async move {
            if let Err(err) = watcher.watch(RUNTIME_PATH).await {
                tracing::warn!(error = %err, "runtime config watcher exited");
            }
        });
    } else {
        tracing::info!(path = RUNTIME_PATH, "no runtime config file found; dynamic reload disabled until one is created");
    }
    rx
}

fn build_alert_manager(config: &AppConfig) -> AlertManager {
    let mut channels: Vec<Arc<dyn algo_trade_arbitrage_cross::AlertChannel>> = Vec::new();
    if config.monitoring.alert_channels.iter().any(|c| c == "telegram") {
        if let Ok(secrets) = SecretsManager::new(None) {
            if let Some(creds) = secrets.telegram_credentials() {
                channels.push(Arc::new(TelegramAlertChannel::new(creds)));
            } else {
                tracing::warn!("telegram alert channel configured but TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID are unset");
            }
        }
    }
    AlertManager::new(
        AlertConfig {
            alert_threshold_spread: config.monitoring.alert_threshold_spread,
            alert_min_opportunity_usd: config.monitoring.alert_min_opportunity_usd,
        },
        channels,
    )
}

async fn build_venue_clients(dry_run: bool) -> anyhow::Result<(Arc<dyn VenueClient>, Arc<dyn VenueClient>)> {
    let kalshi_config = if dry_run { KalshiClientConfig::demo() } else { KalshiClientConfig::production() };
    let kalshi_client = KalshiClient::new(kalshi_config).context("failed to build Kalshi client")?;
    let venue_a: Arc<dyn VenueClient> = Arc::new(KalshiVenueClient::new(kalshi_client));

    let polymarket_client = PolymarketClient::new();
    let executor: Arc<dyn PolymarketExecutor> = if dry_run {
        Arc::new(PaperExecutor::new(PaperExecutorConfig::default()))
    } else {
        Arc::new(LiveExecutor::mainnet().await.context("failed to build Polymarket live executor")?)
    };
    let venue_b: Arc<dyn VenueClient> = Arc::new(PolymarketVenueClient::new(polymarket_client, executor));

    Ok((venue_a, venue_b))
}
