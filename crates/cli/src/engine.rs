//! Cross-venue arbitrage engine: startup sequence, the scheduled side jobs,
//! and the main scan-execute loop.
//!
//! Grounded on the original engine's control flow: a circuit-breaker check
//! opens every tick; listings are fetched from both venues, matched, quoted,
//! and scored; the top candidates are journaled and alerted; execution is
//! gated on the runtime-mutable `auto_execute`/`engine_running` toggles, so
//! an operator can pause scanning or flip execution on without restarting
//! the process. Four side jobs run alongside the main loop on fixed
//! cadences (balance refresh, balance snapshot, daily summary, daily
//! metrics reset) — driven by `tokio::time::interval` rather than a cron
//! scheduler, since every cadence here is fixed or a single daily trigger.

use std::sync::Arc;
use std::time::Duration;

use algo_trade_arbitrage_cross::journal::{ArbitrageRepository, BalanceSnapshotRecord};
use algo_trade_arbitrage_cross::{
    AlertManager, CrossExchangeDetector, CrossVenueExecutor, ExecutionMode, ExecutionOutcome,
    MarketMatcher, Opportunity, RemoteOrderStatus, RiskGate, VenueClient,
};
use algo_trade_core::RuntimeConfig;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Of all opportunities surviving detection in one tick, at most this many
/// are journaled, alerted, and (if enabled) executed.
const TOP_OPPORTUNITIES_PER_TICK: usize = 5;
const BALANCE_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(15 * 60);
const DAILY_JOB_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct ArbitrageEngineConfig {
    pub poll_interval: Duration,
    pub runtime: watch::Receiver<RuntimeConfig>,
    pub mode: ExecutionMode,
}

/// Wires together every cross-venue component into the process's main run
/// loop. Holds no state of its own beyond what it was constructed with —
/// `RiskGate` owns the mutable portfolio and breaker state (and serializes
/// the two against each other), so the engine is safe to drive from a
/// single task.
pub struct ArbitrageEngine {
    venue_a: Arc<dyn VenueClient>,
    venue_b: Arc<dyn VenueClient>,
    matcher: MarketMatcher,
    detector: CrossExchangeDetector,
    risk_gate: Arc<RiskGate>,
    executor: CrossVenueExecutor,
    repository: ArbitrageRepository,
    alerts: Arc<AlertManager>,
    poll_interval: Duration,
    runtime: watch::Receiver<RuntimeConfig>,
    mode: ExecutionMode,
}

impl ArbitrageEngine {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        venue_a: Arc<dyn VenueClient>,
        venue_b: Arc<dyn VenueClient>,
        matcher: MarketMatcher,
        detector: CrossExchangeDetector,
        risk_gate: Arc<RiskGate>,
        executor: CrossVenueExecutor,
        repository: ArbitrageRepository,
        alerts: Arc<AlertManager>,
        config: ArbitrageEngineConfig,
    ) -> Self {
        Self {
            venue_a,
            venue_b,
            matcher,
            detector,
            risk_gate,
            executor,
            repository,
            alerts,
            poll_interval: config.poll_interval,
            runtime: config.runtime,
            mode: config.mode,
        }
    }

    /// Runs the engine until `shutdown` fires or the circuit breaker trips.
    /// The main scan loop, balance refresh, balance snapshot, and daily-job
    /// checks all run out of one `tokio::select!` so a single shutdown
    /// signal stops everything together.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        info!(mode = %self.mode, poll_interval_secs = self.poll_interval.as_secs(), "starting arbitrage engine");
        self.startup_check().await;

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut balance_refresh = tokio::time::interval(BALANCE_REFRESH_INTERVAL);
        balance_refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snapshot = tokio::time::interval(SNAPSHOT_INTERVAL);
        snapshot.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut daily_check = tokio::time::interval(DAILY_JOB_CHECK_INTERVAL);
        daily_check.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_daily_reset_date = Utc::now().date_naive();

        let mut iteration: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("shutdown signal received, stopping engine");
                    return Ok(());
                }
                _ = poll.tick() => {
                    iteration += 1;
                    if !self.runtime.borrow().engine_running {
                        info!(iteration, "engine paused via runtime config, skipping tick");
                    } else if let Err(err) = self.scan_and_execute(iteration).await {
                        error!(error = %err, "scan-and-execute tick failed");
                        self.alerts.send_error_alert("Main Loop Error", &err.to_string()).await;
                    }
                    if !self.risk_gate.circuit_breaker().is_trading_allowed() {
                        warn!("circuit breaker open, stopping engine");
                        return Ok(());
                    }
                }
                _ = balance_refresh.tick() => {
                    self.update_balances().await;
                }
                _ = snapshot.tick() => {
                    self.save_balance_snapshot().await;
                }
                _ = daily_check.tick() => {
                    let today = Utc::now().date_naive();
                    if today != last_daily_reset_date {
                        self.send_daily_summary().await;
                        self.risk_gate.capital().reset_daily_metrics();
                        last_daily_reset_date = today;
                    }
                }
            }
        }
    }

    async fn startup_check(&self) {
        if !self.alerts.test_connection().await {
            warn!("one or more alert channels failed the startup connectivity check");
        }
        self.reconcile_open_positions().await;
    }

    /// Resynchronizes journaled open positions against live venue state
    /// after a restart: a crash between order placement and journal update
    /// (or between fill and close) can leave a position's recorded status
    /// stale, so every open leg is polled via `order_status` and mismatches
    /// are surfaced rather than silently trusted.
    async fn reconcile_open_positions(&self) {
        let open_positions = match self.repository.get_open_positions().await {
            Ok(positions) => positions,
            Err(err) => {
                error!(error = %err, "failed to load open positions for startup reconciliation");
                return;
            }
        };
        if open_positions.is_empty() {
            info!("no open positions to reconcile at startup");
            return;
        }
        info!(count = open_positions.len(), "reconciling open positions at startup");

        for position in &open_positions {
            self.reconcile_leg(&position.position_id, "leg1", self.venue_a.as_ref(), position.leg1_order_id.as_deref())
                .await;
            self.reconcile_leg(&position.position_id, "leg2", self.venue_b.as_ref(), position.leg2_order_id.as_deref())
                .await;
        }
    }

    async fn reconcile_leg(&self, position_id: &str, leg: &str, venue: &dyn VenueClient, order_id: Option<&str>) {
        let Some(order_id) = order_id else {
            return;
        };
        match venue.order_status(order_id).await {
            Ok(Some(report)) => match report.status {
                RemoteOrderStatus::Filled => {
                    info!(position_id, leg, order_id, "reconciled: order filled at venue");
                }
                RemoteOrderStatus::Cancelled | RemoteOrderStatus::Rejected => {
                    warn!(position_id, leg, order_id, status = ?report.status, "journaled position's order did not survive at venue");
                    self.alerts
                        .send_error_alert(
                            "Startup Reconciliation Mismatch",
                            &format!("position {position_id} {leg} order {order_id} is {:?} at venue but open in the journal", report.status),
                        )
                        .await;
                }
                RemoteOrderStatus::Open | RemoteOrderStatus::Partial => {
                    warn!(position_id, leg, order_id, status = ?report.status, "journaled position still open at venue after restart");
                }
            },
            Ok(None) => {
                warn!(position_id, leg, order_id, "venue no longer recognizes journaled order id");
            }
            Err(err) => {
                error!(position_id, leg, order_id, error = %err, "failed to query order status during startup reconciliation");
            }
        }
    }

    async fn scan_and_execute(&self, iteration: u64) -> anyhow::Result<()> {
        let portfolio = self.risk_gate.capital().portfolio_state();
        if let Err(halted) = self.risk_gate.circuit_breaker().check(portfolio.total_balance(), Utc::now()) {
            error!(reason = %halted, "circuit breaker triggered");
            self.alerts.send_error_alert("Circuit Breaker Triggered", &halted.to_string()).await;
            return Ok(());
        }

        let (listings_a, listings_b) = tokio::join!(self.venue_a.fetch_listings(), self.venue_b.fetch_listings());
        let listings_a = match listings_a {
            Ok(listings) => listings,
            Err(err) => {
                warn!(venue = "a", error = %err, "failed to fetch listings, skipping tick");
                return Ok(());
            }
        };
        let listings_b = match listings_b {
            Ok(listings) => listings,
            Err(err) => {
                warn!(venue = "b", error = %err, "failed to fetch listings, skipping tick");
                return Ok(());
            }
        };
        if listings_a.is_empty() || listings_b.is_empty() {
            warn!(iteration, "one or both venues returned no open listings, skipping tick");
            return Ok(());
        }

        let pairs = self.matcher.find_matches(&listings_a, &listings_b);
        if pairs.is_empty() {
            return Ok(());
        }

        let bankroll = self.risk_gate.capital().available_capital();
        let mut opportunities = Vec::new();
        for pair in &pairs {
            let (quote_a, quote_b) = tokio::join!(
                self.venue_a.fetch_quote(&pair.listing_a.native_id),
                self.venue_b.fetch_quote(&pair.listing_b.native_id),
            );
            let (quote_a, quote_b) = match (quote_a, quote_b) {
                (Ok(a), Ok(b)) => (a, b),
                _ => continue,
            };
            if let Ok(opportunity) = self.detector.detect(pair, &quote_a, &quote_b, bankroll) {
                opportunities.push(opportunity);
            }
        }
        if opportunities.is_empty() {
            return Ok(());
        }
        opportunities.sort_by(|a, b| b.expected_profit.cmp(&a.expected_profit));

        for opportunity in opportunities.iter().take(TOP_OPPORTUNITIES_PER_TICK) {
            let position_id = format!(
                "arb_{}_{}",
                Utc::now().timestamp(),
                opportunity.paired_event.listing_a.native_id.chars().take(8).collect::<String>()
            );

            if let Err(err) = self.repository.save_opportunity(opportunity, &position_id).await {
                warn!(position_id, error = %err, "failed to persist opportunity");
            }
            self.alerts.send_opportunity_alert(opportunity).await;

            if self.runtime.borrow().auto_execute {
                self.try_execute(opportunity, &position_id).await;
            } else {
                info!(position_id, "auto-execute disabled, skipping execution");
            }
        }

        Ok(())
    }

    async fn try_execute(&self, opportunity: &Opportunity, position_id: &str) {
        let current_balance = self.risk_gate.capital().portfolio_state().total_balance();
        if let Err(err) = self.risk_gate.try_allocate(opportunity.position_size_quote, position_id, current_balance, Utc::now()) {
            warn!(position_id, error = %err, "risk gate declined to open position");
            return;
        }

        let outcome = self.executor.execute(opportunity, current_balance).await;

        match &outcome {
            ExecutionOutcome::BothFilled(position) => {
                if let Err(err) = self.repository.record_trade(position).await {
                    error!(position_id, error = %err, "failed to record trade");
                }
                self.alerts.send_execution_alert(position_id, true, "both legs filled").await;
                info!(position_id, "position opened");
            }
            ExecutionOutcome::PartialUnwound { position, unwind_error } => {
                if let Err(err) = self.repository.record_trade(position).await {
                    error!(position_id, error = %err, "failed to record trade");
                }
                let detail = unwind_error.clone().unwrap_or_else(|| "unwound cleanly".to_string());
                self.alerts.send_execution_alert(position_id, false, &detail).await;
                self.risk_gate.capital().release(position_id, Decimal::ZERO);
                warn!(position_id, detail, "partial fill unwound");
            }
            ExecutionOutcome::BothRejected { leg1_error, leg2_error } => {
                self.alerts
                    .send_execution_alert(position_id, false, &format!("both legs rejected: {leg1_error} / {leg2_error}"))
                    .await;
                self.risk_gate.capital().release(position_id, Decimal::ZERO);
                warn!(position_id, leg1_error, leg2_error, "both legs rejected");
            }
            ExecutionOutcome::CircuitBreakerOpen(reason) => {
                self.alerts.send_execution_alert(position_id, false, reason).await;
                self.risk_gate.capital().release(position_id, Decimal::ZERO);
            }
        }
    }

    async fn update_balances(&self) {
        let (balance_a, balance_b) = tokio::join!(self.venue_a.fetch_balance(), self.venue_b.fetch_balance());
        match (balance_a, balance_b) {
            (Ok(a), Ok(b)) => self.risk_gate.capital().update_balances(a, b),
            (a, b) => warn!(venue_a_ok = a.is_ok(), venue_b_ok = b.is_ok(), "balance refresh failed for at least one venue"),
        }
    }

    async fn save_balance_snapshot(&self) {
        let portfolio = self.risk_gate.capital().portfolio_state();
        let snapshot = BalanceSnapshotRecord {
            balance_a: portfolio.balance_a,
            balance_b: portfolio.balance_b,
            locked_capital: portfolio.locked_capital,
            open_positions: i64::from(portfolio.open_positions),
            realized_pnl: portfolio.realized_pnl,
            daily_pnl: portfolio.daily_pnl,
            snapshot_at: Utc::now(),
        };
        if let Err(err) = self.repository.save_balance_snapshot(&snapshot).await {
            warn!(error = %err, "failed to save balance snapshot");
        }
    }

    async fn send_daily_summary(&self) {
        match self.repository.performance_summary(Utc::now() - chrono::Duration::days(1)).await {
            Ok(summary) => {
                let portfolio = self.risk_gate.capital().portfolio_state();
                self.alerts.send_daily_summary(&summary, &portfolio).await;
            }
            Err(err) => warn!(error = %err, "failed to compute performance summary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_arbitrage_cross::{
        AlertChannel, AlertConfig, AlertError, AlertPriority, CapitalConfig, CapitalManager, CircuitBreaker,
        CircuitBreakerConfig, DetectorConfig, Listing, ListingStatus, MatchConfig, OrderAck, OrderRequest, Quote,
        VenueError, VenueId,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    struct StubVenue {
        id: VenueId,
        listings: Vec<Listing>,
        quotes: std::collections::HashMap<String, Quote>,
        fill: bool,
        orders: Mutex<Vec<OrderRequest>>,
    }

    #[async_trait]
    impl VenueClient for StubVenue {
        fn venue_id(&self) -> VenueId {
            self.id
        }

        async fn fetch_listings(&self) -> Result<Vec<Listing>, VenueError> {
            Ok(self.listings.clone())
        }

        async fn fetch_quote(&self, native_id: &str) -> Result<Quote, VenueError> {
            self.quotes.get(native_id).copied().ok_or_else(|| VenueError::Protocol("no quote".to_string()))
        }

        async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError> {
            self.orders.lock().push(order.clone());
            Ok(OrderAck {
                order_id: "ord-1".to_string(),
                filled: self.fill,
                fill_price: Some(order.limit_price),
                fill_size: Some(order.size),
            })
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<(), VenueError> {
            Ok(())
        }

        async fn order_status(
            &self,
            _order_id: &str,
        ) -> Result<Option<algo_trade_arbitrage_cross::OrderStatusReport>, VenueError> {
            Ok(None)
        }

        async fn fetch_balance(&self) -> Result<Decimal, VenueError> {
            Ok(dec!(50_000))
        }
    }

    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertChannel for Arc<RecordingChannel> {
        async fn send(&self, message: &str, _priority: AlertPriority) -> Result<(), AlertError> {
            self.sent.lock().push(message.to_string());
            Ok(())
        }
    }

    fn sample_listing(venue: VenueId, native_id: &str) -> Listing {
        Listing {
            venue_id: venue,
            native_id: native_id.to_string(),
            question: "Will the Fed cut rates in March?".to_string(),
            description: String::new(),
            resolution_time: Some(Utc::now() + chrono::Duration::days(5)),
            status: ListingStatus::Open,
            volume_to_date: dec!(1000),
            resting_liquidity: dec!(10_000),
            raw: serde_json::Value::Null,
        }
    }

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("../arbitrage-cross/migrations").run(&pool).await.unwrap();
        pool
    }

    async fn build_engine(
        auto_execute: bool,
        fill: bool,
        alerts_recorder: Arc<RecordingChannel>,
    ) -> ArbitrageEngine {
        let listing_a = sample_listing(VenueId::VenueA, "venue-a-mkt");
        let listing_b = sample_listing(VenueId::VenueB, "venue-b-mkt");

        let mut quotes_a = std::collections::HashMap::new();
        quotes_a.insert(
            "venue-a-mkt".to_string(),
            Quote { best_yes: Some(dec!(0.30)), best_no: Some(dec!(0.99)), fetched_at: Utc::now() },
        );
        let mut quotes_b = std::collections::HashMap::new();
        quotes_b.insert(
            "venue-b-mkt".to_string(),
            Quote { best_yes: Some(dec!(0.30)), best_no: Some(dec!(0.30)), fetched_at: Utc::now() },
        );

        let venue_a: Arc<dyn VenueClient> =
            Arc::new(StubVenue { id: VenueId::VenueA, listings: vec![listing_a], quotes: quotes_a, fill, orders: Mutex::new(Vec::new()) });
        let venue_b: Arc<dyn VenueClient> =
            Arc::new(StubVenue { id: VenueId::VenueB, listings: vec![listing_b], quotes: quotes_b, fill, orders: Mutex::new(Vec::new()) });

        let capital = Arc::new(CapitalManager::new(CapitalConfig::default()));
        let circuit_breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let executor = CrossVenueExecutor::new(venue_a.clone(), venue_b.clone(), circuit_breaker.clone());
        let risk_gate = Arc::new(RiskGate::new(capital, circuit_breaker));
        let pool = test_pool().await;
        let repository = ArbitrageRepository::new(pool, ExecutionMode::Paper);
        let alerts = Arc::new(AlertManager::new(
            AlertConfig { alert_threshold_spread: dec!(0.015), alert_min_opportunity_usd: dec!(1) },
            vec![Arc::new(alerts_recorder)],
        ));

        ArbitrageEngine::new(
            venue_a,
            venue_b,
            MarketMatcher::with_config(MatchConfig::default()),
            CrossExchangeDetector::with_config(DetectorConfig::default()),
            risk_gate,
            executor,
            repository,
            alerts,
            ArbitrageEngineConfig {
                poll_interval: Duration::from_secs(30),
                runtime: watch::channel(RuntimeConfig {
                    paper_trading: true,
                    auto_execute,
                    engine_running: true,
                    paper_balance: dec!(100_000),
                    last_updated: Utc::now(),
                })
                .1,
                mode: ExecutionMode::Paper,
            },
        )
    }

    #[tokio::test]
    async fn skips_tick_when_a_venue_returns_no_listings() {
        let recorder = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()) });
        let mut engine = build_engine(false, true, recorder.clone()).await;
        engine.venue_a = Arc::new(StubVenue {
            id: VenueId::VenueA,
            listings: Vec::new(),
            quotes: std::collections::HashMap::new(),
            fill: true,
            orders: Mutex::new(Vec::new()),
        });

        engine.scan_and_execute(1).await.unwrap();
        assert!(recorder.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn scan_and_execute_saves_and_alerts_without_auto_execute() {
        let recorder = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()) });
        let engine = build_engine(false, true, recorder.clone()).await;

        engine.scan_and_execute(1).await.unwrap();

        assert!(!recorder.sent.lock().is_empty());
        let saved = engine.repository.recent_opportunities(10).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].status, "detected");
    }

    #[tokio::test]
    async fn scan_and_execute_records_a_trade_when_auto_execute_enabled() {
        let recorder = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()) });
        let engine = build_engine(true, true, recorder.clone()).await;

        engine.scan_and_execute(1).await.unwrap();

        let saved = engine.repository.recent_opportunities(10).await.unwrap();
        assert_eq!(saved[0].status, "filled");
    }
}
