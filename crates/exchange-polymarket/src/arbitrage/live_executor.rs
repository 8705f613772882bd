//! Live execution handler for Polymarket arbitrage using polymarket-client-sdk.
//!
//! This module provides production order execution for Polymarket's CLOB.
//! The actual signing and submission uses the polymarket-client-sdk library for
//! EIP-712 order signing.
//!
//! # Overview
//!
//! The `LiveExecutor` wraps the polymarket-client-sdk library and implements the
//! `PolymarketExecutor` trait for production trading. It handles:
//!
//! - Wallet initialization from private keys
//! - EIP-712 order signing via polymarket-client-sdk
//! - Rate limiting for API calls
//! - Order validation against hard limits
//! - Daily volume tracking
//! - Retry logic with exponential backoff
//!
//! Trading-halt decisions live one level up, in the venue-agnostic
//! `arbitrage_cross::CircuitBreaker` that gates `CrossVenueExecutor::execute`
//! before either leg reaches a venue client — this executor only enforces
//! the hard per-order/per-day limits below it.
//!
//! # Security
//!
//! - Private keys are loaded from environment variables, NEVER logged
//! - All orders are validated against configurable hard limits
//! - Daily volume limits prevent runaway trading
//! - Minimum balance reserve ensures funds for unwinding
//!
//! # Example
//!
//! ```ignore
//! use algo_trade_polymarket::arbitrage::live_executor::{LiveExecutor, LiveExecutorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create executor for mainnet (loads wallet from env)
//!     let executor = LiveExecutor::mainnet().await?;
//!
//!     println!("Trading as address: {}", executor.address());
//!
//!     // Check balance
//!     let balance = executor.get_balance().await?;
//!     println!("Available balance: {}", balance);
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::execution::{
    ExecutionError, OrderParams, OrderResult, OrderType, PolymarketExecutor, Position, Side,
};
use super::rate_limiter::{ClobRateLimiter, RateLimiterConfig};
use super::sdk_client::{ClobClient, ClobClientConfig, ClobError};
use super::signer::{Wallet, WalletConfig, WalletError};

// =============================================================================
// Constants
// =============================================================================

/// Polymarket CLOB mainnet URL.
pub const POLYMARKET_MAINNET_URL: &str = "https://clob.polymarket.com";

/// Polymarket CLOB testnet URL (Mumbai).
pub const POLYMARKET_TESTNET_URL: &str = "https://clob.polymarket.com";

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for the live executor.
///
/// Controls connection settings, rate limiting, and safety parameters.
#[derive(Debug, Clone)]
pub struct LiveExecutorConfig {
    /// Base URL for the CLOB API.
    pub base_url: String,

    /// Wallet configuration (env var name, chain ID).
    pub wallet_config: WalletConfig,

    /// CLOB client configuration.
    pub clob_config: ClobClientConfig,

    /// Rate limiter configuration.
    pub rate_limiter_config: RateLimiterConfig,

    /// Hard limits for order validation (safety).
    pub hard_limits: HardLimits,

    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,

    /// Timeout in seconds for order operations.
    pub order_timeout_secs: u64,

    /// Whether to use neg_risk flag (check market's neg_risk field via CLOB API).
    pub neg_risk: bool,
}

impl Default for LiveExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: POLYMARKET_MAINNET_URL.to_string(),
            wallet_config: WalletConfig::mainnet(),
            clob_config: ClobClientConfig::mainnet(),
            rate_limiter_config: RateLimiterConfig::default(),
            hard_limits: HardLimits::default(),
            max_retries: 3,
            order_timeout_secs: 10,
            neg_risk: false,
        }
    }
}

impl LiveExecutorConfig {
    /// Creates a mainnet configuration.
    ///
    /// Loads wallet credentials from environment variable:
    /// - `POLYMARKET_PRIVATE_KEY`: Wallet private key (64-char hex, optional 0x prefix)
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            base_url: POLYMARKET_MAINNET_URL.to_string(),
            wallet_config: WalletConfig::mainnet(),
            clob_config: ClobClientConfig::mainnet(),
            ..Default::default()
        }
    }

    /// Creates a testnet configuration.
    ///
    /// Uses Amoy testnet for testing without real funds.
    #[must_use]
    pub fn testnet() -> Self {
        Self {
            base_url: POLYMARKET_TESTNET_URL.to_string(),
            wallet_config: WalletConfig::testnet(),
            clob_config: ClobClientConfig::testnet(),
            ..Default::default()
        }
    }

    /// Creates a micro testing configuration with tight limits.
    ///
    /// Suitable for initial validation with small amounts.
    #[must_use]
    pub fn micro_testing() -> Self {
        Self {
            base_url: POLYMARKET_MAINNET_URL.to_string(),
            wallet_config: WalletConfig::mainnet(),
            clob_config: ClobClientConfig::mainnet(),
            rate_limiter_config: RateLimiterConfig::conservative(),
            hard_limits: HardLimits::micro_testing(),
            max_retries: 2,
            order_timeout_secs: 15,
            neg_risk: false,
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the wallet configuration.
    #[must_use]
    pub fn with_wallet_config(mut self, config: WalletConfig) -> Self {
        self.wallet_config = config;
        self
    }

    /// Sets the CLOB client configuration.
    #[must_use]
    pub fn with_clob_config(mut self, config: ClobClientConfig) -> Self {
        self.clob_config = config;
        self
    }

    /// Sets the rate limiter configuration.
    #[must_use]
    pub fn with_rate_limiter_config(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiter_config = config;
        self
    }

    /// Sets the maximum retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the order timeout.
    #[must_use]
    pub fn with_order_timeout_secs(mut self, secs: u64) -> Self {
        self.order_timeout_secs = secs;
        self
    }

    /// Sets the neg_risk flag.
    #[must_use]
    pub fn with_neg_risk(mut self, neg_risk: bool) -> Self {
        self.neg_risk = neg_risk;
        self
    }

    /// Sets the hard limits.
    #[must_use]
    pub fn with_hard_limits(mut self, limits: HardLimits) -> Self {
        self.hard_limits = limits;
        self
    }
}

// =============================================================================
// Hard Limits
// =============================================================================

/// Hard limits for order validation.
///
/// These are safety limits to prevent catastrophic trading errors.
/// All orders are validated against these limits before submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardLimits {
    /// Maximum order size in shares.
    pub max_order_size: Decimal,

    /// Minimum order size in shares.
    pub min_order_size: Decimal,

    /// Maximum price (should be < 1.0 for probability markets).
    pub max_price: Decimal,

    /// Minimum price (should be > 0.0).
    pub min_price: Decimal,

    /// Maximum single order value in USDC.
    pub max_order_value: Decimal,

    /// Maximum daily volume in USDC.
    pub max_daily_volume: Decimal,

    /// Minimum balance reserve to keep (prevents draining account).
    pub min_balance_reserve: Decimal,
}

impl Default for HardLimits {
    fn default() -> Self {
        Self {
            max_order_size: dec!(10000),    // Max 10k shares per order
            min_order_size: dec!(5),        // Min 1 share
            max_price: dec!(0.99),          // Max 99 cents
            min_price: dec!(0.01),          // Min 1 cent
            max_order_value: dec!(5000),    // Max $5k per order
            max_daily_volume: dec!(50000),  // Max $50k daily volume
            min_balance_reserve: dec!(100), // Keep $100 minimum
        }
    }
}

impl HardLimits {
    /// Creates conservative hard limits for initial testing.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_order_size: dec!(1000),
            min_order_size: dec!(5),
            max_price: dec!(0.95),
            min_price: dec!(0.05),
            max_order_value: dec!(500),
            max_daily_volume: dec!(5000),
            min_balance_reserve: dec!(200),
        }
    }

    /// Creates micro testing hard limits for very small amounts.
    #[must_use]
    pub fn micro_testing() -> Self {
        Self {
            max_order_size: dec!(200),
            min_order_size: dec!(5),
            max_price: dec!(0.95),
            min_price: dec!(0.05),
            max_order_value: dec!(10),
            max_daily_volume: dec!(100),
            min_balance_reserve: dec!(5),
        }
    }

    /// Creates aggressive hard limits for production.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            max_order_size: dec!(50000),
            min_order_size: dec!(5),
            max_price: dec!(0.99),
            min_price: dec!(0.01),
            max_order_value: dec!(20000),
            max_daily_volume: dec!(200000),
            min_balance_reserve: dec!(500),
        }
    }

    /// Validates an order against these limits.
    ///
    /// # Errors
    /// Returns an error message if validation fails.
    pub fn validate_order(&self, order: &OrderParams) -> Result<(), String> {
        // Validate size
        if order.size < self.min_order_size {
            return Err(format!(
                "Order size {} below minimum {}",
                order.size, self.min_order_size
            ));
        }
        if order.size > self.max_order_size {
            return Err(format!(
                "Order size {} exceeds maximum {}",
                order.size, self.max_order_size
            ));
        }

        // Validate price
        if order.price < self.min_price {
            return Err(format!(
                "Order price {} below minimum {}",
                order.price, self.min_price
            ));
        }
        if order.price > self.max_price {
            return Err(format!(
                "Order price {} exceeds maximum {}",
                order.price, self.max_price
            ));
        }

        // Validate order value
        let order_value = order.notional_value();
        if order_value > self.max_order_value {
            return Err(format!(
                "Order value {} exceeds maximum {}",
                order_value, self.max_order_value
            ));
        }

        Ok(())
    }

    /// Validates that an order doesn't exceed remaining daily volume.
    ///
    /// # Arguments
    /// * `order` - The order to validate
    /// * `current_daily_volume` - Volume already traded today
    ///
    /// # Errors
    /// Returns an error message if daily volume would be exceeded.
    pub fn validate_daily_volume(
        &self,
        order: &OrderParams,
        current_daily_volume: Decimal,
    ) -> Result<(), String> {
        let order_value = order.notional_value();
        let new_total = current_daily_volume + order_value;

        if new_total > self.max_daily_volume {
            return Err(format!(
                "Order would exceed daily volume limit: {} + {} = {} > {}",
                current_daily_volume, order_value, new_total, self.max_daily_volume
            ));
        }

        Ok(())
    }

    /// Validates that balance after order would meet minimum reserve.
    ///
    /// # Arguments
    /// * `order` - The order to validate
    /// * `current_balance` - Current account balance
    ///
    /// # Errors
    /// Returns an error message if balance would fall below reserve.
    pub fn validate_balance_reserve(
        &self,
        order: &OrderParams,
        current_balance: Decimal,
    ) -> Result<(), String> {
        let order_value = order.notional_value();
        let remaining = current_balance - order_value;

        if remaining < self.min_balance_reserve {
            return Err(format!(
                "Order would leave balance {} below minimum reserve {}",
                remaining, self.min_balance_reserve
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Daily Volume Tracker
// =============================================================================

/// Tracks daily trading volume for limit enforcement.
#[derive(Debug)]
struct DailyVolumeTracker {
    /// Current day's total volume.
    volume: Decimal,

    /// Date when volume was last reset (days since epoch).
    last_reset_day: u64,
}

impl DailyVolumeTracker {
    /// Creates a new tracker with zero volume.
    fn new() -> Self {
        Self {
            volume: Decimal::ZERO,
            last_reset_day: Self::current_day(),
        }
    }

    /// Returns current day as days since Unix epoch.
    fn current_day() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() / 86400)
            .unwrap_or(0)
    }

    /// Resets volume if day has changed.
    fn maybe_reset(&mut self) {
        let current = Self::current_day();
        if current != self.last_reset_day {
            self.volume = Decimal::ZERO;
            self.last_reset_day = current;
        }
    }

    /// Gets current daily volume, resetting if needed.
    fn get(&mut self) -> Decimal {
        self.maybe_reset();
        self.volume
    }

    /// Adds to daily volume.
    fn add(&mut self, amount: Decimal) {
        self.maybe_reset();
        self.volume += amount;
    }
}

// =============================================================================
// Live Executor
// =============================================================================

/// Live executor for production Polymarket trading.
///
/// Implements `PolymarketExecutor` trait for real order execution.
/// Uses polymarket-client-sdk for EIP-712 order signing.
///
/// # Safety Features
///
/// - Hard limits prevent oversized orders
/// - Daily volume tracking prevents runaway trading
/// - Minimum balance reserve ensures funds for unwinding
/// - Rate limiting prevents API abuse
///
/// # Thread Safety
///
/// The executor is thread-safe and can be shared across tasks.
pub struct LiveExecutor {
    /// Configuration.
    config: LiveExecutorConfig,

    /// Wallet address (cached for display, actual wallet owned by client).
    wallet_address: String,

    /// Chain ID.
    chain_id: u64,

    /// CLOB API client (owns the wallet).
    client: ClobClient,

    /// Rate limiter for API calls.
    rate_limiter: ClobRateLimiter,

    /// Daily volume tracker (protected by RwLock for interior mutability).
    daily_volume: RwLock<DailyVolumeTracker>,

    /// Cached balance (updated on each get_balance call).
    cached_balance: RwLock<Option<Decimal>>,
}

impl std::fmt::Debug for LiveExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveExecutor")
            .field("base_url", &self.config.base_url)
            .field("wallet_address", &self.wallet_address)
            .field("chain_id", &self.chain_id)
            .field("daily_volume", &self.daily_volume.read().volume)
            .finish_non_exhaustive()
    }
}

impl LiveExecutor {
    /// Creates a new live executor with the given configuration.
    ///
    /// # Arguments
    /// * `config` - Executor configuration
    ///
    /// # Errors
    /// Returns error if wallet initialization fails.
    pub async fn new(config: LiveExecutorConfig) -> Result<Self, WalletError> {
        // Initialize wallet from environment
        let wallet = Wallet::from_env(config.wallet_config.clone())?;

        // Cache wallet info before moving wallet to client
        let wallet_address = wallet.address().to_string();
        let chain_id = wallet.chain_id();

        // Initialize CLOB client (takes ownership of wallet)
        let client = ClobClient::new(wallet, config.clob_config.clone()).map_err(|e| {
            WalletError::SigningFailed(format!("Failed to create CLOB client: {e}"))
        })?;

        // Initialize rate limiter
        let rate_limiter = ClobRateLimiter::new(config.rate_limiter_config.clone());

        tracing::info!(
            address = %wallet_address,
            chain_id = chain_id,
            max_order_value = %config.hard_limits.max_order_value,
            max_daily_volume = %config.hard_limits.max_daily_volume,
            "LiveExecutor initialized"
        );

        Ok(Self {
            config,
            wallet_address,
            chain_id,
            client,
            rate_limiter,
            daily_volume: RwLock::new(DailyVolumeTracker::new()),
            cached_balance: RwLock::new(None),
        })
    }

    /// Creates a live executor for Polygon mainnet.
    ///
    /// Loads wallet from default environment variable:
    /// - `POLYMARKET_PRIVATE_KEY`
    ///
    /// # Errors
    /// Returns error if environment variable is missing or invalid.
    pub async fn mainnet() -> Result<Self, WalletError> {
        Self::new(LiveExecutorConfig::mainnet()).await
    }

    /// Creates a live executor for Amoy testnet.
    ///
    /// # Errors
    /// Returns error if environment variable is missing or invalid.
    pub async fn testnet() -> Result<Self, WalletError> {
        Self::new(LiveExecutorConfig::testnet()).await
    }

    /// Creates a live executor with micro testing configuration.
    ///
    /// # Errors
    /// Returns error if environment variable is missing or invalid.
    pub async fn micro_testing() -> Result<Self, WalletError> {
        Self::new(LiveExecutorConfig::micro_testing()).await
    }

    /// Authenticates with the CLOB API.
    ///
    /// Must be called before submitting orders.
    ///
    /// # Errors
    /// Returns error if authentication fails.
    pub async fn authenticate(&mut self) -> Result<(), ExecutionError> {
        self.client
            .authenticate()
            .await
            .map_err(|e| e.into_execution_error())
    }

    /// Queries and sets the taker fee rate for a given token.
    ///
    /// Call this once at startup with any token from the markets you'll trade.
    /// Fee-enabled markets (15-min crypto) return 1000 bps (10%).
    ///
    /// If the API returns 0 but a non-zero fee was already configured,
    /// the pre-configured value is kept (the API endpoint may not exist).
    pub async fn configure_fee_rate(&mut self, token_id: &str) -> Result<(), ExecutionError> {
        let bps = self
            .client
            .get_fee_rate_bps(token_id)
            .await
            .map_err(|e| e.into_execution_error())?;
        let current = self.client.config().taker_fee_bps;
        if bps > 0 {
            self.client.set_taker_fee_bps(bps);
            tracing::info!(fee_rate_bps = bps, token_id = %token_id, "Configured taker fee rate from API");
        } else if current > 0 {
            tracing::info!(fee_rate_bps = current, token_id = %token_id, "API returned 0, keeping pre-configured fee rate");
        } else {
            tracing::warn!(token_id = %token_id, "API returned fee_rate_bps=0 and no default configured");
        }
        Ok(())
    }

    /// Returns true if the client is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }

    /// Returns the wallet address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.wallet_address
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LiveExecutorConfig {
        &self.config
    }

    /// Returns the chain ID.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Returns the current daily volume.
    #[must_use]
    pub fn daily_volume(&self) -> Decimal {
        self.daily_volume.write().get()
    }

    /// Validates an order against all safety checks.
    ///
    /// Checks:
    /// 1. Hard limits (size, price, order value)
    /// 2. Daily volume limit
    /// 3. Balance reserve (if balance is cached)
    fn validate_order(&self, order: &OrderParams) -> Result<(), ExecutionError> {
        // Validate against hard limits
        self.config
            .hard_limits
            .validate_order(order)
            .map_err(ExecutionError::InvalidOrder)?;

        // Validate daily volume
        let current_volume = self.daily_volume.write().get();
        self.config
            .hard_limits
            .validate_daily_volume(order, current_volume)
            .map_err(ExecutionError::InvalidOrder)?;

        // Validate balance reserve if we have cached balance
        if let Some(balance) = *self.cached_balance.read() {
            self.config
                .hard_limits
                .validate_balance_reserve(order, balance)
                .map_err(|_| ExecutionError::InsufficientBalance {
                    required: order.notional_value() + self.config.hard_limits.min_balance_reserve,
                    available: balance,
                })?;
        }

        Ok(())
    }

    /// Waits for rate limiter before making an order submission API call.
    async fn wait_for_order_submit(&self) {
        self.rate_limiter.wait_for_order_submit().await;
    }

    /// Waits for rate limiter before making a read API call.
    async fn wait_for_read(&self) {
        self.rate_limiter.wait_for_read().await;
    }

    /// Waits for rate limiter before making an order cancel API call.
    async fn wait_for_order_cancel(&self) {
        self.rate_limiter.wait_for_order_cancel().await;
    }

    /// Converts ClobError to ExecutionError.
    fn handle_clob_error(&self, error: ClobError) -> ExecutionError {
        error.into_execution_error()
    }

    /// Converts our Side type to SDK Side type string.
    #[allow(dead_code)]
    fn side_to_string(side: Side) -> &'static str {
        match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Converts our OrderType to SDK OrderType string.
    #[allow(dead_code)]
    fn order_type_to_string(order_type: OrderType) -> &'static str {
        match order_type {
            OrderType::Fok => "FOK",
            OrderType::Fak => "FAK",
            OrderType::Gtc => "GTC",
        }
    }
}

// =============================================================================
// Trait Implementation
// =============================================================================

#[async_trait]
impl PolymarketExecutor for LiveExecutor {
    async fn submit_order(&self, order: OrderParams) -> Result<OrderResult, ExecutionError> {
        // Validate order against all safety checks
        self.validate_order(&order)?;

        // Wait for rate limit
        self.wait_for_order_submit().await;

        tracing::info!(
            token_id = %order.token_id,
            side = ?order.side,
            price = %order.price,
            size = %order.size,
            order_type = ?order.order_type,
            "Submitting order"
        );

        // Submit via CLOB client with retry
        let result = self
            .client
            .submit_order_with_retry(&order)
            .await
            .map_err(|e| self.handle_clob_error(e))?;

        // Update daily volume on success
        if result.status.has_fills() {
            let fill_value = result.fill_notional();
            self.daily_volume.write().add(fill_value);
        }

        tracing::info!(
            order_id = %result.order_id,
            status = ?result.status,
            filled_size = %result.filled_size,
            "Order submitted"
        );

        Ok(result)
    }

    async fn submit_orders_batch(
        &self,
        orders: Vec<OrderParams>,
    ) -> Result<Vec<OrderResult>, ExecutionError> {
        // Validate all orders against safety checks
        for order in &orders {
            self.validate_order(order)?;
        }

        // Wait for rate limit
        self.wait_for_order_submit().await;

        tracing::info!(count = orders.len(), "Submitting order batch");

        // Submit orders sequentially (Polymarket doesn't have batch endpoint)
        let mut results = Vec::with_capacity(orders.len());
        for order in orders {
            match self.submit_order(order).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    // Record failure and create rejected result
                    results.push(OrderResult::rejected(
                        uuid::Uuid::new_v4().to_string(),
                        e.to_string(),
                    ));
                }
            }
        }

        Ok(results)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecutionError> {
        // Wait for rate limit
        self.wait_for_order_cancel().await;

        tracing::info!(order_id = %order_id, "Cancelling order");

        self.client
            .cancel_order(order_id)
            .await
            .map_err(|e| self.handle_clob_error(e))?;

        Ok(())
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderResult, ExecutionError> {
        // Wait for rate limit
        self.wait_for_read().await;

        self.client
            .get_order_status(order_id)
            .await
            .map_err(|e| self.handle_clob_error(e))
    }

    async fn wait_for_terminal(
        &self,
        order_id: &str,
        timeout: Duration,
    ) -> Result<OrderResult, ExecutionError> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(250);

        loop {
            if start.elapsed() > timeout {
                return Err(ExecutionError::timeout(order_id));
            }

            match self.get_order_status(order_id).await {
                Ok(result) => {
                    if result.status.is_terminal() {
                        return Ok(result);
                    }
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(order_id = %order_id, error = %e, "Retryable error, will retry");
                }
                Err(e) => {
                    return Err(e);
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn get_positions(&self) -> Result<Vec<Position>, ExecutionError> {
        // Wait for rate limit
        self.wait_for_read().await;

        // Query wallet positions from Polymarket Data API
        let wallet_positions = self
            .client
            .get_positions()
            .await
            .map_err(|e| self.handle_clob_error(e))?;

        // Convert WalletPosition to Position
        let positions: Vec<Position> = wallet_positions
            .into_iter()
            .map(|wp| {
                let size = Decimal::from_f64_retain(wp.size).unwrap_or_default();
                let avg_price = Decimal::from_f64_retain(wp.avg_price).unwrap_or_default();
                let current_price = Some(Decimal::from_f64_retain(wp.cur_price).unwrap_or_default());
                let unrealized_pnl = current_price.map(|cp| (cp - avg_price) * size);

                Position {
                    token_id: wp.asset,
                    size,
                    avg_price,
                    current_price,
                    unrealized_pnl,
                }
            })
            .collect();

        tracing::debug!(count = positions.len(), "Fetched wallet positions");

        Ok(positions)
    }

    async fn get_balance(&self) -> Result<Decimal, ExecutionError> {
        // Wait for rate limit
        self.wait_for_read().await;

        let balance = self
            .client
            .get_balance()
            .await
            .map_err(|e| self.handle_clob_error(e))?;

        // Cache the balance for validation
        *self.cached_balance.write() = Some(balance);

        // Check if balance is below the configured reserve
        if balance < self.config.hard_limits.min_balance_reserve {
            tracing::warn!(
                balance = %balance,
                threshold = %self.config.hard_limits.min_balance_reserve,
                "Balance below minimum reserve"
            );
        }

        Ok(balance)
    }

    async fn get_effective_balance(&self) -> Result<Decimal, ExecutionError> {
        // Get USDC balance
        let usdc_balance = self.get_balance().await?;

        // Query positions for redeemable value (non-fatal on failure)
        let redeemable_value = match self.get_positions().await {
            Ok(positions) => positions
                .iter()
                .filter(|p| {
                    // Positions with cur_price >= 0.95 are winners ready to redeem
                    p.current_price.map_or(false, |price| price >= dec!(0.95))
                })
                .fold(Decimal::ZERO, |acc, p| acc + p.size),
            Err(e) => {
                tracing::warn!("Failed to fetch positions for effective balance, using USDC only: {e}");
                Decimal::ZERO
            }
        };

        let effective = usdc_balance + redeemable_value;
        if redeemable_value > Decimal::ZERO {
            tracing::info!(
                usdc = %usdc_balance,
                redeemable = %redeemable_value,
                effective = %effective,
                "Effective balance includes redeemable positions"
            );
        }

        Ok(effective)
    }

    async fn redeem_resolved_positions(&self) -> Result<u64, ExecutionError> {
        let rpc_url = std::env::var("POLYGON_RPC_URL")
            .unwrap_or_else(|_| "https://polygon-rpc.com".to_string());

        self.client
            .redeem_resolved_positions(&rpc_url)
            .await
            .map_err(|e| self.handle_clob_error(e))
    }
}

// =============================================================================
// Tests
// =============================================================================
