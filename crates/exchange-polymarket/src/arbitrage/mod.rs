//! Order execution for Polymarket binary markets.
//!
//! This module provides the execution-layer infrastructure used by the
//! venue adapter: signing and submitting orders through the CLOB API, a
//! paper-trading stand-in for dry runs, and rate limiting. Trading-halt
//! decisions live one level up, in the venue-agnostic
//! `arbitrage_cross::CircuitBreaker`.
//!
//! # Modules
//!
//! - [`execution`]: Order execution traits and types
//! - [`live_executor`] / [`paper_executor`]: `PolymarketExecutor` implementations
//! - [`sdk_client`]: CLOB REST client
//! - [`signer`]: EIP-712 order signing
//! - [`rate_limiter`]: safety rail around submission rate
//!
//! # Fee Model
//!
//! Polymarket charges a 2% fee on profit from the winning side:
//! - E[Fee] = 0.01 * (2 - pair_cost)
//!
//! With typical Polygon gas costs (~$0.007 per transaction), the break-even
//! pair cost is approximately $0.975.

pub mod execution;
pub mod live_executor;
pub mod paper_executor;
pub mod rate_limiter;
pub mod sdk_client;
pub mod signer;

// Execution layer re-exports
pub use execution::{
    ArbitragePositionSnapshot, ExecutionError, ExecutionResult, ExecutorConfig, OrderParams,
    OrderResult, OrderStatus, OrderType, PolymarketExecutor, Position, RiskLimit, Side,
};

// Paper trading executor
pub use paper_executor::{PaperExecutor, PaperExecutorConfig};

// Live trading executor
pub use live_executor::{
    HardLimits, LiveExecutor, LiveExecutorConfig, POLYMARKET_MAINNET_URL, POLYMARKET_TESTNET_URL,
};

// Rate limiting
pub use rate_limiter::{ClobRateLimiter, RateLimiterConfig};

// Secure wallet for order signing
pub use signer::{Wallet, WalletConfig, WalletError};

// CLOB API client
pub use sdk_client::{ClobClient, ClobClientConfig, ClobError};
