//! Kalshi exchange integration for the cross-venue arbitrage engine.
//!
//! This crate provides:
//! - REST client with rate limiting for Kalshi trading API
//! - RSA-PSS authentication for API requests
//! - Data models for markets, orders, and positions
//! - A `KalshiVenueClient` adapter onto the venue-agnostic `VenueClient` trait
//!
//! # Example
//!
//! ```ignore
//! use algo_trade_kalshi::{KalshiClient, KalshiClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Create client for demo environment
//!     let client = KalshiClient::demo()?;
//!
//!     // Discover BTC markets
//!     let markets = client.get_tradeable_btc_markets().await?;
//!     println!("Found {} tradeable BTC markets", markets.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Authentication
//!
//! Kalshi uses RSA-PSS (SHA-256) signatures for API authentication.
//! Set the following environment variables:
//!
//! - `KALSHI_API_KEY`: Your API key ID
//! - `KALSHI_PRIVATE_KEY`: Your RSA private key in PEM format
//!
//! For demo environment, use `KALSHI_DEMO_API_KEY` and `KALSHI_DEMO_PRIVATE_KEY`.
//!
//! # API Endpoints
//!
//! The client supports the following Kalshi API endpoints:
//!
//! - `GET /markets` - List markets
//! - `GET /markets/{ticker}` - Get specific market
//! - `GET /markets/{ticker}/orderbook` - Get orderbook
//! - `GET /portfolio/balance` - Get account balance
//! - `GET /portfolio/positions` - Get positions
//! - `POST /portfolio/orders` - Submit order
//! - `DELETE /portfolio/orders/{order_id}` - Cancel order
//! - `GET /portfolio/orders/{order_id}` - Get order status

pub mod auth;
pub mod client;
pub mod error;
pub mod types;
pub mod venue_adapter;

// Re-export main types for convenience
pub use auth::{KalshiAuth, KalshiAuthConfig, SignedHeaders};
pub use client::{KalshiClient, KalshiClientConfig, KALSHI_DEMO_URL, KALSHI_PROD_URL};
pub use error::{KalshiError, Result};
pub use types::{
    Action, Balance, Market, MarketStatus, Order, OrderRequest, OrderStatus, OrderType, Orderbook,
    Position, PriceLevel, Side,
};
pub use venue_adapter::KalshiVenueClient;
