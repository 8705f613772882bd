//! Polymarket CLOB integration for statistical trading engine.
//!
//! This crate provides:
//! - REST client with rate limiting for Polymarket CLOB API
//! - Gamma API client for market discovery
//! - Models for markets, tokens, and prices
//! - Arbitrage execution layer for paired YES/NO trading
//!
//! # Example
//!
//! ```no_run
//! use algo_trade_polymarket::{PolymarketClient, GammaClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gamma = GammaClient::new();
//!     let markets = gamma.get_all_current_15min_markets().await;
//!     println!("Discovered {} markets", markets.len());
//!
//!     let client = PolymarketClient::new();
//!     let (markets, _cursor) = client.get_markets(None, None).await?;
//!     println!("Fetched {} markets", markets.len());
//!
//!     Ok(())
//! }
//! ```

pub mod arbitrage;
pub mod client;
pub mod gamma;
pub mod models;
pub mod venue_adapter;

// Re-export main types
pub use client::PolymarketClient;
pub use gamma::GammaClient;
pub use models::{Coin, GammaEvent, GammaMarket, Market, MarketFilter, Price, Token};
pub use venue_adapter::PolymarketVenueClient;
