//! Venue-agnostic client contract.
//!
//! The Executor and Engine Loop talk to venue A and venue B exclusively
//! through this trait; `exchange-kalshi` and `exchange-polymarket` each
//! provide one implementation. Retry/backoff/timeout policy (exponential
//! backoff, base 0.5s, factor 2, cap 8s, 5 attempts for 429/5xx; immediate
//! failure otherwise; 10s hard timeout) lives inside each implementation,
//! not here.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Listing, Quote, VenueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Yes,
    No,
}

/// A single-leg order request, denominated in the venue's own quoting
/// convention (venue A: integer cents; venue B: decimal dollars). Venue
/// clients are responsible for their own unit conversion.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub native_id: String,
    pub side: OrderSide,
    pub limit_price: Decimal,
    pub size: Decimal,
}

/// Outcome of submitting one order.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub filled: bool,
    pub fill_price: Option<Decimal>,
    pub fill_size: Option<Decimal>,
}

/// Normalized state of a previously placed order, as reported by
/// `VenueClient::order_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOrderStatus {
    Open,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct OrderStatusReport {
    pub status: RemoteOrderStatus,
    pub filled_qty: Decimal,
}

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("venue request timed out")]
    Timeout,
    #[error("venue rejected the request: {0}")]
    Rejected(String),
    #[error("venue returned an unexpected response: {0}")]
    Protocol(String),
    #[error("venue authentication failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The normalized surface every venue client exposes to the rest of the
/// engine.
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn venue_id(&self) -> VenueId;

    /// Fetches the current set of open listings.
    async fn fetch_listings(&self) -> Result<Vec<Listing>, VenueError>;

    /// Fetches a current best-yes/best-no quote for one listing.
    async fn fetch_quote(&self, native_id: &str) -> Result<Quote, VenueError>;

    /// Places a single-leg order and returns the venue's immediate
    /// response (filled, partially filled, or rejected).
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, VenueError>;

    /// Cancels a previously placed order, best-effort.
    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError>;

    /// Polls a previously placed order's current status. Used by the Engine
    /// Loop to reconcile open positions after a restart. Returns `Ok(None)`
    /// if the venue no longer recognizes the order id.
    async fn order_status(&self, order_id: &str) -> Result<Option<OrderStatusReport>, VenueError>;

    /// Fetches the venue's reported account balance in USD.
    async fn fetch_balance(&self) -> Result<Decimal, VenueError>;
}
