//! Adapts `KalshiClient` to the venue-agnostic `VenueClient` contract so the
//! arbitrage engine can drive Kalshi without knowing its cents-denominated
//! wire format.

use algo_trade_arbitrage_cross::{
    Listing, ListingStatus, OrderAck, OrderRequest as VenueOrderRequest, OrderSide, OrderStatusReport,
    Quote, RemoteOrderStatus, VenueClient, VenueError, VenueId,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::client::KalshiClient;
use crate::error::KalshiError;
use crate::types::{MarketStatus, OrderRequest as KalshiOrderRequest, OrderStatus as KalshiOrderStatus};

fn to_remote_status(status: KalshiOrderStatus) -> RemoteOrderStatus {
    match status {
        KalshiOrderStatus::Pending | KalshiOrderStatus::Resting => RemoteOrderStatus::Open,
        KalshiOrderStatus::PartialFilled => RemoteOrderStatus::Partial,
        KalshiOrderStatus::Filled => RemoteOrderStatus::Filled,
        KalshiOrderStatus::Cancelled => RemoteOrderStatus::Cancelled,
        KalshiOrderStatus::Rejected => RemoteOrderStatus::Rejected,
    }
}

impl From<KalshiError> for VenueError {
    fn from(err: KalshiError) -> Self {
        match err {
            KalshiError::Authentication(msg) | KalshiError::Signing(msg) => VenueError::Auth(msg),
            KalshiError::RateLimit { .. } | KalshiError::Timeout(_) => VenueError::Timeout,
            KalshiError::Api { status_code, message } => {
                VenueError::Rejected(format!("{status_code}: {message}"))
            }
            other => VenueError::Protocol(other.to_string()),
        }
    }
}

fn to_listing_status(status: MarketStatus) -> ListingStatus {
    match status {
        MarketStatus::Open => ListingStatus::Open,
        MarketStatus::Closed => ListingStatus::Closed,
        MarketStatus::Settled => ListingStatus::Settled,
        MarketStatus::Paused => ListingStatus::Closed,
    }
}

/// Converts a cents price (1-99) to a dollar-denominated `Decimal`.
fn cents_to_decimal(cents: Decimal) -> Decimal {
    cents / Decimal::from(100)
}

/// `VenueClient` implementation backed by the Kalshi REST API.
pub struct KalshiVenueClient {
    client: KalshiClient,
}

impl KalshiVenueClient {
    #[must_use]
    pub fn new(client: KalshiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VenueClient for KalshiVenueClient {
    fn venue_id(&self) -> VenueId {
        VenueId::VenueA
    }

    async fn fetch_listings(&self) -> Result<Vec<Listing>, VenueError> {
        let markets = self.client.get_markets(None).await?;
        Ok(markets
            .into_iter()
            .map(|market| Listing {
                venue_id: VenueId::VenueA,
                native_id: market.ticker.clone(),
                question: market.title.clone(),
                description: market.subtitle.clone().unwrap_or_default(),
                resolution_time: market.expiration_time,
                status: to_listing_status(market.status),
                volume_to_date: market.volume_24h.map(Decimal::from).unwrap_or(Decimal::ZERO),
                resting_liquidity: market
                    .yes_bid
                    .zip(market.yes_ask)
                    .map(|(bid, ask)| bid + ask)
                    .unwrap_or(Decimal::ZERO),
                raw: serde_json::to_value(&market).unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }

    async fn fetch_quote(&self, native_id: &str) -> Result<Quote, VenueError> {
        let market = self.client.get_market(native_id).await?;
        Ok(Quote {
            best_yes: market.yes_ask.map(cents_to_decimal),
            best_no: market.no_ask.map(cents_to_decimal),
            fetched_at: chrono::Utc::now(),
        })
    }

    async fn place_order(&self, order: &VenueOrderRequest) -> Result<OrderAck, VenueError> {
        let price_cents = (order.limit_price * Decimal::from(100))
            .round()
            .to_string()
            .parse::<u32>()
            .map_err(|_| VenueError::Protocol("limit price out of cents range".to_string()))?;
        let count = order
            .size
            .to_string()
            .parse::<f64>()
            .map(|n| n.round() as u32)
            .map_err(|_| VenueError::Protocol("size is not a valid contract count".to_string()))?;

        let kalshi_order: KalshiOrderRequest = match order.side {
            OrderSide::Yes => KalshiOrderRequest::buy_yes(order.native_id.clone(), price_cents, count),
            OrderSide::No => KalshiOrderRequest::buy_no(order.native_id.clone(), price_cents, count),
        };

        let placed = self.client.submit_order(&kalshi_order).await?;
        Ok(OrderAck {
            order_id: placed.order_id,
            filled: placed.is_filled(),
            fill_price: placed.avg_fill_price.map(cents_to_decimal),
            fill_size: if placed.filled_count > 0 {
                Some(Decimal::from(placed.filled_count))
            } else {
                None
            },
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError> {
        self.client.cancel_order(order_id).await?;
        Ok(())
    }

    async fn order_status(&self, order_id: &str) -> Result<Option<OrderStatusReport>, VenueError> {
        match self.client.get_order(order_id).await {
            Ok(order) => Ok(Some(OrderStatusReport {
                status: to_remote_status(order.status),
                filled_qty: Decimal::from(order.filled_count),
            })),
            Err(KalshiError::Api { status_code: 404, .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch_balance(&self) -> Result<Decimal, VenueError> {
        let balance = self.client.get_balance().await?;
        Ok(cents_to_decimal(Decimal::from(balance.available_balance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kalshi_market_status_to_listing_status() {
        assert_eq!(to_listing_status(MarketStatus::Open), ListingStatus::Open);
        assert_eq!(to_listing_status(MarketStatus::Settled), ListingStatus::Settled);
    }

    #[test]
    fn converts_cents_to_dollars() {
        assert_eq!(cents_to_decimal(Decimal::from(45)), Decimal::new(45, 2));
    }

    #[test]
    fn maps_kalshi_order_status_to_remote_status() {
        assert_eq!(to_remote_status(KalshiOrderStatus::Resting), RemoteOrderStatus::Open);
        assert_eq!(to_remote_status(KalshiOrderStatus::PartialFilled), RemoteOrderStatus::Partial);
        assert_eq!(to_remote_status(KalshiOrderStatus::Filled), RemoteOrderStatus::Filled);
        assert_eq!(to_remote_status(KalshiOrderStatus::Cancelled), RemoteOrderStatus::Cancelled);
        assert_eq!(to_remote_status(KalshiOrderStatus::Rejected), RemoteOrderStatus::Rejected);
    }
}
