//! Adapts `PolymarketClient` (market data) and a `PolymarketExecutor`
//! implementation (order routing) to the venue-agnostic `VenueClient`
//! contract so the arbitrage engine can drive Polymarket the same way it
//! drives Kalshi.

use std::sync::Arc;

use algo_trade_arbitrage_cross::{
    Listing, ListingStatus, OrderAck, OrderRequest as VenueOrderRequest, OrderSide, OrderStatusReport,
    Quote, RemoteOrderStatus, VenueClient, VenueError, VenueId,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::arbitrage::execution::{ExecutionError, OrderParams, OrderStatus as ClobOrderStatus, PolymarketExecutor};
use crate::client::PolymarketClient;

fn to_remote_status(status: ClobOrderStatus) -> RemoteOrderStatus {
    match status {
        ClobOrderStatus::Pending => RemoteOrderStatus::Open,
        ClobOrderStatus::PartiallyFilled => RemoteOrderStatus::Partial,
        ClobOrderStatus::Filled => RemoteOrderStatus::Filled,
        ClobOrderStatus::Cancelled => RemoteOrderStatus::Cancelled,
        ClobOrderStatus::Rejected | ClobOrderStatus::Expired => RemoteOrderStatus::Rejected,
    }
}

impl From<ExecutionError> for VenueError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Timeout { .. } => VenueError::Timeout,
            ExecutionError::Rejected { reason } => VenueError::Rejected(reason),
            ExecutionError::Signing(msg) => VenueError::Auth(msg),
            other => VenueError::Protocol(other.to_string()),
        }
    }
}

/// `VenueClient` implementation over Polymarket's Gamma/CLOB stack: market
/// data comes from `PolymarketClient`, order routing is delegated to
/// whichever `PolymarketExecutor` the caller wires in (live or paper).
pub struct PolymarketVenueClient {
    client: PolymarketClient,
    executor: Arc<dyn PolymarketExecutor>,
}

impl PolymarketVenueClient {
    #[must_use]
    pub fn new(client: PolymarketClient, executor: Arc<dyn PolymarketExecutor>) -> Self {
        Self { client, executor }
    }
}

#[async_trait]
impl VenueClient for PolymarketVenueClient {
    fn venue_id(&self) -> VenueId {
        VenueId::VenueB
    }

    async fn fetch_listings(&self) -> Result<Vec<Listing>, VenueError> {
        let (markets, _next_cursor) = self
            .client
            .get_markets(None, None)
            .await
            .map_err(|e| VenueError::Protocol(e.to_string()))?;

        Ok(markets
            .into_iter()
            .map(|market| Listing {
                venue_id: VenueId::VenueB,
                native_id: market.condition_id.clone(),
                question: market.question.clone(),
                description: market.description.clone().unwrap_or_default(),
                resolution_time: market.end_date,
                status: if market.active { ListingStatus::Open } else { ListingStatus::Closed },
                volume_to_date: market.volume_24h.unwrap_or(Decimal::ZERO),
                resting_liquidity: market.liquidity.unwrap_or(Decimal::ZERO),
                raw: serde_json::to_value(&market).unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }

    async fn fetch_quote(&self, native_id: &str) -> Result<Quote, VenueError> {
        let market = self
            .client
            .get_market(native_id)
            .await
            .map_err(|e| VenueError::Protocol(e.to_string()))?;
        Ok(Quote {
            best_yes: market.yes_price(),
            best_no: market.no_price(),
            fetched_at: chrono::Utc::now(),
        })
    }

    async fn place_order(&self, order: &VenueOrderRequest) -> Result<OrderAck, VenueError> {
        // `native_id` identifies the market (condition_id); each outcome
        // trades under its own CLOB token_id, so resolve that first.
        let market = self
            .client
            .get_market(&order.native_id)
            .await
            .map_err(|e| VenueError::Protocol(e.to_string()))?;
        let token = match order.side {
            OrderSide::Yes => market.yes_token(),
            OrderSide::No => market.no_token(),
        }
        .ok_or_else(|| VenueError::Protocol(format!("market {} missing outcome token", order.native_id)))?;

        let params = OrderParams::buy_fok(token.token_id.clone(), order.limit_price, order.size);
        let result = self.executor.submit_order(params).await?;
        Ok(OrderAck {
            order_id: result.order_id,
            filled: result.is_filled(),
            fill_price: result.avg_fill_price,
            fill_size: if result.filled_size > Decimal::ZERO { Some(result.filled_size) } else { None },
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError> {
        self.executor.cancel_order(order_id).await?;
        Ok(())
    }

    async fn order_status(&self, order_id: &str) -> Result<Option<OrderStatusReport>, VenueError> {
        let result = self.executor.get_order_status(order_id).await?;
        Ok(Some(OrderStatusReport {
            status: to_remote_status(result.status),
            filled_qty: result.filled_size,
        }))
    }

    async fn fetch_balance(&self) -> Result<Decimal, VenueError> {
        Ok(self.executor.get_balance().await?)
    }
}
