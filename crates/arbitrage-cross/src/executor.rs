//! Two-leg saga executor for cross-venue arbitrage.
//!
//! Submits both legs of an `Opportunity` concurrently via `tokio::join!`,
//! then exhaustively matches on the `(leg1_result, leg2_result)` tuple.
//! A partial fill is never left open: the filled leg is unwound at the
//! mid-price (50c) as an offsetting order, best-effort.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use uuid::Uuid;

use crate::circuit::CircuitBreaker;
use crate::types::{Direction, LegFilled, LegOrders, Opportunity, Position, PositionState};
use crate::venue::{OrderRequest, OrderSide, VenueClient, VenueError};

/// Offsetting order price used to flatten a lone filled leg: neither venue
/// guarantees a fill at any other price, so the unwind treats the contract
/// as a coin flip and takes whatever the market gives at the midpoint.
const UNWIND_MID_PRICE: Decimal = dec!(0.50);

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Both legs filled. Position is open and hedged.
    BothFilled(Position),
    /// One leg filled, the other was rejected; the filled leg was unwound.
    PartialUnwound { position: Position, unwind_error: Option<String> },
    /// Neither leg filled — no capital ever left the venues.
    BothRejected { leg1_error: String, leg2_error: String },
    /// The circuit breaker is open; nothing was submitted.
    CircuitBreakerOpen(String),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::BothFilled(_))
    }

    #[must_use]
    pub fn has_exposure(&self) -> bool {
        matches!(self, Self::PartialUnwound { .. })
    }
}

/// Coordinates order placement across two `VenueClient` trait objects for
/// one arbitrage direction.
pub struct CrossVenueExecutor {
    venue_a: Arc<dyn VenueClient>,
    venue_b: Arc<dyn VenueClient>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl CrossVenueExecutor {
    #[must_use]
    pub fn new(venue_a: Arc<dyn VenueClient>, venue_b: Arc<dyn VenueClient>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            venue_a,
            venue_b,
            circuit_breaker,
        }
    }

    /// Executes `opportunity`, checking the circuit breaker against
    /// `current_balance` first.
    pub async fn execute(&self, opportunity: &Opportunity, current_balance: Decimal) -> ExecutionOutcome {
        if let Err(halted) = self.circuit_breaker.check(current_balance, Utc::now()) {
            warn!(reason = %halted, "circuit breaker blocked execution");
            return ExecutionOutcome::CircuitBreakerOpen(halted.to_string());
        }

        let (leg1_request, leg2_request) = self.build_leg_requests(opportunity);

        info!(
            direction = ?opportunity.direction,
            size = %opportunity.position_size_quote,
            "submitting both legs concurrently"
        );

        let (leg1_result, leg2_result) = tokio::join!(
            self.venue_a_for_direction(opportunity.direction).place_order(&leg1_request),
            self.venue_b_for_direction(opportunity.direction).place_order(&leg2_request),
        );

        match (leg1_result, leg2_result) {
            (Ok(leg1), Ok(leg2)) if leg1.filled && leg2.filled => {
                let position = self.open_position(opportunity, leg1.order_id, leg2.order_id);
                info!(position_id = %position.position_id, "both legs filled");
                ExecutionOutcome::BothFilled(position)
            }

            (Ok(leg1), Ok(leg2)) if leg1.filled && !leg2.filled => {
                self.unwind_and_report(opportunity, leg1.order_id, None, Leg::One).await
            }

            (Ok(leg1), Ok(leg2)) if !leg1.filled && leg2.filled => {
                self.unwind_and_report(opportunity, leg2.order_id, None, Leg::Two).await
            }

            (Ok(leg1), Err(leg2_err)) if leg1.filled => {
                self.unwind_and_report(opportunity, leg1.order_id, Some(leg2_err), Leg::One).await
            }

            (Err(leg1_err), Ok(leg2)) if leg2.filled => {
                self.unwind_and_report(opportunity, leg2.order_id, Some(leg1_err), Leg::Two).await
            }

            (Ok(_), Ok(_)) => ExecutionOutcome::BothRejected {
                leg1_error: "order accepted but not filled".to_string(),
                leg2_error: "order accepted but not filled".to_string(),
            },

            (Err(leg1_err), Err(leg2_err)) => ExecutionOutcome::BothRejected {
                leg1_error: leg1_err.to_string(),
                leg2_error: leg2_err.to_string(),
            },

            (Err(leg1_err), Ok(_)) => ExecutionOutcome::BothRejected {
                leg1_error: leg1_err.to_string(),
                leg2_error: "order accepted but not filled".to_string(),
            },

            (Ok(_), Err(leg2_err)) => ExecutionOutcome::BothRejected {
                leg1_error: "order accepted but not filled".to_string(),
                leg2_error: leg2_err.to_string(),
            },
        }
    }

    fn build_leg_requests(&self, opportunity: &Opportunity) -> (OrderRequest, OrderRequest) {
        let native_id_a = opportunity.paired_event.listing_a.native_id.clone();
        let native_id_b = opportunity.paired_event.listing_b.native_id.clone();

        match opportunity.direction {
            Direction::BuyYesANoB => (
                OrderRequest {
                    native_id: native_id_a,
                    side: OrderSide::Yes,
                    limit_price: opportunity.price_leg1,
                    size: Decimal::from(opportunity.contracts_leg1),
                },
                OrderRequest {
                    native_id: native_id_b,
                    side: OrderSide::No,
                    limit_price: opportunity.price_leg2,
                    size: opportunity.size_leg2,
                },
            ),
            Direction::BuyYesBNoA => (
                OrderRequest {
                    native_id: native_id_b,
                    side: OrderSide::Yes,
                    limit_price: opportunity.price_leg1,
                    size: Decimal::from(opportunity.contracts_leg1),
                },
                OrderRequest {
                    native_id: native_id_a,
                    side: OrderSide::No,
                    limit_price: opportunity.price_leg2,
                    size: opportunity.size_leg2,
                },
            ),
        }
    }

    fn venue_a_for_direction(&self, direction: Direction) -> &Arc<dyn VenueClient> {
        match direction {
            Direction::BuyYesANoB => &self.venue_a,
            Direction::BuyYesBNoA => &self.venue_b,
        }
    }

    fn venue_b_for_direction(&self, direction: Direction) -> &Arc<dyn VenueClient> {
        match direction {
            Direction::BuyYesANoB => &self.venue_b,
            Direction::BuyYesBNoA => &self.venue_a,
        }
    }

    fn open_position(&self, opportunity: &Opportunity, leg1_order_id: String, leg2_order_id: String) -> Position {
        Position {
            position_id: Uuid::new_v4().to_string(),
            opportunity_ref: opportunity.clone(),
            leg_orders: LegOrders {
                leg1_order_id: Some(leg1_order_id),
                leg2_order_id: Some(leg2_order_id),
            },
            leg_filled: LegFilled { leg1: true, leg2: true },
            allocated_capital: opportunity.position_size_quote,
            realized_pnl: None,
            state: PositionState::BothFilled,
        }
    }

    async fn unwind_and_report(
        &self,
        opportunity: &Opportunity,
        filled_order_id: String,
        rejection_error: Option<VenueError>,
        filled_leg: Leg,
    ) -> ExecutionOutcome {
        warn!(filled_leg = ?filled_leg, order_id = %filled_order_id, "one leg filled, unwinding");

        let venue = match filled_leg {
            Leg::One => self.venue_a_for_direction(opportunity.direction),
            Leg::Two => self.venue_b_for_direction(opportunity.direction),
        };

        let unwind_result = self.submit_unwind(venue.as_ref(), opportunity, filled_leg).await;

        let mut leg_orders = LegOrders::default();
        let mut leg_filled = LegFilled::default();
        match filled_leg {
            Leg::One => {
                leg_orders.leg1_order_id = Some(filled_order_id);
                leg_filled.leg1 = true;
            }
            Leg::Two => {
                leg_orders.leg2_order_id = Some(filled_order_id);
                leg_filled.leg2 = true;
            }
        }

        let position = Position {
            position_id: Uuid::new_v4().to_string(),
            opportunity_ref: opportunity.clone(),
            leg_orders,
            leg_filled,
            allocated_capital: opportunity.position_size_quote,
            realized_pnl: None,
            state: if unwind_result.is_ok() {
                PositionState::Closed
            } else {
                PositionState::Failed
            },
        };

        ExecutionOutcome::PartialUnwound {
            position,
            unwind_error: rejection_error.map(|e| e.to_string()).or_else(|| unwind_result.err()),
        }
    }

    async fn submit_unwind(&self, venue: &dyn VenueClient, opportunity: &Opportunity, filled_leg: Leg) -> Result<(), String> {
        let (native_id, side) = match (opportunity.direction, filled_leg) {
            (Direction::BuyYesANoB, Leg::One) => (opportunity.paired_event.listing_a.native_id.clone(), OrderSide::No),
            (Direction::BuyYesANoB, Leg::Two) => (opportunity.paired_event.listing_b.native_id.clone(), OrderSide::Yes),
            (Direction::BuyYesBNoA, Leg::One) => (opportunity.paired_event.listing_b.native_id.clone(), OrderSide::No),
            (Direction::BuyYesBNoA, Leg::Two) => (opportunity.paired_event.listing_a.native_id.clone(), OrderSide::Yes),
        };

        let size = match filled_leg {
            Leg::One => Decimal::from(opportunity.contracts_leg1),
            Leg::Two => opportunity.size_leg2,
        };

        let unwind_order = OrderRequest {
            native_id,
            side,
            limit_price: UNWIND_MID_PRICE,
            size,
        };

        venue.place_order(&unwind_order).await.map(|_| ()).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    One,
    Two,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Listing, ListingStatus, PairedEvent, Quote, RiskTier, VenueId};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct MockVenue {
        id: VenueId,
        fill: bool,
        reject: bool,
        calls: Mutex<Vec<OrderRequest>>,
    }

    #[async_trait]
    impl VenueClient for MockVenue {
        fn venue_id(&self) -> VenueId {
            self.id
        }

        async fn fetch_listings(&self) -> Result<Vec<Listing>, VenueError> {
            Ok(Vec::new())
        }

        async fn fetch_quote(&self, _native_id: &str) -> Result<Quote, VenueError> {
            Ok(Quote {
                best_yes: Some(dec!(0.5)),
                best_no: Some(dec!(0.5)),
                fetched_at: Utc::now(),
            })
        }

        async fn place_order(&self, order: &OrderRequest) -> Result<crate::venue::OrderAck, VenueError> {
            self.calls.lock().push(order.clone());
            if self.reject {
                return Err(VenueError::Rejected("mock reject".to_string()));
            }
            Ok(crate::venue::OrderAck {
                order_id: Uuid::new_v4().to_string(),
                filled: self.fill,
                fill_price: Some(order.limit_price),
                fill_size: Some(order.size),
            })
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<(), VenueError> {
            Ok(())
        }

        async fn order_status(&self, _order_id: &str) -> Result<Option<crate::venue::OrderStatusReport>, VenueError> {
            Ok(None)
        }

        async fn fetch_balance(&self) -> Result<Decimal, VenueError> {
            Ok(dec!(100_000))
        }
    }

    fn sample_opportunity() -> Opportunity {
        let listing = |venue| Listing {
            venue_id: venue,
            native_id: format!("{venue}"),
            question: "Will X happen?".to_string(),
            description: String::new(),
            resolution_time: Some(Utc::now() + chrono::Duration::days(5)),
            status: ListingStatus::Open,
            volume_to_date: dec!(0),
            resting_liquidity: dec!(10_000),
            raw: serde_json::Value::Null,
        };
        Opportunity {
            paired_event: PairedEvent {
                listing_a: listing(VenueId::VenueA),
                listing_b: listing(VenueId::VenueB),
                similarity: 0.95,
            },
            direction: Direction::BuyYesANoB,
            price_leg1: dec!(0.45),
            price_leg2: dec!(0.45),
            spread: dec!(0.90),
            gross_edge: dec!(0.10),
            fee_leg1: dec!(1),
            fee_leg2: dec!(1),
            net_edge: dec!(0.08),
            position_size_quote: dec!(100),
            contracts_leg1: 222,
            size_leg2: dec!(222.22),
            expected_profit: dec!(8),
            expected_roi: dec!(0.08),
            horizon_days: Some(5),
            annualized_roi: Some(dec!(5.84)),
            risk_tier: RiskTier::Low,
            risk_score: 0.1,
            risk_warnings: Vec::new(),
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn both_legs_filled_opens_a_position() {
        let venue_a = Arc::new(MockVenue { id: VenueId::VenueA, fill: true, reject: false, calls: Mutex::new(Vec::new()) });
        let venue_b = Arc::new(MockVenue { id: VenueId::VenueB, fill: true, reject: false, calls: Mutex::new(Vec::new()) });
        let breaker = Arc::new(CircuitBreaker::new(crate::circuit::CircuitBreakerConfig::default()));
        let executor = CrossVenueExecutor::new(venue_a, venue_b, breaker);

        let outcome = executor.execute(&sample_opportunity(), dec!(100_000)).await;
        assert!(outcome.is_filled());
    }

    #[tokio::test]
    async fn partial_fill_triggers_unwind() {
        let venue_a = Arc::new(MockVenue { id: VenueId::VenueA, fill: true, reject: false, calls: Mutex::new(Vec::new()) });
        let venue_b = Arc::new(MockVenue { id: VenueId::VenueB, fill: false, reject: false, calls: Mutex::new(Vec::new()) });
        let breaker = Arc::new(CircuitBreaker::new(crate::circuit::CircuitBreakerConfig::default()));
        let executor = CrossVenueExecutor::new(venue_a, venue_b, breaker);

        let outcome = executor.execute(&sample_opportunity(), dec!(100_000)).await;
        assert!(outcome.has_exposure());
    }

    #[tokio::test]
    async fn both_rejected_leaves_no_exposure() {
        let venue_a = Arc::new(MockVenue { id: VenueId::VenueA, fill: false, reject: true, calls: Mutex::new(Vec::new()) });
        let venue_b = Arc::new(MockVenue { id: VenueId::VenueB, fill: false, reject: true, calls: Mutex::new(Vec::new()) });
        let breaker = Arc::new(CircuitBreaker::new(crate::circuit::CircuitBreakerConfig::default()));
        let executor = CrossVenueExecutor::new(venue_a, venue_b, breaker);

        let outcome = executor.execute(&sample_opportunity(), dec!(100_000)).await;
        assert!(matches!(outcome, ExecutionOutcome::BothRejected { .. }));
        assert!(!outcome.has_exposure());
    }

    #[tokio::test]
    async fn open_circuit_breaker_blocks_execution() {
        let venue_a = Arc::new(MockVenue { id: VenueId::VenueA, fill: true, reject: false, calls: Mutex::new(Vec::new()) });
        let venue_b = Arc::new(MockVenue { id: VenueId::VenueB, fill: true, reject: false, calls: Mutex::new(Vec::new()) });
        let breaker = Arc::new(CircuitBreaker::new(crate::circuit::CircuitBreakerConfig::default()));
        breaker.check(dec!(100_000), Utc::now()).unwrap();
        breaker.check(dec!(80_000), Utc::now()).unwrap_err();

        let executor = CrossVenueExecutor::new(venue_a, venue_b, breaker);
        let outcome = executor.execute(&sample_opportunity(), dec!(80_000)).await;
        assert!(matches!(outcome, ExecutionOutcome::CircuitBreakerOpen(_)));
    }
}
