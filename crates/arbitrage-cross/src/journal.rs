//! Durable history of opportunities, trades, and balance snapshots.
//!
//! Backed by SQLite via `sqlx`. Unlike the original two-commit pattern
//! (save trade, then separately update the opportunity's status), `record_trade`
//! does both writes inside one transaction so a crash between them can never
//! leave an opportunity stuck in `detected` state after its trade exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::types::{ExecutionMode, Opportunity, Position, PositionState};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone)]
pub struct OpportunityRecord {
    pub position_id: String,
    pub question: String,
    pub similarity_score: f64,
    pub direction: String,
    pub net_edge: Decimal,
    pub position_size_usd: Decimal,
    pub expected_profit: Decimal,
    pub risk_tier: String,
    pub status: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BalanceSnapshotRecord {
    pub balance_a: Decimal,
    pub balance_b: Decimal,
    pub locked_capital: Decimal,
    pub open_positions: i64,
    pub realized_pnl: Decimal,
    pub daily_pnl: Decimal,
    pub snapshot_at: DateTime<Utc>,
}

/// A trade still open (not yet `closed`) as of the last journal write,
/// used to reconcile against live venue state at Engine startup.
#[derive(Debug, Clone)]
pub struct OpenPositionRecord {
    pub position_id: String,
    pub leg1_order_id: Option<String>,
    pub leg2_order_id: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceSummary {
    pub opportunities_detected: i64,
    pub trades_executed: i64,
    pub trades_closed: i64,
    pub total_pnl: Decimal,
    pub win_rate: f64,
}

/// Opens a connection pool and applies any pending migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, JournalError> {
    let pool = SqlitePoolOptions::new().max_connections(5).connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Repository for arbitrage opportunity, trade, and balance history,
/// partitioned by `ExecutionMode` so paper and live data never mix.
#[derive(Debug, Clone)]
pub struct ArbitrageRepository {
    pool: SqlitePool,
    mode: ExecutionMode,
}

impl ArbitrageRepository {
    #[must_use]
    pub fn new(pool: SqlitePool, mode: ExecutionMode) -> Self {
        Self { pool, mode }
    }

    pub async fn save_opportunity(&self, opportunity: &Opportunity, position_id: &str) -> Result<(), JournalError> {
        sqlx::query(
            r"
            INSERT INTO opportunities (
                position_id, venue_a_native_id, venue_b_native_id, question,
                similarity_score, direction, price_leg1, price_leg2, spread,
                gross_edge, net_edge, position_size_usd, expected_profit,
                expected_roi, risk_tier, status, detected_at, execution_mode
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'detected', ?, ?)
            ",
        )
        .bind(position_id)
        .bind(&opportunity.paired_event.listing_a.native_id)
        .bind(&opportunity.paired_event.listing_b.native_id)
        .bind(&opportunity.paired_event.listing_a.question)
        .bind(opportunity.paired_event.similarity)
        .bind(format!("{:?}", opportunity.direction))
        .bind(opportunity.price_leg1.to_string())
        .bind(opportunity.price_leg2.to_string())
        .bind(opportunity.spread.to_string())
        .bind(opportunity.gross_edge.to_string())
        .bind(opportunity.net_edge.to_string())
        .bind(opportunity.position_size_quote.to_string())
        .bind(opportunity.expected_profit.to_string())
        .bind(opportunity.expected_roi.to_string())
        .bind(format!("{:?}", opportunity.risk_tier))
        .bind(opportunity.detected_at.to_rfc3339())
        .bind(self.mode.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records the trade and transitions the opportunity's status in a
    /// single transaction.
    pub async fn record_trade(&self, position: &Position) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await?;

        let status = match position.state {
            PositionState::BothFilled | PositionState::Closed => "filled",
            PositionState::Failed => "failed",
            _ => "pending",
        };

        sqlx::query(
            r"
            INSERT INTO trades (
                position_id, leg1_order_id, leg2_order_id, leg1_filled, leg2_filled,
                allocated_capital, status, realized_pnl, created_at, execution_mode
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&position.position_id)
        .bind(&position.leg_orders.leg1_order_id)
        .bind(&position.leg_orders.leg2_order_id)
        .bind(position.leg_filled.leg1)
        .bind(position.leg_filled.leg2)
        .bind(position.allocated_capital.to_string())
        .bind(status)
        .bind(position.realized_pnl.map(|p| p.to_string()))
        .bind(Utc::now().to_rfc3339())
        .bind(self.mode.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE opportunities SET status = ?, executed_at = ? WHERE position_id = ? AND execution_mode = ?")
            .bind(status)
            .bind(Utc::now().to_rfc3339())
            .bind(&position.position_id)
            .bind(self.mode.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn close_position(&self, position_id: &str, pnl: Decimal) -> Result<(), JournalError> {
        sqlx::query("UPDATE trades SET status = 'closed', closed_at = ?, realized_pnl = ? WHERE position_id = ? AND execution_mode = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(pnl.to_string())
            .bind(position_id)
            .bind(self.mode.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn save_balance_snapshot(&self, snapshot: &BalanceSnapshotRecord) -> Result<(), JournalError> {
        sqlx::query(
            r"
            INSERT INTO balance_snapshots (
                balance_a, balance_b, locked_capital, open_positions,
                realized_pnl, unrealized_pnl, daily_pnl, snapshot_at, execution_mode
            ) VALUES (?, ?, ?, ?, ?, '0', ?, ?, ?)
            ",
        )
        .bind(snapshot.balance_a.to_string())
        .bind(snapshot.balance_b.to_string())
        .bind(snapshot.locked_capital.to_string())
        .bind(snapshot.open_positions)
        .bind(snapshot.realized_pnl.to_string())
        .bind(snapshot.daily_pnl.to_string())
        .bind(snapshot.snapshot_at.to_rfc3339())
        .bind(self.mode.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_opportunities(&self, limit: i64) -> Result<Vec<OpportunityRecord>, JournalError> {
        let rows: Vec<(String, String, f64, String, String, String, String, String, String)> = sqlx::query_as(
            r"
            SELECT position_id, question, similarity_score, direction, net_edge,
                   position_size_usd, expected_profit, risk_tier, status
            FROM opportunities WHERE execution_mode = ? ORDER BY detected_at DESC LIMIT ?
            ",
        )
        .bind(self.mode.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(position_id, question, similarity_score, direction, net_edge, size, profit, risk_tier, status)| OpportunityRecord {
                    position_id,
                    question,
                    similarity_score,
                    direction,
                    net_edge: net_edge.parse().unwrap_or_default(),
                    position_size_usd: size.parse().unwrap_or_default(),
                    expected_profit: profit.parse().unwrap_or_default(),
                    risk_tier,
                    status,
                    detected_at: Utc::now(),
                },
            )
            .collect())
    }

    pub async fn open_position_count(&self) -> Result<i64, JournalError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades WHERE status IN ('pending', 'filled') AND execution_mode = ?")
            .bind(self.mode.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Trades recorded as `pending` or `filled` but never `closed` — the
    /// set the Engine must reconcile against venue-reported order status
    /// after a restart.
    pub async fn get_open_positions(&self) -> Result<Vec<OpenPositionRecord>, JournalError> {
        let rows: Vec<(String, Option<String>, Option<String>, String)> = sqlx::query_as(
            r"
            SELECT position_id, leg1_order_id, leg2_order_id, status
            FROM trades WHERE status IN ('pending', 'filled') AND execution_mode = ?
            ",
        )
        .bind(self.mode.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(position_id, leg1_order_id, leg2_order_id, status)| OpenPositionRecord {
                position_id,
                leg1_order_id,
                leg2_order_id,
                status,
            })
            .collect())
    }

    pub async fn performance_summary(&self, since: DateTime<Utc>) -> Result<PerformanceSummary, JournalError> {
        let opportunities: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM opportunities WHERE detected_at >= ? AND execution_mode = ?")
            .bind(since.to_rfc3339())
            .bind(self.mode.as_str())
            .fetch_one(&self.pool)
            .await?;

        let trades: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades WHERE created_at >= ? AND execution_mode = ?")
            .bind(since.to_rfc3339())
            .bind(self.mode.as_str())
            .fetch_one(&self.pool)
            .await?;

        let closed: Vec<(String,)> =
            sqlx::query_as("SELECT realized_pnl FROM trades WHERE status = 'closed' AND realized_pnl IS NOT NULL AND created_at >= ? AND execution_mode = ?")
                .bind(since.to_rfc3339())
                .bind(self.mode.as_str())
                .fetch_all(&self.pool)
                .await?;

        let pnls: Vec<Decimal> = closed.into_iter().filter_map(|(p,)| p.parse().ok()).collect();
        let total_pnl: Decimal = pnls.iter().sum();
        let wins = pnls.iter().filter(|p| **p > Decimal::ZERO).count();
        let win_rate = if pnls.is_empty() { 0.0 } else { wins as f64 / pnls.len() as f64 };

        Ok(PerformanceSummary {
            opportunities_detected: opportunities.0,
            trades_executed: trades.0,
            trades_closed: pnls.len() as i64,
            total_pnl,
            win_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, LegFilled, LegOrders, Listing, ListingStatus, PairedEvent, RiskTier, VenueId};
    use rust_decimal_macros::dec;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn sample_listing(venue: VenueId) -> Listing {
        Listing {
            venue_id: venue,
            native_id: format!("{venue}"),
            question: "Will X happen?".to_string(),
            description: String::new(),
            resolution_time: Some(Utc::now() + chrono::Duration::days(5)),
            status: ListingStatus::Open,
            volume_to_date: dec!(0),
            resting_liquidity: dec!(10_000),
            raw: serde_json::Value::Null,
        }
    }

    fn sample_opportunity() -> Opportunity {
        Opportunity {
            paired_event: PairedEvent {
                listing_a: sample_listing(VenueId::VenueA),
                listing_b: sample_listing(VenueId::VenueB),
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

    fn sample_position() -> Position {
        Position {
            position_id: "pos-1".to_string(),
            opportunity_ref: sample_opportunity(),
            leg_orders: LegOrders {
                leg1_order_id: Some("a1".to_string()),
                leg2_order_id: Some("b1".to_string()),
            },
            leg_filled: LegFilled { leg1: true, leg2: true },
            allocated_capital: dec!(100),
            realized_pnl: None,
            state: PositionState::BothFilled,
        }
    }

    #[tokio::test]
    async fn migrations_add_execution_mode_column() {
        let pool = test_pool().await;
        let repo = ArbitrageRepository::new(pool, ExecutionMode::Paper);
        repo.save_opportunity(&sample_opportunity(), "pos-1").await.unwrap();
        let rows = repo.recent_opportunities(10).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn record_trade_updates_opportunity_status_in_one_transaction() {
        let pool = test_pool().await;
        let repo = ArbitrageRepository::new(pool, ExecutionMode::Paper);
        repo.save_opportunity(&sample_opportunity(), "pos-1").await.unwrap();
        repo.record_trade(&sample_position()).await.unwrap();

        let rows = repo.recent_opportunities(10).await.unwrap();
        assert_eq!(rows[0].status, "filled");
    }

    #[tokio::test]
    async fn paper_and_live_modes_do_not_share_rows() {
        let pool = test_pool().await;
        let paper_repo = ArbitrageRepository::new(pool.clone(), ExecutionMode::Paper);
        let live_repo = ArbitrageRepository::new(pool, ExecutionMode::Live);

        paper_repo.save_opportunity(&sample_opportunity(), "pos-1").await.unwrap();
        assert_eq!(paper_repo.recent_opportunities(10).await.unwrap().len(), 1);
        assert_eq!(live_repo.recent_opportunities(10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn get_open_positions_excludes_closed_trades() {
        let pool = test_pool().await;
        let repo = ArbitrageRepository::new(pool, ExecutionMode::Paper);
        repo.save_opportunity(&sample_opportunity(), "pos-1").await.unwrap();
        repo.record_trade(&sample_position()).await.unwrap();

        let open = repo.get_open_positions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].position_id, "pos-1");
        assert_eq!(open[0].leg1_order_id.as_deref(), Some("a1"));

        repo.close_position("pos-1", dec!(1)).await.unwrap();
        assert!(repo.get_open_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_position_records_realized_pnl() {
        let pool = test_pool().await;
        let repo = ArbitrageRepository::new(pool, ExecutionMode::Paper);
        repo.save_opportunity(&sample_opportunity(), "pos-1").await.unwrap();
        repo.record_trade(&sample_position()).await.unwrap();
        repo.close_position("pos-1", dec!(12.50)).await.unwrap();

        let summary = repo.performance_summary(Utc::now() - chrono::Duration::days(1)).await.unwrap();
        assert_eq!(summary.trades_closed, 1);
        assert_eq!(summary.total_pnl, dec!(12.50));
    }
}
