//! Outbound notifications for detected opportunities, executions, errors,
//! and daily performance summaries.
//!
//! Channels implement `AlertChannel`; `TelegramAlertChannel` is the only
//! one shipped, posting to the Bot API via `reqwest`. Additional channels
//! (email, Discord) can be added without touching `AlertManager`.

use std::sync::Arc;

use algo_trade_core::secrets::TelegramCredentials;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::journal::PerformanceSummary;
use crate::types::{Opportunity, PortfolioState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertPriority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("channel transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn send(&self, message: &str, priority: AlertPriority) -> Result<(), AlertError>;
}

/// Gating thresholds for opportunity alerts, mirroring
/// `config::MonitoringConfig`.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub alert_threshold_spread: Decimal,
    pub alert_min_opportunity_usd: Decimal,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_threshold_spread: rust_decimal_macros::dec!(0.015),
            alert_min_opportunity_usd: rust_decimal_macros::dec!(500),
        }
    }
}

/// Dispatches the four message kinds to every configured channel.
pub struct AlertManager {
    config: AlertConfig,
    channels: Vec<Arc<dyn AlertChannel>>,
}

impl AlertManager {
    #[must_use]
    pub fn new(config: AlertConfig, channels: Vec<Arc<dyn AlertChannel>>) -> Self {
        Self { config, channels }
    }

    pub async fn send_opportunity_alert(&self, opportunity: &Opportunity) {
        if opportunity.net_edge < self.config.alert_threshold_spread {
            return;
        }
        if opportunity.expected_profit < self.config.alert_min_opportunity_usd {
            return;
        }
        self.dispatch(&Self::format_opportunity(opportunity), AlertPriority::High).await;
    }

    pub async fn send_execution_alert(&self, position_id: &str, success: bool, detail: &str) {
        let priority = if success { AlertPriority::Normal } else { AlertPriority::High };
        let status = if success { "SUCCESS" } else { "FAILED" };
        let message = format!("TRADE EXECUTION\n\nPosition: {position_id}\nStatus: {status}\n\n{detail}");
        self.dispatch(&message, priority).await;
    }

    pub async fn send_error_alert(&self, error_type: &str, error_message: &str) {
        let message = format!(
            "ERROR ALERT\n\nType: {error_type}\nMessage: {error_message}\nTime: {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.dispatch(&message, AlertPriority::Critical).await;
    }

    pub async fn send_daily_summary(&self, summary: &PerformanceSummary, portfolio: &PortfolioState) {
        let message = format!(
            "DAILY SUMMARY\n\nOpportunities detected: {}\nTrades executed: {}\nTrades closed: {}\n\
             Total P&L: ${:.2}\nWin rate: {:.1}%\n\nBalance: ${:.2} (A ${:.2} / B ${:.2})",
            summary.opportunities_detected,
            summary.trades_executed,
            summary.trades_closed,
            summary.total_pnl,
            summary.win_rate * 100.0,
            portfolio.total_balance(),
            portfolio.balance_a,
            portfolio.balance_b,
        );
        self.dispatch(&message, AlertPriority::Low).await;
    }

    /// Sends a test message through every channel; returns `true` only if
    /// all channels succeeded.
    pub async fn test_connection(&self) -> bool {
        let mut all_ok = true;
        for channel in &self.channels {
            if let Err(err) = channel.send("Arbitrage engine alert system test", AlertPriority::Low).await {
                warn!(%err, "alert channel test failed");
                all_ok = false;
            }
        }
        all_ok
    }

    async fn dispatch(&self, message: &str, priority: AlertPriority) {
        info!(?priority, "dispatching alert");
        for channel in &self.channels {
            if let Err(err) = channel.send(message, priority).await {
                warn!(%err, "alert channel failed");
            }
        }
    }

    fn format_opportunity(opp: &Opportunity) -> String {
        format!(
            "ARBITRAGE OPPORTUNITY\n\nQuestion: {}\n\nPricing:\n  Leg1: {:.4}\n  Leg2: {:.4}\n  Spread: {:.4}\n\n\
             Trade:\n  Net edge: {:.2}%\n  Position size: ${:.2}\n  Expected profit: ${:.2}\n  Expected ROI: {:.2}%\n\n\
             Detected: {}",
            opp.paired_event.listing_a.question,
            opp.price_leg1,
            opp.price_leg2,
            opp.spread,
            opp.net_edge * rust_decimal_macros::dec!(100),
            opp.position_size_quote,
            opp.expected_profit,
            opp.expected_roi * rust_decimal_macros::dec!(100),
            opp.detected_at.format("%H:%M:%S"),
        )
    }
}

#[derive(Serialize)]
struct TelegramSendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Posts alert text to a Telegram chat via the Bot API.
pub struct TelegramAlertChannel {
    http: reqwest::Client,
    credentials: TelegramCredentials,
}

impl TelegramAlertChannel {
    #[must_use]
    pub fn new(credentials: TelegramCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait]
impl AlertChannel for TelegramAlertChannel {
    async fn send(&self, message: &str, _priority: AlertPriority) -> Result<(), AlertError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.credentials.bot_token.expose_secret()
        );
        let body = TelegramSendMessage {
            chat_id: self.credentials.chat_id.expose_secret(),
            text: message,
            parse_mode: "HTML",
        };

        let response = self.http.post(&url).json(&body).send().await.map_err(|e| AlertError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError::Transport(format!("telegram returned {}", response.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingChannel {
        sent: Mutex<Vec<(String, AlertPriority)>>,
    }

    #[async_trait]
    impl AlertChannel for RecordingChannel {
        async fn send(&self, message: &str, priority: AlertPriority) -> Result<(), AlertError> {
            self.sent.lock().push((message.to_string(), priority));
            Ok(())
        }
    }

    fn sample_opportunity(net_edge: Decimal, expected_profit: Decimal) -> Opportunity {
        use crate::types::{Direction, Listing, ListingStatus, PairedEvent, RiskTier, VenueId};
        let listing = |venue| Listing {
            venue_id: venue,
            native_id: "id".to_string(),
            question: "Will X happen?".to_string(),
            description: String::new(),
            resolution_time: None,
            status: ListingStatus::Open,
            volume_to_date: Decimal::ZERO,
            resting_liquidity: Decimal::ZERO,
            raw: serde_json::Value::Null,
        };
        Opportunity {
            paired_event: PairedEvent {
                listing_a: listing(VenueId::VenueA),
                listing_b: listing(VenueId::VenueB),
                similarity: 0.9,
            },
            direction: Direction::BuyYesANoB,
            price_leg1: rust_decimal_macros::dec!(0.4),
            price_leg2: rust_decimal_macros::dec!(0.4),
            spread: rust_decimal_macros::dec!(0.8),
            gross_edge: rust_decimal_macros::dec!(0.2),
            fee_leg1: Decimal::ZERO,
            fee_leg2: Decimal::ZERO,
            net_edge,
            position_size_quote: rust_decimal_macros::dec!(1000),
            contracts_leg1: 100,
            size_leg2: rust_decimal_macros::dec!(100),
            expected_profit,
            expected_roi: net_edge,
            horizon_days: Some(3),
            annualized_roi: None,
            risk_tier: RiskTier::Low,
            risk_score: 0.1,
            risk_warnings: Vec::new(),
            detected_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn opportunity_below_threshold_is_not_alerted() {
        let channel = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()) });
        let manager = AlertManager::new(AlertConfig::default(), vec![channel.clone()]);

        let opp = sample_opportunity(rust_decimal_macros::dec!(0.001), rust_decimal_macros::dec!(1000));
        manager.send_opportunity_alert(&opp).await;

        assert!(channel.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn opportunity_above_threshold_is_alerted() {
        let channel = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()) });
        let manager = AlertManager::new(AlertConfig::default(), vec![channel.clone()]);

        let opp = sample_opportunity(rust_decimal_macros::dec!(0.05), rust_decimal_macros::dec!(1000));
        manager.send_opportunity_alert(&opp).await;

        assert_eq!(channel.sent.lock().len(), 1);
        assert_eq!(channel.sent.lock()[0].1, AlertPriority::High);
    }

    #[tokio::test]
    async fn test_connection_reports_false_on_channel_error() {
        struct FailingChannel;
        #[async_trait]
        impl AlertChannel for FailingChannel {
            async fn send(&self, _message: &str, _priority: AlertPriority) -> Result<(), AlertError> {
                Err(AlertError::Transport("boom".to_string()))
            }
        }

        let manager = AlertManager::new(AlertConfig::default(), vec![Arc::new(FailingChannel)]);
        assert!(!manager.test_connection().await);
    }
}
