use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("buy"),
            TradeAction::Sell => f.write_str("sell"),
        }
    }
}

/// A buy or sell request against one portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub action: TradeAction,
    pub ticker: String,
    pub shares: f64,
    pub price: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

// Represents an executed buy or sell event, appended to the portfolio's trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub action: TradeAction,
    pub ticker: String,
    pub shares: f64,
    pub price: f64,
    #[serde(default)]
    pub realized_gain_loss: f64,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub(crate) fn new(action: TradeAction, ticker: String, shares: f64, price: f64, realized_gain_loss: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            ticker,
            shares,
            price,
            realized_gain_loss,
            executed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionChange {
    Opened,
    Increased,
    Reduced,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub portfolio_id: String,
    pub record: TradeRecord,
    pub position: PositionChange,
    /// Shares held after the trade; zero when the position was closed.
    pub shares_held: f64,
    pub purchase_price: Option<f64>,
    pub total_value: f64,
}
