use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub atr: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

/// New market figures for one ticker, applied to every portfolio holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub price: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub ticker: String,
    pub price: f64,
    pub updated_holdings: usize,
    pub portfolios: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedQuote {
    pub ticker: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub updated: Vec<PriceUpdate>,
    pub failed: Vec<FailedQuote>,
    pub updated_holdings: usize,
    pub timestamp: DateTime<Utc>,
}
