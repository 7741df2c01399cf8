use serde::{Deserialize, Serialize};

/// Sector label used when a holding carries none.
pub const UNCLASSIFIED_SECTOR: &str = "Other";

// Represents the current position in one ticker within a portfolio.
// Derived fields (value, weight, gain_loss, gain_loss_pct) are rewritten by
// the analytics pass after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: f64,
    pub price: f64,
    pub purchase_price: f64,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub gain_loss: f64,
    #[serde(default)]
    pub gain_loss_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

/// Direct correction of a holding outside the trade log. Absent fields are
/// left unchanged; an empty sector clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHolding {
    #[serde(default)]
    pub shares: Option<f64>,
    #[serde(default, alias = "avg_cost")]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
}

impl UpdateHolding {
    pub fn is_empty(&self) -> bool {
        self.shares.is_none() && self.purchase_price.is_none() && self.price.is_none() && self.sector.is_none()
    }
}

impl Holding {
    pub(crate) fn new(ticker: String, shares: f64, price: f64, sector: Option<String>) -> Self {
        Self {
            ticker,
            shares,
            price,
            purchase_price: price,
            value: shares * price,
            weight: 0.0,
            gain_loss: 0.0,
            gain_loss_pct: 0.0,
            sector,
        }
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.purchase_price
    }

    pub fn sector_name(&self) -> &str {
        match self.sector.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => UNCLASSIFIED_SECTOR,
        }
    }
}
