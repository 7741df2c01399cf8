use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::holding::Holding;
use super::trade::TradeRecord;
use crate::errors::AppError;
use crate::services::analytics_service;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    #[serde(alias = "low")]
    Conservative,
    #[default]
    #[serde(alias = "medium", alias = "balanced")]
    Moderate,
    #[serde(alias = "high", alias = "growth")]
    Aggressive,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Moderate => "moderate",
            RiskProfile::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

impl FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" | "low" => Ok(RiskProfile::Conservative),
            "moderate" | "medium" | "balanced" => Ok(RiskProfile::Moderate),
            "aggressive" | "high" | "growth" => Ok(RiskProfile::Aggressive),
            other => Err(format!(
                "unknown risk profile '{}' (expected conservative, moderate or aggressive)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiversificationRating {
    Excellent,
    Good,
    Fair,
    #[default]
    Poor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationRisk {
    Low,
    Medium,
    #[default]
    High,
}

/// Aggregate figures recomputed from the holdings after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_pct: f64,
    pub holdings_count: usize,
    pub sector_count: usize,
    pub diversification_score: u32,
    pub diversification_rating: DiversificationRating,
    pub concentration_risk: ConcentrationRisk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorAllocation {
    pub value: f64,
    pub holdings: usize,
    pub percentage: f64,
}

/// A named set of holdings with its derived analytics and trade log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub risk_profile: RiskProfile,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub performance: Performance,
    #[serde(default)]
    pub sector_breakdown: BTreeMap<String, SectorAllocation>,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub realized_gain_loss: f64,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub portfolio_id: String,
    pub total_value: f64,
    pub sector_breakdown: BTreeMap<String, SectorAllocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePortfolio {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub risk_profile: RiskProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePortfolio {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub risk_profile: Option<RiskProfile>,
}

impl Portfolio {
    pub(crate) fn new(id: String, name: String, risk_profile: RiskProfile) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            risk_profile,
            holdings: Vec::new(),
            performance: Performance::default(),
            sector_breakdown: BTreeMap::new(),
            total_value: 0.0,
            realized_gain_loss: 0.0,
            trades: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker == ticker)
    }

    pub fn allocation(&self) -> Allocation {
        Allocation {
            portfolio_id: self.id.clone(),
            total_value: self.total_value,
            sector_breakdown: self.sector_breakdown.clone(),
        }
    }

    /// Holdings ordered by current value, largest first.
    pub fn holdings_by_value(&self) -> Vec<Holding> {
        let mut holdings = self.holdings.clone();
        holdings.sort_by(|a, b| b.value.total_cmp(&a.value));
        holdings
    }

    pub(crate) fn holding_index(&self, ticker: &str) -> Option<usize> {
        self.holdings.iter().position(|h| h.ticker == ticker)
    }

    /// Verifies that every stored derived figure matches the holdings.
    pub fn check_derived(&self) -> Result<(), AppError> {
        let violation = |what: String| Err(AppError::InvariantViolation(format!("{}: {}", self.id, what)));

        let mut total_value = 0.0;
        let mut total_cost = 0.0;
        let mut total_gain_loss = 0.0;
        let mut sum_weight = 0.0;
        let mut sectors: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for h in &self.holdings {
            let numbers = [h.shares, h.price, h.purchase_price, h.value, h.weight, h.gain_loss, h.gain_loss_pct];
            if numbers.iter().any(|n| !n.is_finite()) {
                return violation(format!("{} has a non-finite number", h.ticker));
            }
            if h.shares <= 0.0 {
                return violation(format!("{} shares must be positive", h.ticker));
            }
            if h.price < 0.0 || h.purchase_price < 0.0 {
                return violation(format!("{} has a negative price", h.ticker));
            }
            if !approx_eq(h.value, h.shares * h.price) {
                return violation(format!("{} value != shares * price", h.ticker));
            }
            let cost = h.cost_basis();
            if !approx_eq(h.gain_loss, h.value - cost) {
                return violation(format!("{} gain_loss != value - cost basis", h.ticker));
            }
            let pct = if cost > 0.0 { h.gain_loss / cost * 100.0 } else { 0.0 };
            if !approx_eq(h.gain_loss_pct, pct) {
                return violation(format!("{} gain_loss_pct != gain_loss / cost basis", h.ticker));
            }
            total_value += h.value;
            total_cost += cost;
            total_gain_loss += h.gain_loss;
            sum_weight += h.weight;
            let sector = sectors.entry(h.sector_name()).or_default();
            sector.0 += h.value;
            sector.1 += 1;
        }

        if !approx_eq(self.total_value, total_value) {
            return violation(format!("total_value {} != sum of holdings {}", self.total_value, total_value));
        }
        let expected_weight = if total_value > 0.0 { 100.0 } else { 0.0 };
        if (sum_weight - expected_weight).abs() > 1e-4 {
            return violation(format!("weights sum to {}", sum_weight));
        }

        if self.sector_breakdown.len() != sectors.len() {
            return violation("sector_breakdown does not match holdings".to_string());
        }
        for (name, (value, count)) in &sectors {
            let pct = if total_value > 0.0 { value / total_value * 100.0 } else { 0.0 };
            match self.sector_breakdown.get(*name) {
                Some(a) if a.holdings == *count && approx_eq(a.value, *value) && approx_eq(a.percentage, pct) => {}
                _ => return violation(format!("sector_breakdown[{}] does not match holdings", name)),
            }
        }

        let perf = &self.performance;
        let score = if self.holdings.is_empty() {
            0
        } else {
            analytics_service::diversification_score(&self.sector_breakdown, self.holdings.len())
        };
        let (rating, risk) = analytics_service::rate(score);
        let pct = if total_cost > 0.0 { total_gain_loss / total_cost * 100.0 } else { 0.0 };
        if perf.holdings_count != self.holdings.len()
            || perf.sector_count != sectors.len()
            || !approx_eq(perf.total_cost, total_cost)
            || !approx_eq(perf.total_gain_loss, total_gain_loss)
            || !approx_eq(perf.total_gain_loss_pct, pct)
            || perf.diversification_score != score
            || perf.diversification_rating != rating
            || perf.concentration_risk != risk
        {
            return violation("performance does not match holdings".to_string());
        }
        Ok(())
    }
}

const TOLERANCE: f64 = 1e-6;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * 1.0_f64.max(a.abs()).max(b.abs())
}
