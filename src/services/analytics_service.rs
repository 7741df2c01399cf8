use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::{
    ConcentrationRisk, DiversificationRating, LedgerDocument, Performance, Portfolio, SectorAllocation,
};

/// Recomputes every derived field of a portfolio and stamps `updated_at`.
pub fn recompute(portfolio: &mut Portfolio) {
    derive(portfolio);
    portfolio.updated_at = Utc::now();
}

/// Recomputes derived fields of every portfolio without touching timestamps.
/// Returns the ids of portfolios whose stored figures were stale.
pub fn derive_all(doc: &mut LedgerDocument) -> Vec<String> {
    let mut repaired = Vec::new();
    for portfolio in doc.portfolios.values_mut() {
        let stale = portfolio.check_derived().is_err();
        derive(portfolio);
        if stale {
            repaired.push(portfolio.id.clone());
        }
    }
    repaired
}

/// Derives holding figures, sector breakdown, total and performance from
/// shares, prices and cost basis alone.
pub fn derive(portfolio: &mut Portfolio) {
    let mut total_value = 0.0;
    for h in portfolio.holdings.iter_mut() {
        h.value = h.shares * h.price;
        let cost = h.cost_basis();
        h.gain_loss = h.value - cost;
        h.gain_loss_pct = if cost > 0.0 { h.gain_loss / cost * 100.0 } else { 0.0 };
        total_value += h.value;
    }
    for h in portfolio.holdings.iter_mut() {
        h.weight = if total_value > 0.0 { h.value / total_value * 100.0 } else { 0.0 };
    }

    portfolio.total_value = total_value;
    portfolio.sector_breakdown = sector_breakdown(portfolio, total_value);
    portfolio.performance = performance(portfolio);
}

fn sector_breakdown(portfolio: &Portfolio, total_value: f64) -> BTreeMap<String, SectorAllocation> {
    let mut breakdown: BTreeMap<String, SectorAllocation> = BTreeMap::new();
    for h in &portfolio.holdings {
        let entry = breakdown.entry(h.sector_name().to_string()).or_default();
        entry.value += h.value;
        entry.holdings += 1;
    }
    for allocation in breakdown.values_mut() {
        allocation.percentage = if total_value > 0.0 {
            allocation.value / total_value * 100.0
        } else {
            0.0
        };
    }
    breakdown
}

fn performance(portfolio: &Portfolio) -> Performance {
    let total_cost: f64 = portfolio.holdings.iter().map(|h| h.cost_basis()).sum();
    let total_gain_loss: f64 = portfolio.holdings.iter().map(|h| h.gain_loss).sum();
    let holdings_count = portfolio.holdings.len();
    let sector_count = portfolio.sector_breakdown.len();

    // The raw formula gives 40 (Fair) for no sectors; an empty portfolio
    // must not outrank a single concentrated holding.
    let score = if holdings_count == 0 {
        0
    } else {
        diversification_score(&portfolio.sector_breakdown, holdings_count)
    };
    let (rating, risk) = rate(score);

    Performance {
        total_cost,
        total_gain_loss,
        total_gain_loss_pct: if total_cost > 0.0 { total_gain_loss / total_cost * 100.0 } else { 0.0 },
        holdings_count,
        sector_count,
        diversification_score: score,
        diversification_rating: rating,
        concentration_risk: risk,
    }
}

/// Scores 0-100 from sector count (up to 40), the largest sector's share
/// (up to 40) and the number of holdings (up to 20).
pub fn diversification_score(breakdown: &BTreeMap<String, SectorAllocation>, holdings_count: usize) -> u32 {
    let sector_score = (breakdown.len() as u32 * 8).min(40);

    let max_sector_pct = breakdown
        .values()
        .map(|s| s.percentage)
        .fold(0.0_f64, f64::max);
    let concentration_score = if max_sector_pct > 50.0 {
        10
    } else if max_sector_pct > 40.0 {
        20
    } else if max_sector_pct > 30.0 {
        30
    } else {
        40
    };

    let stock_score = (holdings_count as u32 * 2).min(20);

    sector_score + concentration_score + stock_score
}

pub fn rate(score: u32) -> (DiversificationRating, ConcentrationRisk) {
    match score {
        80.. => (DiversificationRating::Excellent, ConcentrationRisk::Low),
        60..=79 => (DiversificationRating::Good, ConcentrationRisk::Low),
        40..=59 => (DiversificationRating::Fair, ConcentrationRisk::Medium),
        _ => (DiversificationRating::Poor, ConcentrationRisk::High),
    }
}
