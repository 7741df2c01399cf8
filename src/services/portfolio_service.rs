use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CreatePortfolio, Holding, LedgerDocument, Portfolio, UpdateHolding, UpdatePortfolio};
use crate::services::analytics_service;
use crate::services::trade_service::{normalize_ticker, validate_price};

pub fn create(doc: &mut LedgerDocument, input: CreatePortfolio) -> Result<Portfolio, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Portfolio name cannot be empty".into()));
    }
    let id = match input.id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::Validation("Portfolio id cannot be empty".into()));
        }
        Some(id) => id.trim().to_string(),
        None => Uuid::new_v4().to_string(),
    };
    if doc.portfolios.contains_key(&id) {
        return Err(AppError::Conflict(format!("Portfolio '{}' already exists", id)));
    }

    let mut portfolio = Portfolio::new(id.clone(), input.name.trim().to_string(), input.risk_profile);
    analytics_service::recompute(&mut portfolio);
    doc.portfolios.insert(id, portfolio.clone());
    Ok(portfolio)
}

pub fn update(doc: &mut LedgerDocument, id: &str, input: UpdatePortfolio) -> Result<Portfolio, AppError> {
    let portfolio = doc.portfolio_mut(id)?;
    if let Some(name) = input.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Portfolio name cannot be empty".into()));
        }
        portfolio.name = name.trim().to_string();
    }
    if let Some(risk_profile) = input.risk_profile {
        portfolio.risk_profile = risk_profile;
    }
    portfolio.updated_at = chrono::Utc::now();
    Ok(portfolio.clone())
}

pub fn fetch_all(doc: &LedgerDocument) -> Vec<Portfolio> {
    doc.portfolios.values().cloned().collect()
}

pub fn fetch_one(doc: &LedgerDocument, id: &str) -> Result<Portfolio, AppError> {
    doc.portfolio(id).cloned()
}

pub fn delete(doc: &mut LedgerDocument, id: &str) -> Result<Portfolio, AppError> {
    doc.portfolios
        .remove(id)
        .ok_or_else(|| AppError::NotFound(format!("Portfolio '{}' not found", id)))
}

fn holding_not_held(ticker: &str, portfolio_id: &str) -> AppError {
    AppError::NotFound(format!("Ticker {} not held in portfolio '{}'", ticker, portfolio_id))
}

/// Corrects a holding in place and recomputes the portfolio. No trade is
/// recorded and realized gain/loss is untouched.
pub fn update_holding(
    doc: &mut LedgerDocument,
    portfolio_id: &str,
    ticker: &str,
    input: UpdateHolding,
) -> Result<Holding, AppError> {
    let ticker = normalize_ticker(ticker)?;
    if input.is_empty() {
        return Err(AppError::Validation("Nothing to update".into()));
    }
    if let Some(shares) = input.shares {
        if !shares.is_finite() || shares <= 0.0 {
            return Err(AppError::Validation("Shares must be > 0".into()));
        }
    }
    if let Some(cost) = input.purchase_price {
        validate_price(cost)?;
    }
    if let Some(price) = input.price {
        validate_price(price)?;
    }

    let portfolio = doc.portfolio_mut(portfolio_id)?;
    let idx = portfolio
        .holding_index(&ticker)
        .ok_or_else(|| holding_not_held(&ticker, portfolio_id))?;
    let h = &mut portfolio.holdings[idx];
    if let Some(shares) = input.shares {
        h.shares = shares;
    }
    if let Some(cost) = input.purchase_price {
        h.purchase_price = cost;
    }
    if let Some(price) = input.price {
        h.price = price;
    }
    if let Some(sector) = input.sector {
        let sector = sector.trim();
        h.sector = (!sector.is_empty()).then(|| sector.to_string());
    }
    analytics_service::recompute(portfolio);

    info!("Adjusted {} in portfolio {}", ticker, portfolio_id);
    Ok(portfolio.holdings[idx].clone())
}

/// Drops a holding without recording a sale.
pub fn remove_holding(doc: &mut LedgerDocument, portfolio_id: &str, ticker: &str) -> Result<Holding, AppError> {
    let ticker = normalize_ticker(ticker)?;
    let portfolio = doc.portfolio_mut(portfolio_id)?;
    let idx = portfolio
        .holding_index(&ticker)
        .ok_or_else(|| holding_not_held(&ticker, portfolio_id))?;
    let removed = portfolio.holdings.remove(idx);
    analytics_service::recompute(portfolio);

    info!("Removed {} from portfolio {}", ticker, portfolio_id);
    Ok(removed)
}
