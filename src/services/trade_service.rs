use tracing::info;

use crate::errors::AppError;
use crate::models::{Holding, LedgerDocument, PositionChange, Trade, TradeAction, TradeOutcome, TradeRecord};
use crate::services::analytics_service;

pub(crate) fn normalize_ticker(ticker: &str) -> Result<String, AppError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(AppError::Validation("Ticker cannot be empty".into()));
    }
    Ok(ticker)
}

pub(crate) fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Validation("Price must be > 0".into()));
    }
    Ok(())
}

fn validate(trade: &Trade) -> Result<String, AppError> {
    let ticker = normalize_ticker(&trade.ticker)?;
    if !trade.shares.is_finite() || trade.shares <= 0.0 {
        return Err(AppError::Validation("Shares must be > 0".into()));
    }
    validate_price(trade.price)?;
    Ok(ticker)
}

/// Applies a buy or sell to one portfolio and recomputes its aggregates.
pub fn execute_trade(doc: &mut LedgerDocument, portfolio_id: &str, trade: Trade) -> Result<TradeOutcome, AppError> {
    let ticker = validate(&trade)?;
    let portfolio = doc.portfolio_mut(portfolio_id)?;
    let existing = portfolio.holding_index(&ticker);

    let (position, realized, executed) = match trade.action {
        TradeAction::Buy => match existing {
            Some(idx) => {
                let h = &mut portfolio.holdings[idx];
                let total_shares = h.shares + trade.shares;
                h.purchase_price = (h.shares * h.purchase_price + trade.shares * trade.price) / total_shares;
                h.shares = total_shares;
                h.price = trade.price;
                if trade.sector.is_some() {
                    h.sector = trade.sector.clone();
                }
                (PositionChange::Increased, 0.0, trade.shares)
            }
            None => {
                portfolio
                    .holdings
                    .push(Holding::new(ticker.clone(), trade.shares, trade.price, trade.sector.clone()));
                (PositionChange::Opened, 0.0, trade.shares)
            }
        },
        TradeAction::Sell => {
            let idx = existing.ok_or_else(|| {
                AppError::NotFound(format!("Ticker {} not held in portfolio '{}'", ticker, portfolio_id))
            })?;
            let h = &mut portfolio.holdings[idx];
            let sold = trade.shares.min(h.shares);
            let realized = sold * (trade.price - h.purchase_price);
            // Overselling closes the position at whatever was held
            if trade.shares >= h.shares {
                portfolio.holdings.remove(idx);
                (PositionChange::Closed, realized, sold)
            } else {
                h.shares -= trade.shares;
                h.price = trade.price;
                (PositionChange::Reduced, realized, sold)
            }
        }
    };

    let record = TradeRecord::new(trade.action, ticker.clone(), executed, trade.price, realized);
    portfolio.realized_gain_loss += realized;
    portfolio.trades.push(record.clone());
    analytics_service::recompute(portfolio);

    let held = portfolio.holding(&ticker);
    info!(
        "{} {} {} @ {} in portfolio {} ({:?})",
        trade.action, trade.shares, ticker, trade.price, portfolio_id, position
    );

    Ok(TradeOutcome {
        portfolio_id: portfolio_id.to_string(),
        record,
        position,
        shares_held: held.map(|h| h.shares).unwrap_or(0.0),
        purchase_price: held.map(|h| h.purchase_price),
        total_value: portfolio.total_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreatePortfolio, RiskProfile};
    use crate::services::portfolio_service;

    fn ledger() -> LedgerDocument {
        let mut doc = LedgerDocument::default();
        portfolio_service::create(
            &mut doc,
            CreatePortfolio { id: Some("growth".into()), name: "Growth".into(), risk_profile: RiskProfile::Aggressive },
        )
        .unwrap();
        doc
    }

    fn trade(action: TradeAction, ticker: &str, shares: f64, price: f64, sector: Option<&str>) -> Trade {
        Trade { action, ticker: ticker.into(), shares, price, sector: sector.map(String::from) }
    }

    fn buy(doc: &mut LedgerDocument, ticker: &str, shares: f64, price: f64, sector: &str) -> TradeOutcome {
        execute_trade(doc, "growth", trade(TradeAction::Buy, ticker, shares, price, Some(sector))).unwrap()
    }

    #[test]
    fn test_buy_averages_cost_basis() {
        let mut doc = ledger();
        let first = buy(&mut doc, "AAPL", 10.0, 150.0, "Technology");
        assert_eq!(first.position, PositionChange::Opened);

        let second = buy(&mut doc, "AAPL", 5.0, 180.0, "Technology");
        assert_eq!(second.position, PositionChange::Increased);
        assert_eq!(second.shares_held, 15.0);
        assert!((second.purchase_price.unwrap() - 160.0).abs() < 1e-9);

        let h = doc.portfolio("growth").unwrap().holding("AAPL").unwrap();
        assert_eq!(h.price, 180.0);
        assert!((h.value - 15.0 * 180.0).abs() < 1e-9);
        assert!((h.gain_loss - (2700.0 - 2400.0)).abs() < 1e-9);
    }

    #[test]
    fn test_sell_all_removes_holding_and_sector() {
        let mut doc = ledger();
        buy(&mut doc, "AAPL", 10.0, 150.0, "Technology");
        buy(&mut doc, "AAPL", 5.0, 180.0, "Technology");
        buy(&mut doc, "JNJ", 4.0, 160.0, "Healthcare");

        let out = execute_trade(&mut doc, "growth", trade(TradeAction::Sell, "aapl", 15.0, 200.0, None)).unwrap();
        assert_eq!(out.position, PositionChange::Closed);
        assert_eq!(out.shares_held, 0.0);
        assert!((out.record.realized_gain_loss - 15.0 * 40.0).abs() < 1e-9);

        let p = doc.portfolio("growth").unwrap();
        assert!(p.holding("AAPL").is_none());
        assert!(!p.sector_breakdown.contains_key("Technology"));
        assert_eq!(p.total_value, 640.0);
        assert!((p.holdings[0].weight - 100.0).abs() < 1e-9);
        assert!((p.realized_gain_loss - 600.0).abs() < 1e-9);
        assert_eq!(p.trades.len(), 4);
    }

    #[test]
    fn test_oversell_closes_position() {
        let mut doc = ledger();
        buy(&mut doc, "MSFT", 3.0, 300.0, "Technology");
        let out = execute_trade(&mut doc, "growth", trade(TradeAction::Sell, "MSFT", 10.0, 310.0, None)).unwrap();
        assert_eq!(out.position, PositionChange::Closed);
        assert!((out.record.realized_gain_loss - 30.0).abs() < 1e-9);
        assert_eq!(out.record.shares, 3.0);
        assert!(doc.portfolio("growth").unwrap().holdings.is_empty());
    }

    #[test]
    fn test_partial_sell_decrements_shares() {
        let mut doc = ledger();
        buy(&mut doc, "AAPL", 10.0, 150.0, "Technology");
        let out = execute_trade(&mut doc, "growth", trade(TradeAction::Sell, "AAPL", 4.0, 140.0, None)).unwrap();
        assert_eq!(out.position, PositionChange::Reduced);
        assert_eq!(out.shares_held, 6.0);

        let h = doc.portfolio("growth").unwrap().holding("AAPL").unwrap();
        assert_eq!(h.purchase_price, 150.0);
        assert_eq!(h.price, 140.0);
        assert_eq!(h.value, 840.0);
        assert!((doc.portfolio("growth").unwrap().realized_gain_loss + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_targets_are_not_found() {
        let mut doc = ledger();
        let err = execute_trade(&mut doc, "growth", trade(TradeAction::Sell, "TSLA", 1.0, 10.0, None)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = execute_trade(&mut doc, "nope", trade(TradeAction::Buy, "TSLA", 1.0, 10.0, None)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_invalid_trades_are_rejected() {
        let mut doc = ledger();
        for bad in [
            trade(TradeAction::Buy, " ", 1.0, 10.0, None),
            trade(TradeAction::Buy, "AAPL", 0.0, 10.0, None),
            trade(TradeAction::Buy, "AAPL", 1.0, -1.0, None),
            trade(TradeAction::Buy, "AAPL", f64::NAN, 10.0, None),
        ] {
            assert!(matches!(execute_trade(&mut doc, "growth", bad), Err(AppError::Validation(_))));
        }
        assert!(doc.portfolio("growth").unwrap().trades.is_empty());
    }

    #[test]
    fn test_ledger_validates_after_trades() {
        let mut doc = ledger();
        buy(&mut doc, "AAPL", 10.0, 150.0, "Technology");
        buy(&mut doc, "JNJ", 7.0, 161.3, "Healthcare");
        execute_trade(&mut doc, "growth", trade(TradeAction::Sell, "JNJ", 2.5, 170.0, None)).unwrap();
        doc.validate().unwrap();
    }
}
