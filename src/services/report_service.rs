use std::fmt::Write as _;
use std::io;

use crate::errors::AppError;
use crate::models::{LedgerDocument, Portfolio};

fn money(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", v.abs())
    } else {
        format!("${:.2}", v)
    }
}

fn signed_pct(v: f64) -> String {
    if v >= 0.0 {
        format!("+{:.2}%", v)
    } else {
        format!("{:.2}%", v)
    }
}

/// Multi-line report of one portfolio: header, holdings table, sectors.
pub fn render_portfolio(portfolio: &Portfolio) -> String {
    let mut out = String::new();
    let perf = &portfolio.performance;

    let _ = writeln!(out, "{} [{}]", portfolio.name, portfolio.id);
    let _ = writeln!(out, "Risk profile: {}", portfolio.risk_profile);
    let _ = writeln!(
        out,
        "Total value: {}  Cost: {}  Unrealized: {} ({})  Realized: {}",
        money(portfolio.total_value),
        money(perf.total_cost),
        money(perf.total_gain_loss),
        signed_pct(perf.total_gain_loss_pct),
        money(portfolio.realized_gain_loss)
    );
    let _ = writeln!(
        out,
        "Diversification: {}/100 ({:?}, {:?} concentration risk)",
        perf.diversification_score, perf.diversification_rating, perf.concentration_risk
    );
    let _ = writeln!(out, "Last updated: {}", portfolio.updated_at.to_rfc3339());

    if portfolio.holdings.is_empty() {
        let _ = writeln!(out, "\n(no holdings)");
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<8} {:>10} {:>10} {:>10} {:>12} {:>8} {:>12} {:>9}  {}",
        "Ticker", "Shares", "Price", "Cost", "Value", "Weight", "Gain/Loss", "G/L %", "Sector"
    );
    for h in &portfolio.holdings {
        let _ = writeln!(
            out,
            "{:<8} {:>10.4} {:>10.2} {:>10.2} {:>12.2} {:>7.2}% {:>12} {:>9}  {}",
            h.ticker,
            h.shares,
            h.price,
            h.purchase_price,
            h.value,
            h.weight,
            money(h.gain_loss),
            signed_pct(h.gain_loss_pct),
            h.sector_name()
        );
    }

    let _ = writeln!(out, "\nSectors:");
    for (sector, alloc) in &portfolio.sector_breakdown {
        let _ = writeln!(
            out,
            "  {:<20} {:>12} {:>7.2}%  ({} holding{})",
            sector,
            money(alloc.value),
            alloc.percentage,
            alloc.holdings,
            if alloc.holdings == 1 { "" } else { "s" }
        );
    }
    out
}

/// One line per portfolio plus the ledger's collections.
pub fn render_summary(doc: &LedgerDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Ledger v{} (last updated {})",
        doc.meta.version,
        doc.meta.last_updated.to_rfc3339()
    );
    for c in doc.collections() {
        let _ = writeln!(out, "  {}: {} record(s)", c.name, c.records);
    }
    if doc.portfolios.is_empty() {
        let _ = writeln!(out, "\n(no portfolios)");
        return out;
    }
    let _ = writeln!(out);
    for p in doc.portfolios.values() {
        let _ = writeln!(
            out,
            "{:<24} {:<28} {:<13} {:>3} holdings {:>14}",
            p.id,
            p.name,
            p.risk_profile.to_string(),
            p.holdings.len(),
            money(p.total_value)
        );
    }
    out
}

pub fn holdings_csv(portfolio: &Portfolio) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "ticker", "shares", "price", "purchase_price", "value", "weight", "gain_loss", "gain_loss_pct", "sector",
        ])?;
    for h in &portfolio.holdings {
        writer
            .write_record([
                h.ticker.clone(),
                h.shares.to_string(),
                format!("{:.2}", h.price),
                format!("{:.2}", h.purchase_price),
                format!("{:.2}", h.value),
                format!("{:.4}", h.weight),
                format!("{:.2}", h.gain_loss),
                format!("{:.4}", h.gain_loss_pct),
                h.sector_name().to_string(),
            ])?;
    }
    let bytes = writer.into_inner().map_err(|e| AppError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreatePortfolio, RiskProfile, Trade, TradeAction};
    use crate::services::{portfolio_service, trade_service};

    fn doc_with_holdings() -> LedgerDocument {
        let mut doc = LedgerDocument::default();
        portfolio_service::create(
            &mut doc,
            CreatePortfolio { id: Some("core".into()), name: "Core".into(), risk_profile: RiskProfile::Conservative },
        )
        .unwrap();
        for (ticker, shares, price, sector) in [("AAPL", 10.0, 150.0, "Technology"), ("KO", 12.0, 60.0, "Consumer, Staples")] {
            trade_service::execute_trade(
                &mut doc,
                "core",
                Trade { action: TradeAction::Buy, ticker: ticker.into(), shares, price, sector: Some(sector.into()) },
            )
            .unwrap();
        }
        doc
    }

    #[test]
    fn test_render_portfolio_lists_holdings_and_sectors() {
        let doc = doc_with_holdings();
        let text = render_portfolio(doc.portfolio("core").unwrap());
        assert!(text.starts_with("Core [core]"));
        assert!(text.contains("conservative"));
        assert!(text.contains("AAPL"));
        assert!(text.contains("$2220.00"));
        assert!(text.contains("Technology"));
    }

    #[test]
    fn test_render_summary_mentions_each_portfolio() {
        let doc = doc_with_holdings();
        let text = render_summary(&doc);
        assert!(text.contains("portfolios: 1 record(s)"));
        assert!(text.contains("core"));
    }

    #[test]
    fn test_csv_quotes_fields_with_commas() {
        let doc = doc_with_holdings();
        let csv = holdings_csv(doc.portfolio("core").unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ticker,shares,price"));
        assert!(lines[2].ends_with("\"Consumer, Staples\""));
    }

    #[test]
    fn test_money_formats_negative_values() {
        assert_eq!(money(-12.5), "-$12.50");
        assert_eq!(signed_pct(3.14159), "+3.14%");
    }
}
