//! Command-line surface: one subcommand per ledger mutator or view.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tracing::info;

use crate::app::create_app;
use crate::config::AppConfig;
use crate::models::{CreatePortfolio, MarketData, RiskProfile, Trade, TradeAction, UpdateHolding, UpdatePortfolio};
use crate::services::{portfolio_service, price_service, report_service, trade_service};
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "codex-ledger", version)]
#[command(about = "Flat-file JSON portfolio ledger", long_about = None)]
pub struct Cli {
    /// Ledger file (overrides LEDGER_PATH)
    #[arg(short, long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty ledger file if none exists
    Init,

    /// Create a portfolio
    Create {
        /// Portfolio name
        name: String,

        /// Explicit id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// conservative, moderate or aggressive
        #[arg(short, long, default_value = "moderate")]
        risk_profile: RiskProfile,
    },

    /// Summarize every portfolio in the ledger
    List {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show one portfolio
    View {
        id: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Buy shares, averaging into an existing holding
    Buy {
        portfolio: String,
        ticker: String,
        shares: f64,
        price: f64,

        #[arg(short, long)]
        sector: Option<String>,
    },

    /// Sell shares; selling at least the held amount closes the position
    Sell {
        portfolio: String,
        ticker: String,
        shares: f64,
        price: f64,
    },

    /// Correct a holding directly without recording a trade
    Adjust {
        portfolio: String,
        ticker: String,

        #[arg(long)]
        shares: Option<f64>,

        /// Average cost per share
        #[arg(long)]
        cost: Option<f64>,

        #[arg(long)]
        price: Option<f64>,

        /// Sector label; an empty string clears it
        #[arg(short, long)]
        sector: Option<String>,
    },

    /// Drop a holding without recording a sale
    Remove { portfolio: String, ticker: String },

    /// Set the price of a ticker in every portfolio holding it
    Price {
        ticker: String,
        price: f64,

        #[arg(short, long)]
        sector: Option<String>,
    },

    /// Fetch quotes for held tickers and apply them
    Refresh {
        /// Limit the refresh to one portfolio
        #[arg(short, long)]
        portfolio: Option<String>,
    },

    /// Rename a portfolio or change its risk profile
    Rename {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        risk_profile: Option<RiskProfile>,
    },

    /// Delete a portfolio and its holdings
    Delete { id: String },

    /// Fetch a single quote from the configured price source
    Quote { symbol: String },

    /// Run the HTTP API
    Serve {
        /// Listen address (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
}

impl Cli {
    /// Applies command-line overrides on top of the environment configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(ledger) = &self.ledger {
            config.ledger_path = ledger.clone();
        }
        if let Commands::Serve { bind: Some(addr) } = &self.command {
            config.bind_addr = *addr;
        }
    }
}

fn print_json<T: serde::Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Runs one command against the configured ledger, writing its report to `out`.
pub async fn execute(command: Commands, config: &AppConfig, out: &mut impl Write) -> Result<()> {
    let state = AppState::from_config(config).context("failed to initialize application state")?;
    let store = state.store.as_ref();

    match command {
        Commands::Init => {
            if store.init()? {
                writeln!(out, "Created ledger {}", store.path().display())?;
            } else {
                writeln!(out, "Ledger {} already exists", store.path().display())?;
            }
        }
        Commands::Create { name, id, risk_profile } => {
            let portfolio = store.update(|doc| {
                portfolio_service::create(doc, CreatePortfolio { id, name, risk_profile })
            })?;
            writeln!(out, "Created portfolio {} ({})", portfolio.id, portfolio.name)?;
        }
        Commands::List { format } => {
            let doc = store.load()?;
            match format {
                OutputFormat::Text => write!(out, "{}", report_service::render_summary(&doc))?,
                OutputFormat::Json => print_json(out, &portfolio_service::fetch_all(&doc))?,
                OutputFormat::Csv => {
                    for portfolio in doc.portfolios.values() {
                        writeln!(out, "# {}", portfolio.id)?;
                        write!(out, "{}", report_service::holdings_csv(portfolio)?)?;
                    }
                }
            }
        }
        Commands::View { id, format } => {
            let doc = store.load()?;
            let portfolio = doc.portfolio(&id)?;
            match format {
                OutputFormat::Text => write!(out, "{}", report_service::render_portfolio(portfolio))?,
                OutputFormat::Json => print_json(out, portfolio)?,
                OutputFormat::Csv => write!(out, "{}", report_service::holdings_csv(portfolio)?)?,
            }
        }
        Commands::Buy { portfolio, ticker, shares, price, sector } => {
            let trade = Trade { action: TradeAction::Buy, ticker, shares, price, sector };
            let outcome = store.update(|doc| trade_service::execute_trade(doc, &portfolio, trade))?;
            writeln!(
                out,
                "Bought {} {} @ {:.2}: now {} shares, avg cost {:.2}, portfolio value {:.2}",
                outcome.record.shares,
                outcome.record.ticker,
                outcome.record.price,
                outcome.shares_held,
                outcome.purchase_price.unwrap_or_default(),
                outcome.total_value
            )?;
        }
        Commands::Sell { portfolio, ticker, shares, price } => {
            let trade = Trade { action: TradeAction::Sell, ticker, shares, price, sector: None };
            let outcome = store.update(|doc| trade_service::execute_trade(doc, &portfolio, trade))?;
            writeln!(
                out,
                "Sold {} {} @ {:.2} ({:?}): realized {:.2}, {} shares left, portfolio value {:.2}",
                outcome.record.shares,
                outcome.record.ticker,
                outcome.record.price,
                outcome.position,
                outcome.record.realized_gain_loss,
                outcome.shares_held,
                outcome.total_value
            )?;
        }
        Commands::Adjust { portfolio, ticker, shares, cost, price, sector } => {
            let input = UpdateHolding { shares, purchase_price: cost, price, sector };
            let h = store.update(|doc| portfolio_service::update_holding(doc, &portfolio, &ticker, input))?;
            writeln!(
                out,
                "{} in {}: {} shares @ {:.2} (avg cost {:.2}), value {:.2}, gain/loss {:.2}",
                h.ticker, portfolio, h.shares, h.price, h.purchase_price, h.value, h.gain_loss
            )?;
        }
        Commands::Remove { portfolio, ticker } => {
            let removed = store.update(|doc| portfolio_service::remove_holding(doc, &portfolio, &ticker))?;
            writeln!(out, "Removed {} ({} shares) from {}", removed.ticker, removed.shares, portfolio)?;
        }
        Commands::Price { ticker, price, sector } => {
            let update = store.update(|doc| {
                price_service::update_stock_price(doc, &ticker, MarketData { price, sector })
            })?;
            writeln!(
                out,
                "Updated {} to {:.2} in {} holding(s): {}",
                update.ticker,
                update.price,
                update.updated_holdings,
                update.portfolios.join(", ")
            )?;
        }
        Commands::Refresh { portfolio } => {
            let summary = price_service::refresh_prices(
                &state.store,
                state.price_provider.as_ref(),
                &state.retry_policy,
                portfolio.as_deref(),
            )
            .await?;
            for u in &summary.updated {
                writeln!(out, "{:<8} {:>10.2}  ({} holding(s))", u.ticker, u.price, u.updated_holdings)?;
            }
            for f in &summary.failed {
                writeln!(out, "{:<8} failed: {}", f.ticker, f.error)?;
            }
            writeln!(
                out,
                "Refreshed {} ticker(s), {} failure(s)",
                summary.updated.len(),
                summary.failed.len()
            )?;
        }
        Commands::Rename { id, name, risk_profile } => {
            let portfolio = store.update(|doc| {
                portfolio_service::update(doc, &id, UpdatePortfolio { name, risk_profile })
            })?;
            writeln!(
                out,
                "Portfolio {} is now '{}' ({})",
                portfolio.id, portfolio.name, portfolio.risk_profile
            )?;
        }
        Commands::Delete { id } => {
            let removed = store.update(|doc| portfolio_service::delete(doc, &id))?;
            writeln!(
                out,
                "Deleted portfolio {} ({} holding(s))",
                removed.id,
                removed.holdings.len()
            )?;
        }
        Commands::Quote { symbol } => {
            let quote = price_service::get_quote(
                state.price_provider.as_ref(),
                &state.quote_cache,
                &state.retry_policy,
                &symbol,
            )
            .await?;
            print_json(out, &quote)?;
        }
        Commands::Serve { .. } => {
            let listener = TcpListener::bind(config.bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", config.bind_addr))?;
            info!("🚀 Codex Ledger API running at http://{}/", config.bind_addr);
            info!("📒 Ledger file: {}", store.path().display());
            axum::serve(listener, create_app(state.clone())).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_buy_with_sector() {
        let cli = Cli::try_parse_from([
            "codex-ledger", "--ledger", "book.json", "buy", "growth", "aapl", "10", "150.5", "--sector", "Technology",
        ])
        .unwrap();
        assert_eq!(cli.ledger, Some(PathBuf::from("book.json")));
        match cli.command {
            Commands::Buy { portfolio, ticker, shares, price, sector } => {
                assert_eq!(portfolio, "growth");
                assert_eq!(ticker, "aapl");
                assert_eq!(shares, 10.0);
                assert_eq!(price, 150.5);
                assert_eq!(sector.as_deref(), Some("Technology"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_non_numeric_shares() {
        assert!(Cli::try_parse_from(["codex-ledger", "sell", "growth", "AAPL", "ten", "1"]).is_err());
    }

    #[test]
    fn risk_profile_accepts_aliases() {
        let cli = Cli::try_parse_from(["codex-ledger", "create", "Retirement", "-r", "low"]).unwrap();
        match cli.command {
            Commands::Create { risk_profile, id, .. } => {
                assert_eq!(risk_profile, RiskProfile::Conservative);
                assert!(id.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn overrides_apply_to_config() {
        let cli = Cli::try_parse_from(["codex-ledger", "-l", "/tmp/x.json", "serve", "--bind", "127.0.0.1:8081"]).unwrap();
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.ledger_path, PathBuf::from("/tmp/x.json"));
        assert_eq!(config.bind_addr, "127.0.0.1:8081".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn parses_adjust_with_partial_fields() {
        let cli = Cli::try_parse_from(["codex-ledger", "adjust", "growth", "AAPL", "--cost", "120"]).unwrap();
        match cli.command {
            Commands::Adjust { portfolio, ticker, shares, cost, price, sector } => {
                assert_eq!(portfolio, "growth");
                assert_eq!(ticker, "AAPL");
                assert_eq!(cost, Some(120.0));
                assert!(shares.is_none() && price.is_none() && sector.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn adjust_and_remove_rewrite_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            ledger_path: dir.path().join("book.json"),
            ..AppConfig::default()
        };
        async fn run(config: &AppConfig, args: &[&str]) -> Result<String> {
            let cli = Cli::try_parse_from(args).unwrap();
            let mut out = Vec::new();
            execute(cli.command, config, &mut out).await?;
            Ok(String::from_utf8(out).unwrap())
        }

        run(&config, &["codex-ledger", "create", "Growth", "--id", "growth"]).await.unwrap();
        run(&config, &["codex-ledger", "buy", "growth", "AAPL", "10", "150", "-s", "Technology"]).await.unwrap();
        run(&config, &["codex-ledger", "buy", "growth", "XOM", "5", "100", "-s", "Energy"]).await.unwrap();

        let text = run(&config, &["codex-ledger", "adjust", "growth", "aapl", "--shares", "20", "--cost", "120"])
            .await
            .unwrap();
        assert!(text.contains("20 shares"), "{}", text);
        assert!(text.contains("gain/loss 600.00"), "{}", text);

        let text = run(&config, &["codex-ledger", "remove", "growth", "XOM"]).await.unwrap();
        assert!(text.contains("Removed XOM"), "{}", text);
        assert!(run(&config, &["codex-ledger", "remove", "growth", "XOM"]).await.is_err());

        let store = crate::store::LedgerStore::new(config.ledger_path.clone(), config.store_options());
        let doc = store.load().unwrap();
        let p = doc.portfolio("growth").unwrap();
        assert_eq!(p.holdings.len(), 1);
        assert!((p.total_value - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn format_defaults_to_text() {
        let cli = Cli::try_parse_from(["codex-ledger", "view", "growth"]).unwrap();
        assert!(matches!(cli.command, Commands::View { format: OutputFormat::Text, .. }));
    }
}
