use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{FailedQuote, LedgerDocument, MarketData, PriceUpdate, Quote, RefreshSummary};
use crate::services::analytics_service;
use crate::services::quote_cache::QuoteCache;
use crate::services::trade_service::{normalize_ticker, validate_price};
use crate::store::LedgerStore;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Base delay; attempt `n` waits `delay * n` before the next try.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(1500),
        }
    }
}

/// Runs `op` up to `policy.attempts` times with linear backoff, returning the
/// last error when every attempt fails.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.delay * attempt;
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {}ms",
                    attempt,
                    attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn provider_error(symbol: &str, e: PriceProviderError) -> AppError {
    match e {
        PriceProviderError::RateLimited => AppError::RateLimited,
        PriceProviderError::NotFound(_) => AppError::NotFound(format!("No quote for {}", symbol)),
        other => AppError::External(other.to_string()),
    }
}

/// Fetches a quote with retry, bypassing any cache.
pub async fn fetch_quote(provider: &dyn PriceProvider, policy: &RetryPolicy, symbol: &str) -> Result<Quote, AppError> {
    let symbol = normalize_ticker(symbol)?;
    retry(policy, |_| provider.fetch_quote(&symbol))
        .await
        .map_err(|e| provider_error(&symbol, e))
}

/// Serves a quote from the cache, fetching and caching it on a miss.
pub async fn get_quote(
    provider: &dyn PriceProvider,
    cache: &QuoteCache,
    policy: &RetryPolicy,
    symbol: &str,
) -> Result<Quote, AppError> {
    if let Some(quote) = cache.get(symbol) {
        return Ok(quote);
    }
    let quote = fetch_quote(provider, policy, symbol).await?;
    cache.insert(quote.clone());
    Ok(quote)
}

/// Updates every holding of `ticker` across all portfolios.
pub fn update_stock_price(doc: &mut LedgerDocument, ticker: &str, market_data: MarketData) -> Result<PriceUpdate, AppError> {
    apply_price(doc, ticker, &market_data, None)
}

fn apply_price(
    doc: &mut LedgerDocument,
    ticker: &str,
    market_data: &MarketData,
    only_portfolio: Option<&str>,
) -> Result<PriceUpdate, AppError> {
    let ticker = normalize_ticker(ticker)?;
    validate_price(market_data.price)?;

    let mut updated_holdings = 0;
    let mut portfolios = Vec::new();
    for portfolio in doc.portfolios.values_mut() {
        if only_portfolio.is_some_and(|id| id != portfolio.id) {
            continue;
        }
        let mut touched = false;
        for h in portfolio.holdings.iter_mut().filter(|h| h.ticker == ticker) {
            h.price = market_data.price;
            if market_data.sector.is_some() {
                h.sector = market_data.sector.clone();
            }
            updated_holdings += 1;
            touched = true;
        }
        if touched {
            analytics_service::recompute(portfolio);
            portfolios.push(portfolio.id.clone());
        }
    }

    if updated_holdings == 0 {
        return Err(AppError::NotFound(format!("Ticker {} not held in any portfolio", ticker)));
    }
    info!("Updated {} to {} in {} portfolio(s)", ticker, market_data.price, portfolios.len());
    Ok(PriceUpdate {
        ticker,
        price: market_data.price,
        updated_holdings,
        portfolios,
    })
}

/// Fetches quotes for every held ticker (or one portfolio's) concurrently and
/// applies them in a single ledger update. Per-ticker failures are reported
/// in the summary rather than aborting the refresh. Ledger I/O runs on the
/// blocking pool so a contended lock never stalls the runtime.
pub async fn refresh_prices(
    store: &Arc<LedgerStore>,
    provider: &dyn PriceProvider,
    policy: &RetryPolicy,
    portfolio_id: Option<&str>,
) -> Result<RefreshSummary, AppError> {
    let doc = store.load_async().await?;
    let tickers = match portfolio_id {
        Some(id) => {
            let mut t: Vec<String> = doc.portfolio(id)?.holdings.iter().map(|h| h.ticker.clone()).collect();
            t.sort();
            t.dedup();
            t
        }
        None => doc.tickers(),
    };
    drop(doc);

    let results = join_all(tickers.iter().map(|ticker| async move {
        (ticker.clone(), fetch_quote(provider, policy, ticker).await)
    }))
    .await;

    let mut quotes = Vec::new();
    let mut failed = Vec::new();
    for (ticker, result) in results {
        match result {
            Ok(quote) => quotes.push((ticker, quote)),
            Err(e) => {
                warn!("Failed to fetch quote for {}: {}", ticker, e);
                failed.push(FailedQuote { ticker, error: e.to_string() });
            }
        }
    }

    let only = portfolio_id.map(str::to_string);
    let (updated, unheld) = store
        .update_async(move |doc| {
            let mut updated = Vec::new();
            let mut unheld = Vec::new();
            for (ticker, quote) in &quotes {
                let data = MarketData { price: quote.price, sector: None };
                match apply_price(doc, ticker, &data, only.as_deref()) {
                    Ok(update) => updated.push(update),
                    // Sold between the fetch and the write
                    Err(AppError::NotFound(msg)) => unheld.push(FailedQuote { ticker: ticker.clone(), error: msg }),
                    Err(e) => return Err(e),
                }
            }
            Ok((updated, unheld))
        })
        .await?;
    failed.extend(unheld);

    let updated_holdings = updated.iter().map(|u| u.updated_holdings).sum();
    info!(
        "Refreshed {} ticker(s), {} holding(s) updated, {} failure(s)",
        updated.len(),
        updated_holdings,
        failed.len()
    );
    Ok(RefreshSummary {
        updated,
        failed,
        updated_holdings,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{CreatePortfolio, RiskProfile, Trade, TradeAction};
    use crate::services::{portfolio_service, trade_service};
    use crate::store::StoreOptions;

    fn seeded() -> LedgerDocument {
        let mut doc = LedgerDocument::default();
        for id in ["growth", "income"] {
            portfolio_service::create(
                &mut doc,
                CreatePortfolio { id: Some(id.into()), name: id.into(), risk_profile: RiskProfile::Moderate },
            )
            .unwrap();
        }
        let buy = |ticker: &str, shares: f64, price: f64| Trade {
            action: TradeAction::Buy,
            ticker: ticker.into(),
            shares,
            price,
            sector: Some("Technology".into()),
        };
        trade_service::execute_trade(&mut doc, "growth", buy("AAPL", 10.0, 150.0)).unwrap();
        trade_service::execute_trade(&mut doc, "growth", buy("MSFT", 2.0, 400.0)).unwrap();
        trade_service::execute_trade(&mut doc, "income", buy("AAPL", 4.0, 170.0)).unwrap();
        doc
    }

    struct FlakyProvider {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl PriceProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, PriceProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(PriceProviderError::Network("connection reset".into()));
            }
            if symbol == "MSFT" {
                return Err(PriceProviderError::NotFound(symbol.into()));
            }
            Ok(Quote {
                symbol: symbol.into(),
                price: 200.0,
                change: 1.0,
                change_percent: 0.5,
                volume: 2_000_000,
                atr: 4.0,
                timestamp: Utc::now(),
                source: "flaky".into(),
            })
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy { attempts, delay: Duration::from_millis(1) }
    }

    #[test]
    fn test_update_stock_price_across_portfolios() {
        let mut doc = seeded();
        let update = update_stock_price(
            &mut doc,
            "aapl",
            MarketData { price: 190.0, sector: Some("Tech Hardware".into()) },
        )
        .unwrap();

        assert_eq!(update.updated_holdings, 2);
        assert_eq!(update.portfolios, vec!["growth".to_string(), "income".to_string()]);

        let growth = doc.portfolio("growth").unwrap();
        let aapl = growth.holding("AAPL").unwrap();
        assert_eq!(aapl.value, 1900.0);
        assert_eq!(aapl.sector.as_deref(), Some("Tech Hardware"));
        assert_eq!(growth.total_value, 1900.0 + 800.0);
        doc.validate().unwrap();
    }

    #[test]
    fn test_update_unknown_ticker_is_not_found() {
        let mut doc = seeded();
        let err = update_stock_price(&mut doc, "TSLA", MarketData { price: 10.0, sector: None }).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = update_stock_price(&mut doc, "AAPL", MarketData { price: 0.0, sector: None }).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(&fast_policy(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { if attempt < 3 { Err(format!("fail {}", attempt)) } else { Ok(attempt) } }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let result: Result<(), String> =
            retry(&fast_policy(2), |attempt| async move { Err(format!("fail {}", attempt)) }).await;
        assert_eq!(result, Err("fail 2".to_string()));
    }

    #[tokio::test]
    async fn test_get_quote_uses_cache() {
        let provider = FlakyProvider { calls: AtomicU32::new(0), fail_first: 0 };
        let cache = QuoteCache::new(60);
        let policy = fast_policy(1);

        get_quote(&provider, &cache, &policy, "NVDA").await.unwrap();
        get_quote(&provider, &cache, &policy, "nvda").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_prices_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LedgerStore::new(dir.path().join("portfolios.json"), StoreOptions::default()));
        let mut doc = seeded();
        store.save(&mut doc).unwrap();

        let provider = FlakyProvider { calls: AtomicU32::new(0), fail_first: 1 };
        let summary = refresh_prices(&store, &provider, &fast_policy(3), None).await.unwrap();

        assert_eq!(summary.updated.len(), 1);
        assert_eq!(summary.updated[0].ticker, "AAPL");
        assert_eq!(summary.updated_holdings, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].ticker, "MSFT");

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.portfolio("income").unwrap().holding("AAPL").unwrap().price, 200.0);
        assert_eq!(reloaded.portfolio("growth").unwrap().holding("MSFT").unwrap().price, 400.0);
    }

    #[tokio::test]
    async fn test_refresh_single_portfolio_leaves_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LedgerStore::new(dir.path().join("portfolios.json"), StoreOptions::default()));
        let mut doc = seeded();
        store.save(&mut doc).unwrap();

        let provider = FlakyProvider { calls: AtomicU32::new(0), fail_first: 0 };
        let summary = refresh_prices(&store, &provider, &fast_policy(1), Some("income")).await.unwrap();
        assert_eq!(summary.updated_holdings, 1);

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.portfolio("income").unwrap().holding("AAPL").unwrap().price, 200.0);
        assert_eq!(reloaded.portfolio("growth").unwrap().holding("AAPL").unwrap().price, 150.0);
    }
}
