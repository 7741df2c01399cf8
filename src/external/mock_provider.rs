use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::Quote;

pub const MOCK_SOURCE: &str = "codex_market_api";

/// Synthetic quotes for demos and offline use. Every call draws a fresh price.
#[derive(Debug, Default, Clone)]
pub struct MockPriceProvider;

impl MockPriceProvider {
    pub fn new() -> Self {
        Self
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, PriceProviderError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(PriceProviderError::NotFound("empty symbol".into()));
        }

        let mut rng = rand::rng();
        let base_price: f64 = rng.random_range(100.0..500.0);
        let change: f64 = rng.random_range(-10.0..10.0);

        Ok(Quote {
            symbol,
            price: round2(base_price),
            change: round2(change),
            change_percent: round2(change / base_price * 100.0),
            volume: rng.random_range(1_000_000..=50_000_000),
            atr: round2(rng.random_range(2.0..15.0)),
            timestamp: Utc::now(),
            source: MOCK_SOURCE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_quote_ranges() {
        let provider = MockPriceProvider::new();
        for _ in 0..50 {
            let q = provider.fetch_quote("aapl").await.unwrap();
            assert_eq!(q.symbol, "AAPL");
            assert!((100.0..=500.0).contains(&q.price));
            assert!((-10.0..=10.0).contains(&q.change));
            assert!((1_000_000..=50_000_000).contains(&q.volume));
            assert!((2.0..=15.0).contains(&q.atr));
            assert_eq!(q.source, MOCK_SOURCE);
        }
    }

    #[tokio::test]
    async fn test_mock_rejects_blank_symbol() {
        let provider = MockPriceProvider::new();
        assert!(matches!(
            provider.fetch_quote("  ").await,
            Err(PriceProviderError::NotFound(_))
        ));
    }
}
