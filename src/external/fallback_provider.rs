use async_trait::async_trait;
use tracing::warn;

use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::Quote;

/// Tries the primary provider and degrades to the fallback (normally the
/// mock provider) when it fails. Rate limits are not masked.
pub struct FallbackProvider {
    primary: Box<dyn PriceProvider>,
    fallback: Box<dyn PriceProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Box<dyn PriceProvider>, fallback: Box<dyn PriceProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PriceProvider for FallbackProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, PriceProviderError> {
        match self.primary.fetch_quote(symbol).await {
            Ok(quote) => Ok(quote),
            Err(PriceProviderError::RateLimited) => Err(PriceProviderError::RateLimited),
            Err(e) => {
                warn!(
                    "{} provider failed for {} ({}), falling back to {}",
                    self.primary.name(),
                    symbol,
                    e,
                    self.fallback.name()
                );
                self.fallback.fetch_quote(symbol).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mock_provider::{MockPriceProvider, MOCK_SOURCE};

    struct Failing(fn() -> PriceProviderError);

    #[async_trait]
    impl PriceProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch_quote(&self, _symbol: &str) -> Result<Quote, PriceProviderError> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn test_degrades_to_fallback() {
        let provider = FallbackProvider::new(
            Box::new(Failing(|| PriceProviderError::Network("refused".into()))),
            Box::new(MockPriceProvider::new()),
        );
        let quote = provider.fetch_quote("NVDA").await.unwrap();
        assert_eq!(quote.source, MOCK_SOURCE);
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_masked() {
        let provider = FallbackProvider::new(
            Box::new(Failing(|| PriceProviderError::RateLimited)),
            Box::new(MockPriceProvider::new()),
        );
        assert!(matches!(
            provider.fetch_quote("NVDA").await,
            Err(PriceProviderError::RateLimited)
        ));
    }
}
