use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::Quote;

/// Fetches quotes from another ledger server (or any service exposing the
/// same `/api/market/quote/:symbol` shape).
pub struct HttpPriceProvider {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpPriceProvider {
    pub fn new(base_url: &str) -> Result<Self, PriceProviderError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| PriceProviderError::BadResponse(format!("invalid MARKET_API_URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn quote_url(&self, symbol: &str) -> Result<url::Url, PriceProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PriceProviderError::BadResponse("MARKET_API_URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "market", "quote", symbol]);
        Ok(url)
    }
}

#[async_trait]
impl PriceProvider for HttpPriceProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, PriceProviderError> {
        let url = self.quote_url(symbol)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(PriceProviderError::RateLimited),
            StatusCode::NOT_FOUND => return Err(PriceProviderError::NotFound(symbol.to_string())),
            s if !s.is_success() => {
                return Err(PriceProviderError::BadResponse(format!("HTTP {} for {}", s, symbol)));
            }
            _ => {}
        }

        resp.json::<Quote>()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_url_joins_path() {
        let provider = HttpPriceProvider::new("http://localhost:3000/").unwrap();
        assert_eq!(
            provider.quote_url("MSFT").unwrap().as_str(),
            "http://localhost:3000/api/market/quote/MSFT"
        );

        let nested = HttpPriceProvider::new("http://markets.local/codex").unwrap();
        assert_eq!(
            nested.quote_url("BRK.B").unwrap().as_str(),
            "http://markets.local/codex/api/market/quote/BRK.B"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpPriceProvider::new("not a url").is_err());
    }
}
