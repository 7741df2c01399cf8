pub mod fallback_provider;
pub mod http_provider;
pub mod mock_provider;
pub mod price_provider;

use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, ProviderKind};
use crate::errors::AppError;
use fallback_provider::FallbackProvider;
use http_provider::HttpPriceProvider;
use mock_provider::MockPriceProvider;
use price_provider::PriceProvider;

/// Builds the price provider selected by `PRICE_PROVIDER`.
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn PriceProvider>, AppError> {
    let http = || -> Result<HttpPriceProvider, AppError> {
        let url = config
            .market_api_url
            .as_deref()
            .ok_or_else(|| AppError::Validation("MARKET_API_URL is not set".into()))?;
        HttpPriceProvider::new(url).map_err(|e| AppError::Validation(e.to_string()))
    };

    let provider: Arc<dyn PriceProvider> = match config.price_provider {
        ProviderKind::Mock => {
            info!("📊 Using price provider: mock quotes");
            Arc::new(MockPriceProvider::new())
        }
        ProviderKind::Http => {
            info!("📊 Using price provider: HTTP ({:?})", config.market_api_url);
            Arc::new(http()?)
        }
        ProviderKind::Fallback => {
            info!("📊 Using price provider: HTTP with mock fallback ({:?})", config.market_api_url);
            Arc::new(FallbackProvider::new(Box::new(http()?), Box::new(MockPriceProvider::new())))
        }
    };
    Ok(provider)
}
