use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::external::price_provider::PriceProvider;
use crate::external::provider_from_config;
use crate::services::price_service::RetryPolicy;
use crate::services::quote_cache::QuoteCache;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LedgerStore>,
    pub price_provider: Arc<dyn PriceProvider>,
    pub quote_cache: QuoteCache,
    pub retry_policy: RetryPolicy,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            store: Arc::new(LedgerStore::new(config.ledger_path.clone(), config.store_options())),
            price_provider: provider_from_config(config)?,
            quote_cache: QuoteCache::new(config.quote_cache_ttl_secs),
            retry_policy: config.retry_policy(),
        })
    }
}
