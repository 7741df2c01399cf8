use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::price_service::RetryPolicy;
use crate::services::quote_cache::MAX_QUOTE_CACHE_TTL_SECS;
use crate::store::StoreOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Mock,
    Http,
    /// HTTP with mock fallback
    Fallback,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "http" => Ok(ProviderKind::Http),
            "fallback" => Ok(ProviderKind::Fallback),
            other => Err(format!(
                "Invalid PRICE_PROVIDER: {}. Must be 'mock', 'http', or 'fallback'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ledger_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub price_provider: ProviderKind,
    pub market_api_url: Option<String>,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub quote_cache_ttl_secs: i64,
    pub lock_timeout_ms: u64,
    pub backup: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: '{}'", key, raw)),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            ledger_path: PathBuf::from(
                std::env::var("LEDGER_PATH").unwrap_or_else(|_| "portfolios.json".to_string()),
            ),
            bind_addr: env_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            price_provider: std::env::var("PRICE_PROVIDER")
                .unwrap_or_else(|_| "mock".to_string())
                .parse()?,
            market_api_url: std::env::var("MARKET_API_URL").ok().filter(|s| !s.trim().is_empty()),
            retry_attempts: env_or("QUOTE_RETRY_ATTEMPTS", 3)?,
            retry_delay_ms: env_or("QUOTE_RETRY_DELAY_MS", 1500)?,
            quote_cache_ttl_secs: env_or("QUOTE_CACHE_TTL_SECS", 60)?,
            lock_timeout_ms: env_or("LEDGER_LOCK_TIMEOUT_MS", 5000)?,
            backup: env_or("LEDGER_BACKUP", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.price_provider != ProviderKind::Mock && self.market_api_url.is_none() {
            return Err("PRICE_PROVIDER requires MARKET_API_URL to be set".to_string());
        }
        if self.retry_attempts == 0 {
            return Err("QUOTE_RETRY_ATTEMPTS must be at least 1".to_string());
        }
        if self.quote_cache_ttl_secs < 0 {
            return Err("QUOTE_CACHE_TTL_SECS cannot be negative".to_string());
        }
        if self.quote_cache_ttl_secs > MAX_QUOTE_CACHE_TTL_SECS {
            return Err(format!(
                "QUOTE_CACHE_TTL_SECS cannot exceed {} seconds",
                MAX_QUOTE_CACHE_TTL_SECS
            ));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            backup: self.backup,
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("portfolios.json"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            price_provider: ProviderKind::Mock,
            market_api_url: None,
            retry_attempts: 3,
            retry_delay_ms: 1500,
            quote_cache_ttl_secs: 60,
            lock_timeout_ms: 5000,
            backup: true,
        }
    }
}
