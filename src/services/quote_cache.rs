use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::models::Quote;

/// Longest quote cache TTL accepted from configuration (one day).
pub const MAX_QUOTE_CACHE_TTL_SECS: i64 = 86_400;

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: Quote,
    cached_at: DateTime<Utc>,
}

/// Thread-safe per-symbol quote cache with a fixed TTL.
#[derive(Clone)]
pub struct QuoteCache {
    cache: Arc<DashMap<String, CachedQuote>>,
    ttl: Duration,
}

impl QuoteCache {
    /// `ttl_secs` is clamped to `0..=MAX_QUOTE_CACHE_TTL_SECS`.
    pub fn new(ttl_secs: i64) -> Self {
        let ttl = Duration::try_seconds(ttl_secs.clamp(0, MAX_QUOTE_CACHE_TTL_SECS)).unwrap_or_else(Duration::zero);
        Self {
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn is_fresh(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        cached_at.checked_add_signed(self.ttl).is_some_and(|expires| now < expires)
    }

    /// Returns the cached quote if it is still within TTL. Expired entries are evicted.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let key = symbol.to_uppercase();
        if let Some(entry) = self.cache.get(&key) {
            if self.is_fresh(entry.cached_at, Utc::now()) {
                return Some(entry.quote.clone());
            }
            drop(entry); // release the read lock before removing
            self.cache.remove(&key);
        }
        None
    }

    pub fn insert(&self, quote: Quote) {
        let key = quote.symbol.to_uppercase();
        self.cache.insert(
            key,
            CachedQuote {
                quote,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn clear(&self, symbol: &str) {
        self.cache.remove(&symbol.to_uppercase());
    }

    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.cache.retain(|_, cached| self.is_fresh(cached.cached_at, now));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
