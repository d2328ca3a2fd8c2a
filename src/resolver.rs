use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::api::{ApiError, MarketLookup};

/// Caches slug → market id lookups for the lifetime of the process.
///
/// Entries are never evicted. Two concurrent first lookups of the same slug may
/// both hit the API; the second write simply overwrites an identical value.
pub struct MarketIdResolver {
    lookup: Box<dyn MarketLookup>,
    cache: Mutex<HashMap<String, String>>,
}

impl MarketIdResolver {
    pub fn new(lookup: Box<dyn MarketLookup>) -> Self {
        Self {
            lookup,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `slug` to its market id.
    ///
    /// `Ok(None)` means the market does not exist (or the slug is empty) and the
    /// trade should be skipped. Lookup failures are returned and not cached.
    pub async fn resolve(&self, slug: &str) -> Result<Option<String>, ApiError> {
        if slug.is_empty() {
            return Ok(None);
        }

        let cached = self.cache.lock().get(slug).cloned();
        if let Some(market_id) = cached {
            return Ok(Some(market_id));
        }

        let markets = self.lookup.markets_by_slug(slug).await?;
        let Some(market_id) = markets.first().and_then(|m| m.market_id()).map(str::to_string)
        else {
            return Ok(None);
        };

        debug!("Resolved slug {slug} → market {market_id}");
        self.cache
            .lock()
            .insert(slug.to_string(), market_id.clone());
        Ok(Some(market_id))
    }

    /// Number of cached slugs.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MarketSummary;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubLookup {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl MarketLookup for StubLookup {
        async fn markets_by_slug(&self, slug: &str) -> Result<Vec<MarketSummary>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::Unavailable("gamma down".into()));
            }
            if slug == "missing" {
                return Ok(Vec::new());
            }
            Ok(vec![
                MarketSummary {
                    condition_id: Some(format!("cond-{slug}")),
                    ..Default::default()
                },
                MarketSummary {
                    condition_id: Some("second".into()),
                    ..Default::default()
                },
            ])
        }
    }

    fn resolver(fail: bool) -> (MarketIdResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = StubLookup {
            calls: Arc::clone(&calls),
            fail,
        };
        (MarketIdResolver::new(Box::new(lookup)), calls)
    }

    #[tokio::test]
    async fn first_market_wins_and_is_cached() {
        let (resolver, calls) = resolver(false);
        assert_eq!(resolver.resolve("rain").await.unwrap().as_deref(), Some("cond-rain"));
        assert_eq!(resolver.resolve("rain").await.unwrap().as_deref(), Some("cond-rain"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let (resolver, calls) = resolver(false);
        assert_eq!(resolver.resolve("missing").await.unwrap(), None);
        assert_eq!(resolver.cached(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_slug_skips_lookup() {
        let (resolver, calls) = resolver(false);
        assert_eq!(resolver.resolve("").await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_errors_are_not_cached() {
        let (resolver, calls) = resolver(true);
        assert!(resolver.resolve("rain").await.is_err());
        assert!(resolver.resolve("rain").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 0);
    }
}
