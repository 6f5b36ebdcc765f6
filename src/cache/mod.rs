// ============================================================================
// Catalog Read Cache
// ============================================================================
//
// Read-through cache of the enabled items per category, keyed
// "{namespace}_{category_id}" (dish_12, setmeal_4). Values are JSON lists.
//
// Invalidation runs after the catalog write commits and before the mutating
// call returns:
// - Precise: drop one category key (item created in a known category)
// - Coarse: drop the whole namespace (updates, deletes, status changes)
//
// A generation counter guards read-through fills: a loader that started
// before an invalidation never writes its result back.
//
// ============================================================================

pub mod memory;
pub mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::domain::ErrorKind;
use crate::metrics::Metrics;

pub const DISH_NAMESPACE: &str = "dish";
pub const COMBO_NAMESPACE: &str = "setmeal";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    Category(i64),
    All,
}

impl CacheScope {
    pub fn mode(&self) -> InvalidationMode {
        match self {
            CacheScope::Category(_) => InvalidationMode::Precise,
            CacheScope::All => InvalidationMode::Coarse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationMode {
    Precise,
    Coarse,
}

impl InvalidationMode {
    pub fn label(&self) -> &'static str {
        match self {
            InvalidationMode::Precise => "precise",
            InvalidationMode::Coarse => "coarse",
        }
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix`; returns how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// One cache namespace (dishes or combos) over a shared backend
#[derive(Clone)]
pub struct CatalogCache {
    backend: Arc<dyn CacheBackend>,
    namespace: &'static str,
    generation: Arc<RwLock<u64>>,
    metrics: Option<Arc<Metrics>>,
}

impl CatalogCache {
    pub fn new(backend: Arc<dyn CacheBackend>, namespace: &'static str) -> Self {
        Self {
            backend,
            namespace,
            generation: Arc::new(RwLock::new(0)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn key(&self, category_id: i64) -> String {
        format!("{}_{}", self.namespace, category_id)
    }

    /// Cached list for a category, or `load()` on a miss. Read failures and
    /// undecodable entries count as misses; a failed fill is only logged.
    pub async fn get_or_load<T, E, F, Fut>(&self, category_id: i64, load: F) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let key = self.key(category_id);

        match self.backend.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(items) => {
                    self.record_lookup(true);
                    return Ok(items);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, loading from store");
            }
        }
        self.record_lookup(false);

        let started_at = *self.generation.read().await;
        let items = load().await?;

        match serde_json::to_string(&items) {
            Ok(raw) => {
                let generation = self.generation.read().await;
                if *generation == started_at {
                    if let Err(e) = self.backend.set(&key, raw).await {
                        tracing::warn!(key = %key, error = %e, "Cache fill failed");
                    }
                } else {
                    tracing::debug!(key = %key, "Skipping fill, invalidated while loading");
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache fill could not encode items");
            }
        }

        Ok(items)
    }

    /// Drop cached entries for `scope`. Returns once the backend confirmed.
    pub async fn invalidate(&self, scope: CacheScope) -> Result<InvalidationMode, CacheError> {
        let mode = scope.mode();
        let mut generation = self.generation.write().await;
        *generation += 1;

        match scope {
            CacheScope::Category(category_id) => {
                let key = self.key(category_id);
                self.backend.delete(&key).await?;
                tracing::debug!(key = %key, "🧹 Precise cache invalidation");
            }
            CacheScope::All => {
                let prefix = format!("{}_", self.namespace);
                let removed = self.backend.delete_prefix(&prefix).await?;
                tracing::debug!(prefix = %prefix, removed = removed, "🧹 Coarse cache invalidation");
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_invalidation(self.namespace, mode.label());
        }
        Ok(mode)
    }

    fn record_lookup(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(self.namespace, hit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cache() -> (Arc<MemoryCache>, CatalogCache) {
        let backend = Arc::new(MemoryCache::new());
        let cache = CatalogCache::new(backend.clone(), DISH_NAMESPACE);
        (backend, cache)
    }

    async fn load_counted(calls: &AtomicU32, items: Vec<String>) -> Result<Vec<String>, CacheError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(items)
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let (_, cache) = cache();
        let calls = AtomicU32::new(0);

        let first = cache
            .get_or_load(1, || load_counted(&calls, vec!["rice".to_string()]))
            .await
            .unwrap();
        let second = cache
            .get_or_load(1, || load_counted(&calls, vec!["stale".to_string()]))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_cached() {
        let (backend, cache) = cache();
        let calls = AtomicU32::new(0);

        cache.get_or_load(9, || load_counted(&calls, vec![])).await.unwrap();
        cache.get_or_load(9, || load_counted(&calls, vec![])).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.get("dish_9").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_precise_invalidation_keeps_other_categories() {
        let (backend, cache) = cache();
        let calls = AtomicU32::new(0);
        cache.get_or_load(1, || load_counted(&calls, vec!["a".to_string()])).await.unwrap();
        cache.get_or_load(2, || load_counted(&calls, vec!["b".to_string()])).await.unwrap();

        let mode = cache.invalidate(CacheScope::Category(1)).await.unwrap();
        assert_eq!(mode, InvalidationMode::Precise);
        assert!(backend.get("dish_1").await.unwrap().is_none());
        assert!(backend.get("dish_2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_coarse_invalidation_stays_in_namespace() {
        let backend = Arc::new(MemoryCache::new());
        let dishes = CatalogCache::new(backend.clone(), DISH_NAMESPACE);
        let combos = CatalogCache::new(backend.clone(), COMBO_NAMESPACE);
        let calls = AtomicU32::new(0);

        dishes.get_or_load(1, || load_counted(&calls, vec!["a".to_string()])).await.unwrap();
        dishes.get_or_load(2, || load_counted(&calls, vec!["b".to_string()])).await.unwrap();
        combos.get_or_load(1, || load_counted(&calls, vec!["c".to_string()])).await.unwrap();

        let mode = dishes.invalidate(CacheScope::All).await.unwrap();
        assert_eq!(mode, InvalidationMode::Coarse);
        assert!(backend.get("dish_1").await.unwrap().is_none());
        assert!(backend.get("dish_2").await.unwrap().is_none());
        assert!(backend.get("setmeal_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (backend, cache) = cache();
        backend.set("dish_3", "not json".to_string()).await.unwrap();
        let calls = AtomicU32::new(0);

        let items = cache
            .get_or_load(3, || load_counted(&calls, vec!["fresh".to_string()]))
            .await
            .unwrap();

        assert_eq!(items, vec!["fresh".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fill_skipped_when_invalidated_during_load() {
        let (backend, cache) = cache();
        let racing = cache.clone();

        let items: Vec<String> = cache
            .get_or_load(1, || async move {
                // A catalog write commits and invalidates while we load
                racing.invalidate(CacheScope::All).await?;
                Ok::<_, CacheError>(vec!["old".to_string()])
            })
            .await
            .unwrap();

        assert_eq!(items, vec!["old".to_string()]);
        assert!(backend.get("dish_1").await.unwrap().is_none());
    }
}
