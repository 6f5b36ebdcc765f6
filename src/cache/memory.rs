use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheBackend, CacheError};

/// In-process cache backend for tests and single-node runs
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_prefix_leaves_other_namespaces() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());

        cache.set("dish_1", "[]".to_string()).await.unwrap();
        cache.set("dish_2", "[]".to_string()).await.unwrap();
        cache.set("setmeal_1", "[]".to_string()).await.unwrap();
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.delete_prefix("dish_").await.unwrap(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("setmeal_1").await.unwrap().is_some());

        cache.delete("setmeal_1").await.unwrap();
        assert!(cache.is_empty());
    }
}
