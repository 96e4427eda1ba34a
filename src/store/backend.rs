use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// An ordered-list key-value backend. Implementations must be safe to share
/// between request tasks without outside locking.
#[async_trait]
pub trait ListBackend: Send + Sync {
    /// Appends `value` to the end of the list at `key`, creating it if absent.
    async fn append(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes every element equal to `value`, returning how many went.
    async fn remove(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// The whole list in insertion order; empty when the key is absent.
    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Keys ending in `suffix`.
    async fn keys(&self, suffix: &str) -> Result<Vec<String>, StoreError>;

    /// Replaces the list at `key` with `values`.
    async fn replace(&self, key: &str, values: Vec<String>) -> Result<(), StoreError>;
}

/// In-process backend. Used in tests and with `STENO_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryBackend {
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListBackend for MemoryBackend {
    async fn append(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.lists
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push(value);

        Ok(())
    }

    async fn remove(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut lists = self.lists.write().await;
        let Some(list) = lists.get_mut(key) else {
            return Ok(0);
        };

        let before = list.len();
        list.retain(|item| item != value);
        let removed = before - list.len();

        // redis drops a list once it is empty
        if list.is_empty() {
            lists.remove(key);
        }

        Ok(removed)
    }

    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lists
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn keys(&self, suffix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .lists
            .read()
            .await
            .keys()
            .filter(|key| key.ends_with(suffix))
            .cloned()
            .collect();
        keys.sort();

        Ok(keys)
    }

    async fn replace(&self, key: &str, values: Vec<String>) -> Result<(), StoreError> {
        let mut lists = self.lists.write().await;
        if values.is_empty() {
            lists.remove(key);
        } else {
            lists.insert(key.to_string(), values);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remove_drops_every_equal_element() {
        let backend = MemoryBackend::new();
        for value in ["a", "b", "a"] {
            backend.append("k", value.to_string()).await.unwrap();
        }

        assert_eq!(backend.remove("k", "a").await.unwrap(), 2);
        assert_eq!(backend.range("k").await.unwrap(), vec!["b".to_string()]);
        assert_eq!(backend.remove("k", "a").await.unwrap(), 0);
        assert_eq!(backend.remove("missing", "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn emptied_lists_disappear_from_keys() {
        let backend = MemoryBackend::new();
        backend.append("g:u:quotes", "a".to_string()).await.unwrap();
        backend.append("other", "a".to_string()).await.unwrap();

        assert_eq!(
            backend.keys(":quotes").await.unwrap(),
            vec!["g:u:quotes".to_string()]
        );

        backend.remove("g:u:quotes", "a").await.unwrap();
        assert!(backend.keys(":quotes").await.unwrap().is_empty());
    }
}
