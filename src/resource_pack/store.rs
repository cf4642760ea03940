//! Key-value persistence seam for raw asset bodies.

use crate::error::Result;
use futures::future::{ready, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Async key-value store used to persist raw asset bodies between sessions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Vec<u8>>>>;
    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'static, Result<()>>;
}

/// Process-local [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Vec<u8>>>> {
        let value = self.entries.lock().get(key).cloned();
        ready(Ok(value)).boxed()
    }

    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'static, Result<()>> {
        self.entries.lock().insert(key.to_string(), value);
        ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_absent() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.put("a", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.len(), 1);
    }
}
