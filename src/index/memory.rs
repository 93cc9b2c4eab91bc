//! In-process index backend.
//!
//! Mirrors the open-on-first-use behavior of the real service: reading from an
//! index that was never written behaves like an empty index rather than an
//! error. Used for `memory:` configurations and throughout the test suites.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{IndexApi, IndexError, IndexRef, IndexResult};

/// A single shared in-memory index tree. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    map: Arc<RwLock<HashMap<IndexRef, HashMap<String, String>>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IndexApi for MemoryIndex {
    async fn get(&self, index: &IndexRef, key: &str) -> IndexResult<String> {
        let map = self.map.read();
        map.get(index)
            .and_then(|idx| idx.get(key))
            .cloned()
            .ok_or(IndexError::NotFound)
    }

    async fn set(&self, index: &IndexRef, key: &str, value: &str, unique: bool) -> IndexResult<()> {
        let mut map = self.map.write();
        let idx = map.entry(index.clone()).or_default();
        if unique && idx.contains_key(key) {
            return Err(IndexError::UniqueViolation);
        }
        idx.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, index: &IndexRef, key: &str) -> IndexResult<()> {
        let mut map = self.map.write();
        // a delete must not materialize an index that was never written
        match map.get_mut(index).and_then(|idx| idx.remove(key)) {
            Some(_) => Ok(()),
            None => Err(IndexError::NotFound),
        }
    }

    async fn entries(&self, index: &IndexRef) -> IndexResult<HashMap<String, String>> {
        let map = self.map.read();
        Ok(map.get(index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_roundtrip() {
        let idx = MemoryIndex::new();
        let r = IndexRef::nested("users", "alice");
        idx.set(&r, "db_pass", "hunter2", false).await.unwrap();
        assert_eq!(idx.get(&r, "db_pass").await.unwrap(), "hunter2");
        idx.delete(&r, "db_pass").await.unwrap();
        assert!(matches!(idx.get(&r, "db_pass").await, Err(IndexError::NotFound)));
    }

    #[tokio::test]
    async fn unique_insert_rejects_second_write() {
        let idx = MemoryIndex::new();
        let r = IndexRef::top("tokens");
        idx.set(&r, "t1", "alice", true).await.unwrap();
        let err = idx.set(&r, "t1", "bob", true).await.unwrap_err();
        assert!(matches!(err, IndexError::UniqueViolation));
        // the original binding survives
        assert_eq!(idx.get(&r, "t1").await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn plain_set_overwrites() {
        let idx = MemoryIndex::new();
        let r = IndexRef::nested("users", "alice");
        idx.set(&r, "k", "v1", false).await.unwrap();
        idx.set(&r, "k", "v2", false).await.unwrap();
        assert_eq!(idx.get(&r, "k").await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn unwritten_index_reads_as_empty() {
        let idx = MemoryIndex::new();
        let r = IndexRef::nested("users", "nobody");
        assert!(matches!(idx.get(&r, "k").await, Err(IndexError::NotFound)));
        assert!(idx.entries(&r).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_does_not_materialize_an_index() {
        let idx = MemoryIndex::new();
        let r = IndexRef::nested("users", "nobody");
        assert!(matches!(idx.delete(&r, "k").await, Err(IndexError::NotFound)));
        // the failed delete left no trace behind
        assert!(idx.map.read().get(&r).is_none());
    }

    #[tokio::test]
    async fn sub_indexes_are_isolated() {
        let idx = MemoryIndex::new();
        let alice = IndexRef::nested("users", "alice");
        let bob = IndexRef::nested("users", "bob");
        idx.set(&alice, "k", "a", false).await.unwrap();
        assert!(matches!(idx.get(&bob, "k").await, Err(IndexError::NotFound)));
    }
}
