//! Client surface for the key/value index service.
//!
//! The backend is a hierarchical store of named indexes: an index holds string
//! key/value pairs, and a top-level index may contain sub-indexes one level
//! deep (an index of indexes). `IndexApi` is the capability boundary the rest
//! of the crate programs against; `RemoteIndex` talks to a real service over
//! HTTP and `MemoryIndex` backs standalone mode and the test suites.

mod memory;
mod remote;

pub use memory::MemoryIndex;
pub use remote::RemoteIndex;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Path of an index inside the backend: a top-level name plus an optional
/// nested sub-index name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRef {
    pub name: String,
    pub sub: Option<String>,
}

impl IndexRef {
    pub fn top<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), sub: None }
    }

    pub fn nested<S: Into<String>, T: Into<String>>(name: S, sub: T) -> Self {
        Self { name: name.into(), sub: Some(sub.into()) }
    }
}

impl Display for IndexRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.sub {
            Some(sub) => write!(f, "{}/{}", self.name, sub),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Errors surfaced by the index backend, as the adapter sees them.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("key not found")]
    NotFound,
    #[error("index not found")]
    IndexNotFound,
    #[error("index service unavailable: {0}")]
    Unavailable(String),
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("index backend error: {0}")]
    Unknown(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Capability interface over the index service.
///
/// Implementations must be safe for concurrent use; every call maps to one
/// backend round-trip and honors cancellation by being droppable mid-flight.
#[async_trait::async_trait]
pub trait IndexApi: Send + Sync {
    /// Fetch the value stored under `key`.
    async fn get(&self, index: &IndexRef, key: &str) -> IndexResult<String>;

    /// Store `value` under `key`. With `unique` set the write fails with
    /// [`IndexError::UniqueViolation`] when the key already holds a value.
    /// Creates the index (and sub-index) on first write.
    async fn set(&self, index: &IndexRef, key: &str, value: &str, unique: bool) -> IndexResult<()>;

    /// Remove `key` from the index.
    async fn delete(&self, index: &IndexRef, key: &str) -> IndexResult<()>;

    /// Enumerate the full contents of the index.
    async fn entries(&self, index: &IndexRef) -> IndexResult<HashMap<String, String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_ref_display() {
        assert_eq!(IndexRef::top("tokens").to_string(), "tokens");
        assert_eq!(IndexRef::nested("users", "alice").to_string(), "users/alice");
    }
}
