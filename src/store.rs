//! Secret storage over the index service.
//!
//! Two top-level indexes back the whole store: `users` holds one sub-index per
//! username (with the reserved `password` attribute inside it), and `tokens`
//! is a flat token -> username map. Every backend fault is normalized into the
//! [`KeeperError`] taxonomy here; unrecognized faults are logged as warnings
//! and become `Unknown`, never a panic.

use std::sync::Arc;

use tracing::warn;

use crate::error::{KeeperError, KeeperResult};
use crate::index::{IndexApi, IndexError, IndexRef};

const USERS_INDEX: &str = "users";
const TOKENS_INDEX: &str = "tokens";

/// Attribute inside a user's namespace that holds the account password.
/// Reserved: it never appears in secret-name listings.
pub const PASSWORD_KEY: &str = "password";

#[derive(Clone)]
pub struct SecretStore {
    index: Arc<dyn IndexApi>,
}

impl SecretStore {
    pub fn new(index: Arc<dyn IndexApi>) -> Self {
        Self { index }
    }

    fn user_index(username: &str) -> IndexRef {
        IndexRef::nested(USERS_INDEX, username)
    }

    fn tokens_index() -> IndexRef {
        IndexRef::top(TOKENS_INDEX)
    }

    /// Fetch the secret stored under `key` in the user's namespace.
    pub async fn get(&self, username: &str, key: &str) -> KeeperResult<String> {
        self.index
            .get(&Self::user_index(username), key)
            .await
            .map_err(|e| normalize(e, "store.get"))
    }

    /// Store a secret. Last write wins; no uniqueness on secret keys.
    pub async fn set(&self, username: &str, key: &str, value: &str) -> KeeperResult<()> {
        self.index
            .set(&Self::user_index(username), key, value, false)
            .await
            .map_err(|e| normalize(e, "store.set"))
    }

    /// Remove a secret from the user's namespace.
    pub async fn delete(&self, username: &str, key: &str) -> KeeperResult<()> {
        self.index
            .delete(&Self::user_index(username), key)
            .await
            .map_err(|e| normalize(e, "store.delete"))
    }

    /// List the user's secret names. The reserved password attribute and a
    /// key equal to the username itself are never reported.
    pub async fn get_all_names(&self, username: &str) -> KeeperResult<Vec<String>> {
        let mut entries = self
            .index
            .entries(&Self::user_index(username))
            .await
            .map_err(|e| normalize(e, "store.get_all_names"))?;
        entries.remove(PASSWORD_KEY);
        entries.remove(username);
        Ok(entries.into_keys().collect())
    }

    /// Create the user record. The password attribute is written with the
    /// uniqueness constraint so a second registration fails cleanly.
    pub async fn add_user(&self, username: &str, password: &str) -> KeeperResult<()> {
        self.index
            .set(&Self::user_index(username), PASSWORD_KEY, password, true)
            .await
            .map_err(|e| normalize(e, "store.add_user"))
    }

    /// Fetch the stored account password.
    pub async fn get_password(&self, username: &str) -> KeeperResult<String> {
        self.index
            .get(&Self::user_index(username), PASSWORD_KEY)
            .await
            .map_err(|e| normalize(e, "store.get_password"))
    }

    /// Bind a token to a username. Unique insert: a colliding token reports
    /// AlreadyExists and leaves the existing binding untouched.
    pub async fn add_token(&self, token: &str, username: &str) -> KeeperResult<()> {
        self.index
            .set(&Self::tokens_index(), token, username, true)
            .await
            .map_err(|e| normalize(e, "store.add_token"))
    }

    /// Resolve the username a token is bound to.
    pub async fn get_username(&self, token: &str) -> KeeperResult<String> {
        self.index
            .get(&Self::tokens_index(), token)
            .await
            .map_err(|e| normalize(e, "store.get_username"))
    }
}

/// Collapse backend errors into the four storage-visible kinds. Anything
/// unrecognized is logged and reported as Unknown rather than dropped.
fn normalize(err: IndexError, op: &str) -> KeeperError {
    match err {
        IndexError::NotFound => KeeperError::not_found(op.to_string()),
        IndexError::Unavailable(msg) => {
            KeeperError::unavailable(msg).in_op(op)
        }
        IndexError::UniqueViolation => KeeperError::already_exists(op.to_string()),
        IndexError::IndexNotFound => {
            warn!(op, "index reference rejected by backend");
            KeeperError::unknown("index not found").in_op(op)
        }
        IndexError::Unknown(msg) => {
            warn!(op, error = %msg, "unrecognized index backend error");
            KeeperError::unknown(msg).in_op(op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    fn store() -> SecretStore {
        SecretStore::new(Arc::new(MemoryIndex::new()))
    }

    #[tokio::test]
    async fn secrets_roundtrip_per_user() {
        let s = store();
        s.set("alice", "db_pass", "hunter2").await.unwrap();
        assert_eq!(s.get("alice", "db_pass").await.unwrap(), "hunter2");
        // overwrite: second write wins
        s.set("alice", "db_pass", "hunter3").await.unwrap();
        assert_eq!(s.get("alice", "db_pass").await.unwrap(), "hunter3");
        s.delete("alice", "db_pass").await.unwrap();
        let err = s.get("alice", "db_pass").await.unwrap_err();
        assert_eq!(err.code_str(), "not_found");
    }

    #[tokio::test]
    async fn namespaces_do_not_leak_across_users() {
        let s = store();
        s.set("alice", "shared_key", "alice_value").await.unwrap();
        let err = s.get("bob", "shared_key").await.unwrap_err();
        assert_eq!(err.code_str(), "not_found");
    }

    #[tokio::test]
    async fn add_user_is_unique() {
        let s = store();
        s.add_user("bob", "pw").await.unwrap();
        let err = s.add_user("bob", "pw2").await.unwrap_err();
        assert_eq!(err.code_str(), "already_exists");
        // first password survives the failed re-registration
        assert_eq!(s.get_password("bob").await.unwrap(), "pw");
    }

    #[tokio::test]
    async fn names_exclude_reserved_entries() {
        let s = store();
        s.add_user("alice", "pw").await.unwrap();
        s.set("alice", "db_pass", "hunter2").await.unwrap();
        s.set("alice", "alice", "self-named").await.unwrap();
        let names = s.get_all_names("alice").await.unwrap();
        assert_eq!(names, vec!["db_pass".to_string()]);
    }

    #[tokio::test]
    async fn token_bindings_are_unique() {
        let s = store();
        s.add_token("t1", "alice").await.unwrap();
        let err = s.add_token("t1", "bob").await.unwrap_err();
        assert_eq!(err.code_str(), "already_exists");
        assert_eq!(s.get_username("t1").await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let s = store();
        let err = s.get_username("never-issued").await.unwrap_err();
        assert_eq!(err.code_str(), "not_found");
    }

    /// Backend double that fails every call with a fixed error kind.
    struct FailingIndex(fn() -> IndexError);

    #[async_trait::async_trait]
    impl IndexApi for FailingIndex {
        async fn get(&self, _: &IndexRef, _: &str) -> Result<String, IndexError> {
            Err((self.0)())
        }
        async fn set(&self, _: &IndexRef, _: &str, _: &str, _: bool) -> Result<(), IndexError> {
            Err((self.0)())
        }
        async fn delete(&self, _: &IndexRef, _: &str) -> Result<(), IndexError> {
            Err((self.0)())
        }
        async fn entries(
            &self,
            _: &IndexRef,
        ) -> Result<std::collections::HashMap<String, String>, IndexError> {
            Err((self.0)())
        }
    }

    fn failing_store(err: fn() -> IndexError) -> SecretStore {
        SecretStore::new(Arc::new(FailingIndex(err)))
    }

    #[tokio::test]
    async fn backend_outage_surfaces_as_unavailable() {
        let s = failing_store(|| IndexError::Unavailable("dial tcp".into()));
        assert_eq!(s.get("alice", "k").await.unwrap_err().code_str(), "unavailable");
        assert_eq!(s.add_user("alice", "pw").await.unwrap_err().code_str(), "unavailable");
        assert_eq!(s.get_username("t1").await.unwrap_err().code_str(), "unavailable");
    }

    #[tokio::test]
    async fn unrecognized_backend_faults_become_unknown() {
        let s = failing_store(|| IndexError::Unknown("wire corruption".into()));
        let err = s.get("alice", "k").await.unwrap_err();
        assert_eq!(err.code_str(), "unknown");
        // the backend detail is preserved in the message, not swallowed
        assert!(err.message().contains("wire corruption"));
    }

    #[tokio::test]
    async fn rejected_index_reference_becomes_unknown() {
        let s = failing_store(|| IndexError::IndexNotFound);
        let err = s.get_all_names("alice").await.unwrap_err();
        assert_eq!(err.code_str(), "unknown");
    }
}
