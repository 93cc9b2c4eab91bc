//! Session and authorization logic.
//!
//! There is no persistent session object: each call re-derives its state from
//! the token carried in request metadata plus durable token storage. The
//! [`AuthContext`] is built by the transport layer before dispatch and
//! threaded explicitly through every operation.
//!
//! Token issuance is deliberately decoupled from validation: register/auth
//! tolerate an absent token and mint one, while data operations require an
//! existing valid session and never mint implicitly.

use uuid::Uuid;

use crate::error::{KeeperError, KeeperResult};
use crate::store::SecretStore;

/// Per-call authorization state, populated from call metadata by the
/// transport middleware before handler dispatch.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token<S: Into<String>>(token: S) -> Self {
        Self { token: Some(token.into()) }
    }
}

/// Registration failure that may still carry a usable session token: the
/// token binding made earlier in the call is not rolled back when user
/// creation fails, so callers get "you have a session but registration
/// didn't happen".
#[derive(Debug)]
pub struct RegisterError {
    pub token: Option<String>,
    pub error: KeeperError,
}

pub struct SessionUseCase {
    store: SecretStore,
}

impl SessionUseCase {
    pub fn new(store: SecretStore) -> Self {
        Self { store }
    }

    /// Use the carried token verbatim when present (validation is a separate
    /// step), otherwise mint a fresh one.
    fn get_or_create_token(ctx: &AuthContext) -> (bool, String) {
        match &ctx.token {
            Some(t) => (true, t.clone()),
            None => (false, mint_token()),
        }
    }

    /// Register a new user. A newly minted token is bound to the username
    /// before the user record is created; on a duplicate username the binding
    /// stays in place and the error still reports the session token.
    pub async fn register(
        &self,
        ctx: &AuthContext,
        username: &str,
        password: &str,
    ) -> Result<String, RegisterError> {
        let (existed, token) = Self::get_or_create_token(ctx);
        if !existed {
            if let Err(e) = self.bind_token(&token, username).await {
                return Err(RegisterError { token: Some(token), error: e.in_op("bind_token") });
            }
        }

        if let Err(e) = self.store.add_user(username, password).await {
            return Err(RegisterError { token: Some(token), error: e });
        }

        Ok(token)
    }

    /// Authenticate. Resolves or mints a token, binds it if newly minted,
    /// requires it to validate, then compares the stored password
    /// byte-for-byte. An unknown username and a wrong password are
    /// indistinguishable by design.
    pub async fn auth(&self, ctx: &AuthContext, username: &str, password: &str) -> KeeperResult<String> {
        let (existed, token) = Self::get_or_create_token(ctx);
        if !existed {
            self.bind_token(&token, username)
                .await
                .map_err(|e| e.in_op("bind_token"))?;
        }

        if !self.validate_token(&token).await? {
            return Err(KeeperError::invalid_token("token does not resolve to a user"));
        }

        let stored = match self.store.get_password(username).await {
            Ok(p) => p,
            // hide whether the account exists
            Err(KeeperError::NotFound { .. }) => {
                return Err(KeeperError::invalid_password("wrong password or username"))
            }
            Err(e) => return Err(e.in_op("get_password")),
        };

        if stored != password {
            return Err(KeeperError::invalid_password("wrong password or username"));
        }

        Ok(token)
    }

    /// Resolve the acting user for an already-authenticated call. No token in
    /// the metadata means no session; this path never mints.
    pub async fn username_from_context(&self, ctx: &AuthContext) -> KeeperResult<String> {
        let Some(token) = &ctx.token else {
            return Err(KeeperError::invalid_token("no token in call metadata"));
        };
        match self.store.get_username(token).await {
            Ok(username) => Ok(username),
            Err(KeeperError::NotFound { .. }) => {
                Err(KeeperError::invalid_token("token does not resolve to a user"))
            }
            Err(e) => Err(e.in_op("get_username")),
        }
    }

    pub async fn get(&self, ctx: &AuthContext, key: &str) -> KeeperResult<String> {
        let username = self.username_from_context(ctx).await?;
        self.store.get(&username, key).await
    }

    pub async fn set(&self, ctx: &AuthContext, key: &str, value: &str) -> KeeperResult<()> {
        let username = self.username_from_context(ctx).await?;
        self.store.set(&username, key, value).await
    }

    pub async fn delete(&self, ctx: &AuthContext, key: &str) -> KeeperResult<()> {
        let username = self.username_from_context(ctx).await?;
        self.store.delete(&username, key).await
    }

    pub async fn get_all_names(&self, ctx: &AuthContext) -> KeeperResult<Vec<String>> {
        let username = self.username_from_context(ctx).await?;
        self.store.get_all_names(&username).await
    }

    /// Persist the token -> username binding. A colliding token reports
    /// AlreadyExists from storage; that is informational here, since the
    /// existing binding may already be the right one for this session
    /// attempt, and validation runs separately.
    async fn bind_token(&self, token: &str, username: &str) -> KeeperResult<()> {
        match self.store.add_token(token, username).await {
            Ok(()) => Ok(()),
            Err(KeeperError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// A token validates when it resolves to some username in storage.
    async fn validate_token(&self, token: &str) -> KeeperResult<bool> {
        match self.store.get_username(token).await {
            Ok(_) => Ok(true),
            Err(KeeperError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn mint_token() -> String {
    Uuid::new_v4().to_string()
}
