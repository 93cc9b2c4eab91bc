//! Client-side session facade over the HTTP API.
//!
//! Register/auth capture the issued token from the response (header or body
//! field, whichever the deployment provides) and every subsequent call
//! carries it in the `token` request header. A successful auth without a
//! token anywhere in the response is a fatal client-side condition.

use reqwest::header::HeaderValue;
use reqwest::Url;
use serde_json::json;

use crate::server::TOKEN_HEADER;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("service unavailable")]
    Unavailable,
    #[error("wrong password or username")]
    InvalidCredentials,
    #[error("username already exists")]
    UsernameExists,
    #[error("secret not found")]
    SecretNotFound,
    #[error("no session: authenticate first")]
    NotAuthenticated,
    #[error("server issued no token after successful auth")]
    MissingToken,
    #[error("request failed: {0}")]
    Other(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Clone)]
pub struct HttpSession {
    base: Url,
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpSession {
    pub fn connect(base: &str) -> ClientResult<Self> {
        let base = Url::parse(base).map_err(|e| ClientError::Other(e.to_string()))?;
        let client = reqwest::Client::new();
        Ok(Self { base, client, token: None })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Register a new account and adopt the issued session token.
    pub async fn register(&mut self, username: &str, password: &str) -> ClientResult<()> {
        self.credentials_call("/register", username, password).await
    }

    /// Authenticate an existing account and adopt the issued session token.
    pub async fn auth(&mut self, username: &str, password: &str) -> ClientResult<()> {
        self.credentials_call("/auth", username, password).await
    }

    pub async fn get(&self, key: &str) -> ClientResult<String> {
        let body = self.post_authed("/secret/get", json!({ "key": key })).await?;
        body.get("value")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::Other("missing value in response".into()))
    }

    pub async fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.post_authed("/secret/set", json!({ "key": key, "value": value })).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> ClientResult<()> {
        self.post_authed("/secret/delete", json!({ "key": key })).await?;
        Ok(())
    }

    pub async fn names(&self) -> ClientResult<Vec<String>> {
        let token = self.require_token()?;
        let url = self.url("/secrets")?;
        let resp = self
            .client
            .get(url)
            .header(TOKEN_HEADER, token)
            .send()
            .await
            .map_err(transport_error)?;
        let body = Self::check(resp).await?;
        Ok(body
            .get("names")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default())
    }

    async fn credentials_call(&mut self, path: &str, username: &str, password: &str) -> ClientResult<()> {
        let url = self.url(path)?;
        let mut req = self
            .client
            .post(url)
            .json(&json!({ "username": username, "password": password }));
        // a session resumed mid-flow keeps riding its existing token
        if let Some(t) = &self.token {
            req = req.header(TOKEN_HEADER, t);
        }
        let resp = req.send().await.map_err(transport_error)?;

        let status = resp.status();
        let header_token = resp
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .map(|s| s.to_string());
        let body: serde_json::Value = resp.json().await.unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            return Err(match status.as_u16() {
                404 => ClientError::InvalidCredentials,
                409 => ClientError::UsernameExists,
                503 => ClientError::Unavailable,
                s => ClientError::Other(format!("HTTP {}", s)),
            });
        }

        let token = header_token.or_else(|| {
            body.get("token").and_then(|v| v.as_str()).map(|s| s.to_string())
        });
        match token {
            Some(t) => {
                self.token = Some(t);
                Ok(())
            }
            None => Err(ClientError::MissingToken),
        }
    }

    async fn post_authed(&self, path: &str, payload: serde_json::Value) -> ClientResult<serde_json::Value> {
        let token = self.require_token()?;
        let url = self.url(path)?;
        let resp = self
            .client
            .post(url)
            .header(TOKEN_HEADER, token)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp).await
    }

    fn require_token(&self) -> ClientResult<&str> {
        self.token.as_deref().ok_or(ClientError::NotAuthenticated)
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base.join(path).map_err(|e| ClientError::Other(e.to_string()))
    }

    async fn check(resp: reqwest::Response) -> ClientResult<serde_json::Value> {
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or_else(|_| json!({}));
        if status.is_success() {
            return Ok(body);
        }
        Err(match status.as_u16() {
            404 => ClientError::SecretNotFound,
            503 => ClientError::Unavailable,
            s => {
                let code = body.get("error").and_then(|v| v.as_str()).unwrap_or("");
                ClientError::Other(format!("HTTP {}: {}", s, code))
            }
        })
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::Unavailable
    } else {
        ClientError::Other(e.to_string())
    }
}
