//! HTTP client for the index service.
//!
//! The service exposes one POST endpoint per operation under
//! `/index/{name}/...` with a JSON body naming the optional sub-index. Error
//! codes ride in the response body (`{"status":"error","error":"..."}`);
//! transport-level failures (refused connection, deadline hit) surface as
//! `Unavailable` so callers can retry.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use super::{IndexApi, IndexError, IndexRef, IndexResult};

#[derive(Clone)]
pub struct RemoteIndex {
    base: Url,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IndexReply {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    entries: Option<HashMap<String, String>>,
    #[serde(default)]
    error: Option<String>,
}

impl RemoteIndex {
    /// Build a client against the service base URL. `timeout` caps every
    /// round-trip; hitting it reports the backend as unavailable.
    pub fn connect(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    async fn call(&self, index: &IndexRef, op: &str, body: serde_json::Value) -> IndexResult<IndexReply> {
        let url = self
            .base
            .join(&format!("/index/{}/{}", index.name, op))
            .map_err(|e| IndexError::Unknown(e.to_string()))?;
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        let reply: IndexReply = resp.json().await.map_err(transport_error)?;
        if status.is_success() {
            return Ok(reply);
        }
        let code = reply.error.unwrap_or_default();
        Err(match status.as_u16() {
            404 if code == "index_not_found" => IndexError::IndexNotFound,
            404 => IndexError::NotFound,
            409 => IndexError::UniqueViolation,
            s if s >= 500 => IndexError::Unavailable(format!("HTTP {}: {}", s, code)),
            s => IndexError::Unknown(format!("HTTP {}: {}", s, code)),
        })
    }

    fn body(index: &IndexRef, extra: serde_json::Value) -> serde_json::Value {
        let mut v = extra;
        if let Some(sub) = &index.sub {
            v["sub"] = json!(sub);
        }
        v
    }
}

fn transport_error(e: reqwest::Error) -> IndexError {
    if e.is_connect() || e.is_timeout() {
        IndexError::Unavailable(e.to_string())
    } else {
        IndexError::Unknown(e.to_string())
    }
}

#[async_trait::async_trait]
impl IndexApi for RemoteIndex {
    async fn get(&self, index: &IndexRef, key: &str) -> IndexResult<String> {
        let reply = self.call(index, "get", Self::body(index, json!({ "key": key }))).await?;
        reply
            .value
            .ok_or_else(|| IndexError::Unknown("missing value in reply".into()))
    }

    async fn set(&self, index: &IndexRef, key: &str, value: &str, unique: bool) -> IndexResult<()> {
        self.call(
            index,
            "set",
            Self::body(index, json!({ "key": key, "value": value, "unique": unique })),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, index: &IndexRef, key: &str) -> IndexResult<()> {
        self.call(index, "delete", Self::body(index, json!({ "key": key }))).await?;
        Ok(())
    }

    async fn entries(&self, index: &IndexRef) -> IndexResult<HashMap<String, String>> {
        let reply = self.call(index, "entries", Self::body(index, json!({}))).await?;
        Ok(reply.entries.unwrap_or_default())
    }
}
