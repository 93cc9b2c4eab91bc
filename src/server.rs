//!
//! keyward HTTP server
//! -------------------
//! Axum-based HTTP API for the secret store.
//!
//! Responsibilities:
//! - Auth-context middleware: lift the `token` request header into an
//!   [`AuthContext`] extension before handler dispatch.
//! - Register/auth endpoints that echo the issued token back both as a
//!   response header and as a response body field (both deployment forms are
//!   supported by clients).
//! - Secret data endpoints delegating to the session layer.
//! - The single taxonomy-to-status mapping lives in `error.rs`; this module
//!   only applies it.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::KeeperError;
use crate::index::{IndexApi, MemoryIndex, RemoteIndex};
use crate::session::{AuthContext, RegisterError, SessionUseCase};
use crate::store::SecretStore;

/// Metadata key carrying the session token, on requests and responses alike.
pub const TOKEN_HEADER: &str = "token";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub logic: Arc<SessionUseCase>,
}

/// Start the keyward HTTP server from a resolved configuration.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let index: Arc<dyn IndexApi> = if cfg.uses_memory_index() {
        info!("using in-process index backend (memory:)");
        Arc::new(MemoryIndex::new())
    } else {
        info!("using remote index backend at {}", cfg.index_uri);
        Arc::new(RemoteIndex::connect(&cfg.index_uri, cfg.request_timeout)?)
    };

    let logic = Arc::new(SessionUseCase::new(SecretStore::new(index)));
    let router = app(logic);

    info!("Starting server on {}", cfg.addr);
    let listener = tokio::net::TcpListener::bind(&cfg.addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Build the router. Split out from [`run`] so tests can mount the app on an
/// ephemeral listener.
pub fn app(logic: Arc<SessionUseCase>) -> Router {
    let state = AppState { logic };
    Router::new()
        .route("/", get(|| async { "keyward ok" }))
        .route("/register", post(register))
        .route("/auth", post(auth))
        .route("/secret/get", post(get_secret))
        .route("/secret/set", post(set_secret))
        .route("/secret/delete", post(delete_secret))
        .route("/secrets", get(get_all_names))
        .layer(middleware::from_fn(auth_context))
        .with_state(state)
}

/// Middleware stage: derive the per-call [`AuthContext`] from call metadata
/// so handlers never reach into ambient headers themselves.
async fn auth_context(mut req: Request, next: Next) -> Response {
    let ctx = match req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
    {
        Some(token) => AuthContext::with_token(token),
        None => AuthContext::anonymous(),
    };
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct KeyPayload {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SetPayload {
    key: String,
    value: String,
}

fn token_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // tokens arrive as header values, so they round-trip as header values
    if let Ok(v) = HeaderValue::from_str(token) {
        headers.insert(TOKEN_HEADER, v);
    }
    headers
}

fn ok_body(extra: serde_json::Value) -> Json<serde_json::Value> {
    let mut body = json!({"status": "ok"});
    if let (Some(dst), Some(src)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in src {
            dst.insert(k.clone(), v.clone());
        }
    }
    Json(body)
}

fn error_response(err: &KeeperError) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        HeaderMap::new(),
        Json(json!({"status": "error", "error": err.code_str()})),
    )
}

async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CredentialsPayload>,
) -> impl IntoResponse {
    match state.logic.register(&ctx, &payload.username, &payload.password).await {
        Ok(token) => (
            StatusCode::OK,
            token_headers(&token),
            ok_body(json!({ "token": token })),
        ),
        Err(RegisterError { token, error }) => {
            // the token binding made this call is not rolled back, so a
            // failed registration may still hand the caller a session
            let headers = token.as_deref().map(token_headers).unwrap_or_default();
            let (status, _, body) = error_response(&error);
            tracing::warn!(user = %payload.username, error = %error, "register failed");
            (status, headers, body)
        }
    }
}

async fn auth(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CredentialsPayload>,
) -> impl IntoResponse {
    match state.logic.auth(&ctx, &payload.username, &payload.password).await {
        Ok(token) => (
            StatusCode::OK,
            token_headers(&token),
            ok_body(json!({ "token": token })),
        ),
        Err(e) => {
            tracing::warn!(user = %payload.username, error = %e, "auth failed");
            error_response(&e)
        }
    }
}

async fn get_secret(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<KeyPayload>,
) -> impl IntoResponse {
    match state.logic.get(&ctx, &payload.key).await {
        Ok(value) => (
            StatusCode::OK,
            HeaderMap::new(),
            ok_body(json!({ "value": value })),
        ),
        Err(e) => error_response(&e),
    }
}

async fn set_secret(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<SetPayload>,
) -> impl IntoResponse {
    match state.logic.set(&ctx, &payload.key, &payload.value).await {
        Ok(()) => (StatusCode::OK, HeaderMap::new(), ok_body(json!({}))),
        Err(e) => error_response(&e),
    }
}

async fn delete_secret(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<KeyPayload>,
) -> impl IntoResponse {
    match state.logic.delete(&ctx, &payload.key).await {
        Ok(()) => (StatusCode::OK, HeaderMap::new(), ok_body(json!({}))),
        Err(e) => error_response(&e),
    }
}

async fn get_all_names(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> impl IntoResponse {
    match state.logic.get_all_names(&ctx).await {
        Ok(names) => (
            StatusCode::OK,
            HeaderMap::new(),
            ok_body(json!({ "names": names })),
        ),
        Err(e) => error_response(&e),
    }
}
