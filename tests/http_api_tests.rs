//! End-to-end tests: the axum app mounted on an ephemeral port over an
//! in-process index backend, driven through the client-side session facade.

use std::sync::Arc;

use keyward::client::{ClientError, HttpSession};
use keyward::index::MemoryIndex;
use keyward::server::{app, TOKEN_HEADER};
use keyward::session::SessionUseCase;
use keyward::store::SecretStore;

async fn spawn_server() -> String {
    let logic = Arc::new(SessionUseCase::new(SecretStore::new(Arc::new(MemoryIndex::new()))));
    let router = app(logic);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn register_and_work_with_secrets() {
    let base = spawn_server().await;
    let mut session = HttpSession::connect(&base).unwrap();

    session.register("alice", "secret123").await.unwrap();
    assert!(session.token().is_some());

    session.set("db_pass", "hunter2").await.unwrap();
    assert_eq!(session.get("db_pass").await.unwrap(), "hunter2");
    assert_eq!(session.names().await.unwrap(), vec!["db_pass".to_string()]);

    session.delete("db_pass").await.unwrap();
    let err = session.get("db_pass").await.unwrap_err();
    assert!(matches!(err, ClientError::SecretNotFound));
}

#[tokio::test]
async fn duplicate_register_conflicts_and_keeps_password() {
    let base = spawn_server().await;

    let mut first = HttpSession::connect(&base).unwrap();
    first.register("bob", "pw").await.unwrap();

    let mut second = HttpSession::connect(&base).unwrap();
    let err = second.register("bob", "pw2").await.unwrap_err();
    assert!(matches!(err, ClientError::UsernameExists));

    // original password still validates, the rejected one does not
    let mut back = HttpSession::connect(&base).unwrap();
    back.auth("bob", "pw").await.unwrap();
    let mut bad = HttpSession::connect(&base).unwrap();
    let err = bad.auth("bob", "pw2").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidCredentials));
}

#[tokio::test]
async fn concurrent_register_race_loser_gets_already_exists() {
    let base = spawn_server().await;
    let mut first = HttpSession::connect(&base).unwrap();
    let mut second = HttpSession::connect(&base).unwrap();

    // both racers hit the storage uniqueness constraint; exactly one wins
    // and the loser sees the conflict, not a generic failure
    let (a, b) = tokio::join!(
        first.register("carol", "pw-a"),
        second.register("carol", "pw-b"),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.into_iter().find(|r| r.is_err()).unwrap().unwrap_err();
    assert!(matches!(loser, ClientError::UsernameExists));

    // exactly one of the two passwords stuck
    let mut back_a = HttpSession::connect(&base).unwrap();
    let ok_a = back_a.auth("carol", "pw-a").await.is_ok();
    let mut back_b = HttpSession::connect(&base).unwrap();
    let ok_b = back_b.auth("carol", "pw-b").await.is_ok();
    assert!(ok_a ^ ok_b);
}

#[tokio::test]
async fn auth_failures_are_indistinguishable() {
    let base = spawn_server().await;
    let mut session = HttpSession::connect(&base).unwrap();
    session.register("alice", "secret123").await.unwrap();

    let mut wrong = HttpSession::connect(&base).unwrap();
    let e1 = wrong.auth("alice", "nope").await.unwrap_err();
    let mut ghost = HttpSession::connect(&base).unwrap();
    let e2 = ghost.auth("nobody", "anything").await.unwrap_err();
    assert!(matches!(e1, ClientError::InvalidCredentials));
    assert!(matches!(e2, ClientError::InvalidCredentials));
}

#[tokio::test]
async fn overwrite_is_last_write_wins() {
    let base = spawn_server().await;
    let mut session = HttpSession::connect(&base).unwrap();
    session.register("alice", "secret123").await.unwrap();

    session.set("k", "v1").await.unwrap();
    session.set("k", "v2").await.unwrap();
    assert_eq!(session.get("k").await.unwrap(), "v2");
}

#[tokio::test]
async fn auth_resumes_across_facades() {
    let base = spawn_server().await;
    let mut session = HttpSession::connect(&base).unwrap();
    session.register("alice", "secret123").await.unwrap();
    session.set("db_pass", "hunter2").await.unwrap();

    // fresh facade, fresh token, same account and data
    let mut later = HttpSession::connect(&base).unwrap();
    later.auth("alice", "secret123").await.unwrap();
    assert_eq!(later.get("db_pass").await.unwrap(), "hunter2");
}

#[tokio::test]
async fn token_is_echoed_in_header_and_body() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/register", base))
        .json(&serde_json::json!({"username": "alice", "password": "secret123"}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let header_token = resp
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .expect("token header missing");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["token"], header_token.as_str());
}

#[tokio::test]
async fn failed_register_still_carries_a_session_token() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    async fn register_raw(
        client: &reqwest::Client,
        base: &str,
        u: &str,
        p: &str,
    ) -> reqwest::Response {
        client
            .post(format!("{}/register", base))
            .json(&serde_json::json!({"username": u, "password": p}))
            .send()
            .await
            .unwrap()
    }

    assert!(register_raw(&client, &base, "bob", "pw").await.status().is_success());

    let resp = register_raw(&client, &base, "bob", "pw2").await;
    assert_eq!(resp.status().as_u16(), 409);
    // the binding made before user creation failed is not rolled back
    assert!(resp.headers().get(TOKEN_HEADER).is_some());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "already_exists");
}

#[tokio::test]
async fn unissued_token_is_rejected_on_data_calls() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/secret/get", base))
        .header(TOKEN_HEADER, "never-issued")
        .json(&serde_json::json!({"key": "k"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn missing_token_is_rejected_on_data_calls() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/secrets", base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // the facade refuses to even issue the call without a session
    let session = HttpSession::connect(&base).unwrap();
    let err = session.names().await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
}
