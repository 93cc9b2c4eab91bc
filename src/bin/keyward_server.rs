//!
//! keyward server binary
//! ---------------------
//! Command-line entry point for the secret store HTTP API. Supports
//! configuration via CLI flags and environment variables.

use anyhow::Result;
use std::env;

use keyward::config::Config;

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("keyward server\n\nUSAGE:\n  keyward_server [--addr HOST:PORT] [--index-uri URI] [--timeout-ms N]\n\nOPTIONS:\n  --addr HOST:PORT    HTTP API bind address (env: KEYWARD_ADDR, default 127.0.0.1:8080)\n  --index-uri URI     Index service base URL, or 'memory:' for standalone mode\n                      (env: KEYWARD_INDEX_URI, default memory:)\n  --timeout-ms N      Per-call deadline for index service round-trips\n                      (env: KEYWARD_TIMEOUT_MS, default 5000)\n");
        return Ok(());
    }

    let cfg = Config::from_env_and_args(&args);
    println!(
        "keyward starting: addr={}, index_uri={}, timeout_ms={}",
        cfg.addr,
        cfg.index_uri,
        cfg.request_timeout.as_millis()
    );
    tracing::info!(
        "keyward starting: addr={}, index_uri={}, timeout_ms={}",
        cfg.addr,
        cfg.index_uri,
        cfg.request_timeout.as_millis()
    );

    keyward::server::run(cfg).await
}
