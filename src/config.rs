//! Process configuration.
//!
//! Built once at startup from environment variables overridden by CLI flags,
//! then passed by value to the constructors that need it. No global mutable
//! configuration state.

use std::env;
use std::time::Duration;

/// URI scheme selecting the in-process index backend instead of a remote one.
pub const MEMORY_URI: &str = "memory:";

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_INDEX_URI: &str = MEMORY_URI;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub addr: String,
    /// Index service base URL, or `memory:` for standalone mode.
    pub index_uri: String,
    /// Deadline for each index service round-trip.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            index_uri: DEFAULT_INDEX_URI.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_u64_env(name: &str) -> Option<u64> {
    match env::var(name) {
        Ok(val) => val.parse::<u64>().ok(),
        Err(_) => None,
    }
}

impl Config {
    /// Resolve configuration: defaults, then environment, then CLI flags.
    pub fn from_env_and_args(args: &[String]) -> Self {
        let env_addr = env::var("KEYWARD_ADDR").ok();
        let env_index = env::var("KEYWARD_INDEX_URI").ok();
        let env_timeout = parse_u64_env("KEYWARD_TIMEOUT_MS");

        let arg_addr = parse_string_arg(args, "--addr");
        let arg_index = parse_string_arg(args, "--index-uri");
        let arg_timeout = parse_string_arg(args, "--timeout-ms").and_then(|s| s.parse::<u64>().ok());

        Self {
            addr: arg_addr.or(env_addr).unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            index_uri: arg_index.or(env_index).unwrap_or_else(|| DEFAULT_INDEX_URI.to_string()),
            request_timeout: Duration::from_millis(
                arg_timeout.or(env_timeout).unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
        }
    }

    pub fn uses_memory_index(&self) -> bool {
        self.index_uri == MEMORY_URI
    }
}
