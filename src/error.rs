//! Unified error taxonomy and protocol mapping helpers.
//! Every backend fault is normalized into one of these kinds before it crosses
//! a layer boundary; the HTTP mapping below is the only place that knows how
//! the taxonomy translates to protocol status codes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeeperError {
    NotFound { message: String },
    AlreadyExists { message: String },
    Unavailable { message: String },
    InvalidToken { message: String },
    InvalidPassword { message: String },
    Unknown { message: String },
}

impl KeeperError {
    pub fn message(&self) -> &str {
        match self {
            KeeperError::NotFound { message }
            | KeeperError::AlreadyExists { message }
            | KeeperError::Unavailable { message }
            | KeeperError::InvalidToken { message }
            | KeeperError::InvalidPassword { message }
            | KeeperError::Unknown { message } => message.as_str(),
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self { KeeperError::NotFound { message: msg.into() } }
    pub fn already_exists<S: Into<String>>(msg: S) -> Self { KeeperError::AlreadyExists { message: msg.into() } }
    pub fn unavailable<S: Into<String>>(msg: S) -> Self { KeeperError::Unavailable { message: msg.into() } }
    pub fn invalid_token<S: Into<String>>(msg: S) -> Self { KeeperError::InvalidToken { message: msg.into() } }
    pub fn invalid_password<S: Into<String>>(msg: S) -> Self { KeeperError::InvalidPassword { message: msg.into() } }
    pub fn unknown<S: Into<String>>(msg: S) -> Self { KeeperError::Unknown { message: msg.into() } }

    /// Short stable code for response bodies and logs.
    pub fn code_str(&self) -> &'static str {
        match self {
            KeeperError::NotFound { .. } => "not_found",
            KeeperError::AlreadyExists { .. } => "already_exists",
            KeeperError::Unavailable { .. } => "unavailable",
            KeeperError::InvalidToken { .. } => "invalid_token",
            KeeperError::InvalidPassword { .. } => "invalid_password",
            KeeperError::Unknown { .. } => "unknown",
        }
    }

    /// Map to HTTP status code.
    ///
    /// Bad credentials, bad tokens and missing resources all collapse into 404
    /// so the protocol never reveals whether an account or secret exists.
    pub fn http_status(&self) -> u16 {
        match self {
            KeeperError::NotFound { .. } => 404,
            KeeperError::AlreadyExists { .. } => 409,
            KeeperError::InvalidToken { .. } => 404,
            KeeperError::InvalidPassword { .. } => 404,
            KeeperError::Unavailable { .. } => 503,
            KeeperError::Unknown { .. } => 500,
        }
    }

    /// Wrap the message with an operation label, keeping the kind.
    pub fn in_op(self, op: &str) -> Self {
        let msg = format!("{}: {}", op, self.message());
        match self {
            KeeperError::NotFound { .. } => KeeperError::NotFound { message: msg },
            KeeperError::AlreadyExists { .. } => KeeperError::AlreadyExists { message: msg },
            KeeperError::Unavailable { .. } => KeeperError::Unavailable { message: msg },
            KeeperError::InvalidToken { .. } => KeeperError::InvalidToken { message: msg },
            KeeperError::InvalidPassword { .. } => KeeperError::InvalidPassword { message: msg },
            KeeperError::Unknown { .. } => KeeperError::Unknown { message: msg },
        }
    }
}

impl Display for KeeperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for KeeperError {}

pub type KeeperResult<T> = Result<T, KeeperError>;
