//! Unified client error model.
//! Every session and content operation reports failures through `AppError`, which
//! is both written into the shared session state (as its message) and returned to
//! the direct caller so forms can render inline errors.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Input rejected locally, before any network call.
    Validation { code: String, message: String },
    /// Network unreachable, connection reset, transport timeout.
    Transport { code: String, message: String },
    /// Backend answered with a non-success status.
    Rejected { status: u16, code: String, message: String },
    /// Backend answered 2xx but the body did not match the expected schema.
    Schema { code: String, message: String },
    /// Signup created the identity but the profile write failed.
    ProfileRegistration { user_id: String, code: String, message: String },
    /// A newer operation started before this one completed; its result was discarded.
    Superseded { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Rejected { code, .. }
            | AppError::Schema { code, .. }
            | AppError::ProfileRegistration { code, .. }
            | AppError::Superseded { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Rejected { message, .. }
            | AppError::Schema { message, .. }
            | AppError::ProfileRegistration { message, .. }
            | AppError::Superseded { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn transport<S: Into<String>>(code: S, msg: S) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn rejected<S: Into<String>>(status: u16, code: S, msg: S) -> Self { AppError::Rejected { status, code: code.into(), message: msg.into() } }
    pub fn schema<S: Into<String>>(code: S, msg: S) -> Self { AppError::Schema { code: code.into(), message: msg.into() } }
    pub fn superseded<S: Into<String>>(code: S, msg: S) -> Self { AppError::Superseded { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn profile_registration<S: Into<String>>(user_id: S, msg: S) -> Self {
        AppError::ProfileRegistration { user_id: user_id.into(), code: "profile_registration_failed".into(), message: msg.into() }
    }

    /// HTTP status the backend answered with, when the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures the user can fix by editing the form (no request was sent).
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect_failed"
        } else if err.is_decode() {
            // body arrived but could not be read as JSON
            return AppError::Schema { code: "malformed_body".into(), message: err.to_string() };
        } else {
            "transport_error"
        };
        AppError::Transport { code: code.into(), message: err.to_string() }
    }
}

impl From<crate::identity::ValidationError> for AppError {
    fn from(err: crate::identity::ValidationError) -> Self {
        AppError::Validation { code: err.code().into(), message: err.to_string() }
    }
}
