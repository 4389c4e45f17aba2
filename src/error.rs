//! Error types for taskfleet
//!
//! This module provides the error handling surface for the library:
//! - A single [`Error`] enum covering configuration, network, I/O, and
//!   platform collaborator failures
//! - A [`Result`] alias used throughout the crate
//!
//! Expected fetch failures are deliberately *not* represented here: a
//! download that exhausts its retries is reported through
//! [`FetchResult`](crate::types::FetchResult) with a classified cause, never
//! raised as an error across the component boundary.

use thiserror::Error;

use crate::session::LoginStatus;

/// Result type alias for taskfleet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for taskfleet
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_tasks")
        key: Option<String>,
    },

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or unsupported URL
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL that failed to parse
        url: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Platform login attempt reported a non-success status
    ///
    /// The credential collaborator returns a fixed status taxonomy; any
    /// non-success code is a hard failure of that attempt and is never
    /// retried by the core.
    #[error("login failed with status {} ({:?}): {}", .status.code(), .status, .message)]
    Login {
        /// The collaborator status code classification
        status: LoginStatus,
        /// The message reported by the collaborator
        message: String,
    },

    /// Scanning a platform's pending tasks failed
    #[error("scan error: {0}")]
    Scan(String),

    /// Executing a dispatched task failed
    #[error("task error: {0}")]
    Task(String),

    /// Platform task storage query failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Construct a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_key() {
        let err = Error::config("scan_interval", "must be non-zero");
        match &err {
            Error::Config { message, key } => {
                assert_eq!(message, "must be non-zero");
                assert_eq!(key.as_deref(), Some("scan_interval"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "configuration error: must be non-zero");
    }

    #[test]
    fn login_error_includes_code_and_message() {
        let err = Error::Login {
            status: LoginStatus::Timeout,
            message: "login page never loaded".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("601"), "expected status code in message: {text}");
        assert!(text.contains("login page never loaded"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
