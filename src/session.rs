//! Platform session credentials
//!
//! The browser-automation login flows live outside this crate; what crosses
//! the boundary is a fixed status taxonomy and, on success, a persisted
//! cookie artifact. This module defines both sides of that contract:
//! [`LoginResponse`] with its [`LoginStatus`] codes, and the on-disk
//! [`SessionArtifact`].
//!
//! Any non-success status is a hard failure of that login attempt; the core
//! never retries a login internally.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Status taxonomy reported by the login collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    /// Login succeeded (200)
    Success,
    /// Login flow timed out (601)
    Timeout,
    /// Expected page element was not found (602)
    ElementNotFound,
    /// Credentials could not be extracted from the session (603)
    CredentialExtraction,
    /// The interactive session was closed by the user (604)
    SessionClosed,
    /// Page navigation failed (605)
    Navigation,
    /// Unclassified failure (500)
    Unclassified,
}

impl LoginStatus {
    /// Map a collaborator status code onto the taxonomy
    ///
    /// Unknown codes map to [`LoginStatus::Unclassified`].
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => LoginStatus::Success,
            601 => LoginStatus::Timeout,
            602 => LoginStatus::ElementNotFound,
            603 => LoginStatus::CredentialExtraction,
            604 => LoginStatus::SessionClosed,
            605 => LoginStatus::Navigation,
            _ => LoginStatus::Unclassified,
        }
    }

    /// The numeric code for this status
    pub fn code(&self) -> u16 {
        match self {
            LoginStatus::Success => 200,
            LoginStatus::Timeout => 601,
            LoginStatus::ElementNotFound => 602,
            LoginStatus::CredentialExtraction => 603,
            LoginStatus::SessionClosed => 604,
            LoginStatus::Navigation => 605,
            LoginStatus::Unclassified => 500,
        }
    }

    /// Whether this status represents a successful login
    pub fn is_success(&self) -> bool {
        matches!(self, LoginStatus::Success)
    }
}

/// Raw response envelope from the login collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Collaborator status code (see [`LoginStatus`])
    pub code: u16,
    /// Payload, typically the extracted cookie string or a structured blob
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Human-readable outcome message
    #[serde(default)]
    pub message: String,
}

impl LoginResponse {
    /// Classify the status code
    pub fn status(&self) -> LoginStatus {
        LoginStatus::from_code(self.code)
    }

    /// Convert into a hard success/failure result
    ///
    /// Returns the payload on success; any other code becomes
    /// [`Error::Login`] for the caller to surface.
    pub fn into_result(self) -> Result<Option<serde_json::Value>> {
        let status = self.status();
        if status.is_success() {
            Ok(self.data)
        } else {
            Err(Error::Login {
                status,
                message: self.message,
            })
        }
    }
}

/// Persisted cookie/session artifact
///
/// Saved as a JSON object `{"timestamp": epoch-seconds, "cookies": "..."}`
/// so independently written tooling can read it back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionArtifact {
    /// Epoch seconds when the session was captured
    pub timestamp: i64,
    /// Serialized cookie string for the platform session
    pub cookies: String,
}

impl SessionArtifact {
    /// Capture a new artifact stamped with the current time
    pub fn new(cookies: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            cookies: cookies.into(),
        }
    }

    /// Age of the captured session
    pub fn age(&self) -> chrono::Duration {
        chrono::Duration::seconds((Utc::now().timestamp() - self.timestamp).max(0))
    }

    /// Write the artifact to disk as JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        tracing::debug!(path = %path.display(), "session artifact saved");
        Ok(())
    }

    /// Read an artifact back from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let artifact = serde_json::from_slice(&bytes)?;
        Ok(artifact)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping_round_trips() {
        for code in [200, 601, 602, 603, 604, 605, 500] {
            assert_eq!(LoginStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn unknown_codes_map_to_unclassified() {
        assert_eq!(LoginStatus::from_code(404), LoginStatus::Unclassified);
        assert_eq!(LoginStatus::from_code(0), LoginStatus::Unclassified);
        assert_eq!(LoginStatus::from_code(606), LoginStatus::Unclassified);
    }

    #[test]
    fn success_response_yields_payload() {
        let response = LoginResponse {
            code: 200,
            data: Some(serde_json::json!({"cookies": "sid=abc"})),
            message: "ok".to_string(),
        };
        let data = response.into_result().unwrap().unwrap();
        assert_eq!(data["cookies"], "sid=abc");
    }

    #[test]
    fn non_success_response_is_hard_failure() {
        let response = LoginResponse {
            code: 604,
            data: None,
            message: "window closed".to_string(),
        };
        let err = response.into_result().unwrap_err();
        match err {
            Error::Login { status, message } => {
                assert_eq!(status, LoginStatus::SessionClosed);
                assert_eq!(message, "window closed");
            }
            other => panic!("expected Login error, got {other:?}"),
        }
    }

    #[test]
    fn response_deserializes_with_missing_optional_fields() {
        let response: LoginResponse = serde_json::from_str(r#"{"code": 601}"#).unwrap();
        assert_eq!(response.status(), LoginStatus::Timeout);
        assert!(response.data.is_none());
        assert!(response.message.is_empty());
    }

    #[tokio::test]
    async fn artifact_save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions").join("platform.json");

        let artifact = SessionArtifact::new("sid=abc; token=xyz");
        artifact.save(&path).await.unwrap();

        let loaded = SessionArtifact::load(&path).await.unwrap();
        assert_eq!(loaded, artifact);

        // On-disk shape is the documented JSON object
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw["timestamp"].is_i64());
        assert_eq!(raw["cookies"], "sid=abc; token=xyz");
    }

    #[test]
    fn age_is_non_negative() {
        let artifact = SessionArtifact {
            timestamp: Utc::now().timestamp() + 100, // clock skew
            cookies: String::new(),
        };
        assert_eq!(artifact.age(), chrono::Duration::seconds(0));
    }
}
