//! Error types for rp-digest
//!
//! The taxonomy follows the failure domains of a report cycle:
//! - `Auth` — token acquisition failed (fatal for the cycle)
//! - `Fetch` — launch or defect query failed after retries
//! - `Delivery` — the chat message could not be sent
//! - `Config` — invalid or missing configuration at startup

use thiserror::Error;

/// Result type alias for rp-digest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rp-digest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "TELEGRAM_TOKEN")
        key: Option<String>,
    },

    /// Token acquisition against the reporting service failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Launch or defect query failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Message delivery to the chat failed
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Configuration error for a missing required environment variable
    pub fn missing_env(key: &str) -> Self {
        Error::Config {
            message: format!("required environment variable {key} is not set"),
            key: Some(key.to_string()),
        }
    }

    /// Configuration error without an associated key
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_carries_the_offending_key() {
        let err = Error::missing_env("TELEGRAM_TOKEN");
        match err {
            Error::Config { ref key, .. } => {
                assert_eq!(key.as_deref(), Some("TELEGRAM_TOKEN"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn display_messages_name_the_failure_domain() {
        assert_eq!(
            Error::Auth("no access_token".into()).to_string(),
            "authentication failed: no access_token"
        );
        assert_eq!(
            Error::Fetch("launch endpoint returned HTTP 500".into()).to_string(),
            "fetch failed: launch endpoint returned HTTP 500"
        );
        assert_eq!(
            Error::Delivery("chat not found".into()).to_string(),
            "delivery failed: chat not found"
        );
    }

    #[test]
    fn serde_json_errors_convert_via_from() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
