//! Domain-specific error types for inbox-trust

use thiserror::Error;

/// Main error type for the trust scoring pipeline
#[derive(Error, Debug)]
pub enum TrustError {
    /// The mailbox could not be reached or authenticated. Aborts the run.
    #[error("Message source unavailable: {message}")]
    SourceUnavailable { message: String },

    /// A single message body could not be decoded. Never aborts a run.
    #[error("Decode failure: {message}")]
    Decode { message: String },

    #[error("Classifier error: {message}")]
    Classifier { message: String },

    #[error("Tokenizer error: {message}")]
    Tokenizer { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TrustError {
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        TrustError::SourceUnavailable {
            message: message.into(),
        }
    }

    pub fn classifier(message: impl Into<String>) -> Self {
        TrustError::Classifier {
            message: message.into(),
        }
    }

    pub fn tokenizer(message: impl Into<String>) -> Self {
        TrustError::Tokenizer {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        TrustError::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TrustError::Validation {
            message: message.into(),
        }
    }

    /// Fatal errors abort the whole run; the rest only affect one message.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrustError::SourceUnavailable { .. }
                | TrustError::Config { .. }
                | TrustError::Validation { .. }
                | TrustError::Internal { .. }
        )
    }
}

impl From<anyhow::Error> for TrustError {
    fn from(err: anyhow::Error) -> Self {
        TrustError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        TrustError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TrustError {
    fn from(err: toml::de::Error) -> Self {
        TrustError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}

impl From<toml::ser::Error> for TrustError {
    fn from(err: toml::ser::Error) -> Self {
        TrustError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for TrustError {
    fn from(err: reqwest::Error) -> Self {
        TrustError::SourceUnavailable {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

impl From<std::io::Error> for TrustError {
    fn from(err: std::io::Error) -> Self {
        TrustError::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<candle_core::Error> for TrustError {
    fn from(err: candle_core::Error) -> Self {
        TrustError::Classifier {
            message: format!("Model inference failed: {}", err),
        }
    }
}

/// Result type alias for inbox-trust operations
pub type Result<T> = std::result::Result<T, TrustError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_and_config_errors_are_fatal() {
        assert!(TrustError::source_unavailable("no token").is_fatal());
        assert!(TrustError::config("bad weights").is_fatal());
    }

    #[test]
    fn per_message_errors_are_not_fatal() {
        assert!(!TrustError::classifier("boom").is_fatal());
        assert!(
            !TrustError::Timeout {
                operation: "classify".into(),
                timeout_ms: 10
            }
            .is_fatal()
        );
        assert!(!TrustError::tokenizer("bad ids").is_fatal());
    }

    #[test]
    fn timeout_message_names_operation() {
        let err = TrustError::Timeout {
            operation: "classify message 3".into(),
            timeout_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "Timeout error: classify message 3 timed out after 250ms"
        );
    }
}
