//! Messages as handed to the scoring pipeline by a message source

use serde::{Deserialize, Serialize};

/// Subject used when a message carries no `Subject` header
pub const NO_SUBJECT: &str = "No Subject";

/// Sender used when a message carries no `From` header
pub const UNKNOWN_SENDER: &str = "Unknown";

/// One retrieved message. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw `From` header value, not parsed into name/address
    pub sender: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Plain-text body; empty when the body could not be decoded
    #[serde(default)]
    pub content: String,
}

fn default_subject() -> String {
    NO_SUBJECT.to_string()
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        subject: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.unwrap_or_else(default_subject),
            content: content.into(),
        }
    }
}
