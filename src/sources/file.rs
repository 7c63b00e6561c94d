use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::MessageSource;
use crate::error::{Result, TrustError};
use crate::message::Message;

/// Messages exported to disk: a JSON array, or one JSON object per line
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSource for FileSource {
    async fn fetch(&self, max_results: usize) -> Result<Vec<Message>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TrustError::source_unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let mut messages = parse_messages(&raw)?;
        messages.truncate(max_results);
        debug!("Read {} messages from {}", messages.len(), self.path.display());
        Ok(messages)
    }

    fn name(&self) -> &str {
        "file"
    }
}

pub fn parse_messages(raw: &str) -> Result<Vec<Message>> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| TrustError::source_unavailable(format!("invalid message array: {}", e)));
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                TrustError::source_unavailable(format!("invalid message on line {}: {}", n + 1, e))
            })
        })
        .collect()
}
