//! Message sources: where the pipeline's messages come from.

pub mod file;
pub mod gmail;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, SourceProvider};
use crate::error::{Result, TrustError};
use crate::message::Message;

pub use file::FileSource;
pub use gmail::GmailSource;

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Up to `max_results` messages in source order. Failing to reach the
    /// source at all is `SourceUnavailable`; an unreadable body is not.
    async fn fetch(&self, max_results: usize) -> Result<Vec<Message>>;
    fn name(&self) -> &str;
}

/// In-memory source for single-text runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    messages: Vec<Message>,
}

impl StaticSource {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl MessageSource for StaticSource {
    async fn fetch(&self, max_results: usize) -> Result<Vec<Message>> {
        Ok(self.messages.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Factory: build the configured source
pub fn create_source(config: &Config) -> Result<Arc<dyn MessageSource>> {
    match config.source.provider {
        SourceProvider::Gmail => {
            let token = gmail::resolve_access_token(&config.runtime)?;
            info!("Using Gmail source (user={})", config.source.user_id);
            Ok(Arc::new(GmailSource::new(
                config.source.api_base.clone(),
                config.source.user_id.clone(),
                token,
                config.source.request_timeout_ms,
            )?))
        }
        SourceProvider::File => {
            let path = config.source.path.clone().ok_or_else(|| {
                TrustError::config("source.path is required for the file source")
            })?;
            info!("Using file source ({})", path.display());
            Ok(Arc::new(FileSource::new(path)))
        }
    }
}
