//! Orchestration: fetch, then truncate, classify, keyword-score, fuse and
//! aggregate every message, in arrival order.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::ScoringModels;
use crate::config::{Config, FailurePolicy};
use crate::error::{Result, TrustError};
use crate::message::Message;
use crate::scoring::{
    FusionWeights, KeywordScorer, PlaceholderResponse, ResponseSignal, ScoreBreakdown,
    ScoredMessage, SenderAggregate, SenderAggregator, SenderKeyMode, SentimentOutcome,
    SentimentScorer,
};
use crate::sources::MessageSource;

/// Run-level knobs, resolved from [`Config`]
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub token_budget: usize,
    pub max_results: usize,
    pub sender_key: SenderKeyMode,
    pub failure_policy: FailurePolicy,
    pub classify_timeout: Duration,
    pub classify_retries: u32,
    pub classify_retry_delay: Duration,
    pub fetch_retries: u32,
    pub fetch_retry_delay: Duration,
    pub concurrency: usize,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_budget: config.scoring.token_budget,
            max_results: config.source.max_results,
            sender_key: config.scoring.sender_key,
            failure_policy: config.classifier.failure_policy,
            classify_timeout: Duration::from_millis(config.classifier.timeout_ms),
            classify_retries: config.classifier.retries,
            classify_retry_delay: Duration::from_millis(config.classifier.retry_delay_ms),
            fetch_retries: config.source.retries,
            fetch_retry_delay: Duration::from_millis(config.source.retry_delay_ms),
            concurrency: config.classifier.concurrency.max(1),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A message left out of the report, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedMessage {
    /// Position in the fetched batch
    pub index: usize,
    pub sender: String,
    pub subject: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub classifier: String,
    /// Token scheme used to bound message text
    pub truncator: String,
    pub fetched: usize,
    pub scored: usize,
    /// First-appearance order
    pub senders: Vec<SenderAggregate>,
    pub skipped: Vec<SkippedMessage>,
}

impl TrustReport {
    pub fn sender(&self, key: &str) -> Option<&SenderAggregate> {
        self.senders.iter().find(|s| s.sender == key)
    }
}

pub struct TrustPipeline {
    models: ScoringModels,
    sentiment: SentimentScorer,
    keywords: KeywordScorer,
    weights: FusionWeights,
    response: Arc<dyn ResponseSignal>,
    options: PipelineOptions,
}

impl TrustPipeline {
    pub fn new(models: ScoringModels, config: &Config) -> Result<Self> {
        config.scoring.weights.validate()?;
        let keywords = KeywordScorer::new(config.keywords.clone(), config.scoring.keyword_divisor)?;
        let response = PlaceholderResponse::new(config.scoring.response_placeholder)?;
        Ok(Self::with_parts(
            models,
            keywords,
            config.scoring.weights,
            Arc::new(response),
            PipelineOptions::from_config(config),
        ))
    }

    pub fn with_parts(
        models: ScoringModels,
        keywords: KeywordScorer,
        weights: FusionWeights,
        response: Arc<dyn ResponseSignal>,
        options: PipelineOptions,
    ) -> Self {
        let sentiment = SentimentScorer::new(models.classifier.clone());
        Self {
            models,
            sentiment,
            keywords,
            weights,
            response,
            options,
        }
    }

    /// Fetch from `source` and score everything it returns
    pub async fn run(&self, source: &dyn MessageSource) -> Result<TrustReport> {
        let max = self.options.max_results;
        let messages = with_retries(
            "fetch",
            self.options.fetch_retries,
            self.options.fetch_retry_delay,
            || source.fetch(max),
        )
        .await
        .map_err(|e| match e {
            TrustError::SourceUnavailable { .. } => e,
            other => TrustError::source_unavailable(other.to_string()),
        })?;
        info!("Fetched {} messages from {}", messages.len(), source.name());
        self.score_messages(source.name(), messages).await
    }

    /// Score an already-fetched batch. Per-message failures follow the
    /// failure policy; fatal errors always abort.
    pub async fn score_messages(
        &self,
        source_name: &str,
        messages: Vec<Message>,
    ) -> Result<TrustReport> {
        let fetched = messages.len();
        let mut aggregator = SenderAggregator::new(self.options.sender_key);
        let mut skipped = Vec::new();
        let mut scored = 0usize;

        // `buffered` yields in input order whatever the completion order
        let mut results = futures_util::stream::iter(messages.into_iter().enumerate())
            .map(|(index, message)| async move {
                let outcome = self.score_message(&message).await;
                (index, message, outcome)
            })
            .buffered(self.options.concurrency);

        while let Some((index, message, outcome)) = results.next().await {
            match outcome {
                Ok(s) => {
                    debug!(index, sender = %message.sender, score = s.score, "scored");
                    aggregator.push(&message.sender, s);
                    scored += 1;
                }
                Err(e) if e.is_fatal() || self.options.failure_policy == FailurePolicy::Abort => {
                    warn!(index, sender = %message.sender, "aborting run: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(index, sender = %message.sender, "skipping message: {}", e);
                    skipped.push(SkippedMessage {
                        index,
                        sender: message.sender,
                        subject: message.subject,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let senders = aggregator.finish();
        info!(
            "Scored {}/{} messages across {} senders ({} skipped)",
            scored,
            fetched,
            senders.len(),
            skipped.len()
        );
        Ok(TrustReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source: source_name.to_string(),
            classifier: self.sentiment.classifier_name().to_string(),
            truncator: self.models.truncator.name().to_string(),
            fetched,
            scored,
            senders,
            skipped,
        })
    }

    /// Truncate, classify, keyword-score and fuse one message
    pub async fn score_message(&self, message: &Message) -> Result<ScoredMessage> {
        let truncated = self
            .models
            .truncator
            .truncate(&message.content, self.options.token_budget)?;
        let sentiment = self.classify(&truncated.text).await?;
        let keyword = self.keywords.score(&truncated.text);
        let response = self.response.response_score(message);
        let score = self.weights.fuse(sentiment.score, keyword.score, response);

        Ok(ScoredMessage {
            subject: message.subject.clone(),
            sentiment_label: sentiment.classification.label,
            score,
            breakdown: ScoreBreakdown {
                sentiment_score: sentiment.score,
                confidence: sentiment.classification.confidence,
                keyword_score: keyword.score,
                keyword_hits: keyword.hits,
                response_score: response,
                tokens_kept: truncated.kept_tokens,
                truncated: truncated.was_truncated(),
            },
        })
    }

    async fn classify(&self, text: &str) -> Result<SentimentOutcome> {
        let timeout = self.options.classify_timeout;
        with_retries(
            "classification",
            self.options.classify_retries,
            self.options.classify_retry_delay,
            || async move {
                tokio::time::timeout(timeout, self.sentiment.score(text))
                    .await
                    .map_err(|_| TrustError::Timeout {
                        operation: "classification".to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })?
            },
        )
        .await
    }
}

/// Up to `retries` extra attempts, sleeping `base * 2^attempt` in between
async fn with_retries<T, F, Fut>(operation: &str, retries: u32, base: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < retries => {
                let delay = base * (1u32 << attempt.min(16));
                debug!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation,
                    attempt + 1,
                    retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
