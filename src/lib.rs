pub mod classifier;
pub mod config;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod sources;
pub mod tokenizer;

pub use classifier::{ModelCache, ScoringModels, SentimentClassifier};
pub use config::Config;
pub use error::{Result, TrustError};
pub use message::Message;
pub use pipeline::{PipelineOptions, SkippedMessage, TrustPipeline, TrustReport};
pub use report::{ReportFormat, ReportSink, WriterSink};
pub use sources::MessageSource;

/// One complete run against the configured source: load the models through
/// `cache`, fetch, score and aggregate.
pub async fn run_trust_scoring(config: &Config, cache: &ModelCache) -> Result<TrustReport> {
    let models = cache.get_or_load(config).await?;
    let source = sources::create_source(config)?;
    let pipeline = TrustPipeline::new(models, config)?;
    pipeline.run(source.as_ref()).await
}
