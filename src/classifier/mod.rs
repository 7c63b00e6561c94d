//! Sentiment classifiers and the one-per-process model cache.
//!
//! The classifier is a black box `text -> (label, confidence)`. Loading a model
//! is expensive, so [`ModelCache`] builds the tokenizer/classifier pair once and
//! hands out shared handles; both are stateless at inference time.

pub mod distilbert;
pub mod lexicon;
pub mod remote;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::{ClassifierProvider, Config};
use crate::error::{Result, TrustError};
use crate::tokenizer::{HfTokenizer, TextTruncator, WhitespaceTruncator, load_tokenizer_file};

pub use crate::scoring::sentiment::{Classification, SentimentLabel};
pub use distilbert::DistilBertClassifier;
pub use lexicon::LexiconClassifier;
pub use remote::RemoteClassifier;

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify one text. Single text in, single result out.
    async fn classify(&self, text: &str) -> Result<Classification>;
    fn name(&self) -> &str;
}

/// Truncator and classifier that belong together: the truncator tokenizes
/// the way the classifier expects.
#[derive(Clone)]
pub struct ScoringModels {
    pub truncator: Arc<dyn TextTruncator>,
    pub classifier: Arc<dyn SentimentClassifier>,
}

impl ScoringModels {
    pub fn new(truncator: Arc<dyn TextTruncator>, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self {
            truncator,
            classifier,
        }
    }
}

/// Initialize-once holder for [`ScoringModels`]. Construct it at startup and
/// pass it (or the models it yields) to every pipeline run. No teardown.
#[derive(Default)]
pub struct ModelCache {
    cell: OnceCell<ScoringModels>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads on first call; later calls return the same handles
    pub async fn get_or_load(&self, config: &Config) -> Result<ScoringModels> {
        let models = self
            .cell
            .get_or_try_init(|| async { create_models(config).await })
            .await?;
        Ok(models.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

/// Model files resolved either from a local directory or the hub cache
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Factory: build the truncator/classifier pair for the configured provider
pub async fn create_models(config: &Config) -> Result<ScoringModels> {
    let cc = &config.classifier;
    match cc.provider {
        ClassifierProvider::Local => {
            let files = resolve_model_files(config).await?;
            let device = distilbert::select_device();
            let classifier = tokio::task::spawn_blocking(move || {
                DistilBertClassifier::load(&files, device)
            })
            .await
            .map_err(|e| TrustError::Internal {
                message: format!("model loading task failed: {}", e),
            })??;
            info!(
                "Using local DistilBERT classifier (model={}, labels={:?})",
                cc.model_id,
                classifier.labels()
            );
            // Same tokenizer instance for truncation and inference
            let truncator = HfTokenizer::new(classifier.tokenizer().clone(), cc.model_id.clone());
            Ok(ScoringModels::new(Arc::new(truncator), Arc::new(classifier)))
        }
        ClassifierProvider::Remote => {
            let classifier = RemoteClassifier::new(
                cc.endpoint.clone(),
                &cc.model_id,
                config.runtime.hf_api_token.clone(),
                cc.timeout_ms,
            )?;
            info!("Using remote classifier ({})", classifier.endpoint());
            let truncator: Arc<dyn TextTruncator> = match resolve_tokenizer_file(config).await {
                Ok(path) => Arc::new(HfTokenizer::new(
                    Arc::new(load_tokenizer_file(&path)?),
                    cc.tokenizer_id.clone(),
                )),
                Err(e) => {
                    warn!(
                        "Tokenizer unavailable ({}); truncating on whitespace instead",
                        e
                    );
                    Arc::new(WhitespaceTruncator)
                }
            };
            Ok(ScoringModels::new(truncator, Arc::new(classifier)))
        }
        ClassifierProvider::Lexicon => {
            info!("Using lexicon classifier (deterministic, no model)");
            Ok(ScoringModels::new(
                Arc::new(WhitespaceTruncator),
                Arc::new(LexiconClassifier::default()),
            ))
        }
    }
}

async fn resolve_model_files(config: &Config) -> Result<ModelFiles> {
    let cc = config.classifier.clone();
    if let Some(dir) = &cc.model_dir {
        let files = ModelFiles {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.exists() {
                return Err(TrustError::config(format!(
                    "model file missing: {}",
                    path.display()
                )));
            }
        }
        return Ok(files);
    }

    let tokenizer = resolve_tokenizer_file(config).await?;
    tokio::task::spawn_blocking(move || {
        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| TrustError::config(format!("hub client: {}", e)))?;
        let repo = api.repo(hf_hub::Repo::with_revision(
            cc.model_id.clone(),
            hf_hub::RepoType::Model,
            cc.revision.clone(),
        ));
        let fetch = |name: &str| {
            repo.get(name).map_err(|e| {
                TrustError::config(format!("fetching {} from {}: {}", name, cc.model_id, e))
            })
        };
        Ok(ModelFiles {
            config: fetch("config.json")?,
            tokenizer,
            weights: fetch("model.safetensors")?,
        })
    })
    .await
    .map_err(|e| TrustError::Internal {
        message: format!("model download task failed: {}", e),
    })?
}

/// `tokenizer.json` from the model repo, else from the tokenizer repo
async fn resolve_tokenizer_file(config: &Config) -> Result<PathBuf> {
    let cc = config.classifier.clone();
    if let Some(dir) = &cc.model_dir {
        return Ok(dir.join("tokenizer.json"));
    }
    tokio::task::spawn_blocking(move || {
        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| TrustError::config(format!("hub client: {}", e)))?;
        let from_model = api
            .repo(hf_hub::Repo::with_revision(
                cc.model_id.clone(),
                hf_hub::RepoType::Model,
                cc.revision.clone(),
            ))
            .get("tokenizer.json");
        match from_model {
            Ok(path) => Ok(path),
            Err(_) => api
                .model(cc.tokenizer_id.clone())
                .get("tokenizer.json")
                .map_err(|e| {
                    TrustError::config(format!(
                        "no tokenizer.json in {} or {}: {}",
                        cc.model_id, cc.tokenizer_id, e
                    ))
                }),
        }
    })
    .await
    .map_err(|e| TrustError::Internal {
        message: format!("tokenizer download task failed: {}", e),
    })?
}
