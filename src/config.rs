use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TrustError};
use crate::scoring::fusion::{DEFAULT_RESPONSE_PLACEHOLDER, FusionWeights};
use crate::scoring::keywords::{DEFAULT_KEYWORD_DIVISOR, KeywordTable};
use crate::scoring::SenderKeyMode;
use crate::tokenizer::DEFAULT_TOKEN_BUDGET;

/// Default config file name, overridable with TRUST_CONFIG
pub const DEFAULT_CONFIG_FILE: &str = "inbox_trust.toml";

/// SST-2 fine-tuned DistilBERT sentiment model
pub const DEFAULT_MODEL_ID: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// Repo providing a `tokenizer.json` with the same vocabulary as the model
pub const DEFAULT_TOKENIZER_ID: &str = "distilbert-base-uncased";

/// Upper bound for either retry base delay
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Main configuration structure loaded from inbox_trust.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub keywords: KeywordTable,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Tunables of the scoring pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub token_budget: usize,
    pub keyword_divisor: f64,
    pub sender_key: SenderKeyMode,
    /// Fixed responsiveness value until a real signal is wired in
    pub response_placeholder: f64,
    pub weights: FusionWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            keyword_divisor: DEFAULT_KEYWORD_DIVISOR,
            sender_key: SenderKeyMode::Raw,
            response_placeholder: DEFAULT_RESPONSE_PLACEHOLDER,
            weights: FusionWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceProvider {
    #[default]
    Gmail,
    File,
}

impl FromStr for SourceProvider {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(SourceProvider::Gmail),
            "file" => Ok(SourceProvider::File),
            other => Err(TrustError::config(format!(
                "unknown source provider '{}' (expected gmail or file)",
                other
            ))),
        }
    }
}

/// Where messages come from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub provider: SourceProvider,
    pub max_results: usize,
    /// JSON / JSON Lines file for the file provider
    pub path: Option<PathBuf>,
    /// Gmail user id ("me" is the authenticated account)
    pub user_id: String,
    pub api_base: String,
    pub request_timeout_ms: u64,
    /// Extra fetch attempts after the first one fails
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: SourceProvider::Gmail,
            max_results: 10,
            path: None,
            user_id: "me".to_string(),
            api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            request_timeout_ms: 20_000,
            retries: 2,
            retry_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    /// DistilBERT run in-process with candle
    #[default]
    Local,
    /// Hugging Face hosted inference
    Remote,
    /// Deterministic word-list classifier, no model download
    Lexicon,
}

impl FromStr for ClassifierProvider {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "candle" => Ok(ClassifierProvider::Local),
            "remote" | "hf" => Ok(ClassifierProvider::Remote),
            "lexicon" | "fake" => Ok(ClassifierProvider::Lexicon),
            other => Err(TrustError::config(format!(
                "unknown classifier provider '{}' (expected local, remote or lexicon)",
                other
            ))),
        }
    }
}

/// What happens to the run when one message cannot be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave the message out of the aggregation and keep going
    #[default]
    Skip,
    /// Fail the whole run, emitting nothing
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(TrustError::config(format!(
                "unknown failure policy '{}' (expected skip or abort)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub model_id: String,
    pub revision: String,
    pub tokenizer_id: String,
    /// Directory holding config.json / tokenizer.json / model.safetensors.
    /// When unset the files are fetched through the Hugging Face hub cache.
    pub model_dir: Option<PathBuf>,
    /// Endpoint for the remote provider; defaults to the hosted model URL
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Extra classification attempts per message
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Messages classified at once; 1 keeps processing strictly sequential
    pub concurrency: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::Local,
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: "main".to_string(),
            tokenizer_id: DEFAULT_TOKENIZER_ID.to_string(),
            model_dir: None,
            endpoint: None,
            timeout_ms: 30_000,
            retries: 0,
            retry_delay_ms: 200,
            failure_policy: FailurePolicy::Skip,
            concurrency: 1,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub gmail_access_token: Option<String>,
    pub gmail_token_file: Option<PathBuf>,
    pub hf_api_token: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "inbox_trust=info".to_string(),
            gmail_access_token: None,
            gmail_token_file: default_token_file(),
            hf_api_token: None,
        }
    }
}

fn default_token_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("inbox-trust").join("token.json"))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = non_empty_env(name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={}", name, raw);
            None
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(level) = non_empty_env("RUST_LOG") {
            cfg.log_level = level;
        }
        cfg.gmail_access_token = non_empty_env("GMAIL_ACCESS_TOKEN");
        if let Some(path) = non_empty_env("TRUST_GMAIL_TOKEN_FILE") {
            cfg.gmail_token_file = Some(PathBuf::from(path));
        }
        cfg.hf_api_token = non_empty_env("HF_API_TOKEN").or_else(|| non_empty_env("HF_TOKEN"));
        cfg
    }
}

/// Per-run overrides from the command line, applied after file and env
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub max_results: Option<usize>,
    pub source: Option<SourceProvider>,
    /// Implies the file provider
    pub input: Option<PathBuf>,
    pub classifier: Option<ClassifierProvider>,
    pub abort_on_error: bool,
    pub concurrency: Option<usize>,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(n) = self.max_results {
            config.source.max_results = n;
        }
        if let Some(p) = self.source {
            config.source.provider = p;
        }
        if let Some(path) = &self.input {
            config.source.provider = SourceProvider::File;
            config.source.path = Some(path.clone());
        }
        if let Some(c) = self.classifier {
            config.classifier.provider = c;
        }
        if self.abort_on_error {
            config.classifier.failure_policy = FailurePolicy::Abort;
        }
        if let Some(n) = self.concurrency {
            config.classifier.concurrency = n;
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses TRUST_CONFIG environment variable or defaults to "inbox_trust.toml"
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Same as [`Config::load`] with an explicit config path taking priority
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// File and environment layers only. Callers that layer more overrides
    /// on top (CLI flags) must call [`Config::validate`] themselves.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self> {
        // TRUST_ENV_FILE if set, else ./.env
        if let Ok(env_path) = std::env::var("TRUST_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }

        let config_path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            PathBuf::from(
                std::env::var("TRUST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string()),
            )
        });

        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(_) if path.is_some() => {
                return Err(TrustError::config(format!(
                    "config file {} could not be read",
                    config_path.display()
                )));
            }
            Err(_) => {
                tracing::warn!(
                    "Config file {} not found, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Env-first overrides for the handful of knobs people flip per run
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<usize>("TRUST_MAX_RESULTS") {
            self.source.max_results = v;
        }
        if let Some(v) = parse_env::<SourceProvider>("TRUST_SOURCE") {
            self.source.provider = v;
        }
        if let Some(v) = non_empty_env("TRUST_SOURCE_PATH") {
            self.source.path = Some(PathBuf::from(v));
        }
        if let Some(v) = parse_env::<usize>("TRUST_TOKEN_BUDGET") {
            self.scoring.token_budget = v;
        }
        if let Some(v) = parse_env::<SenderKeyMode>("TRUST_SENDER_KEY") {
            self.scoring.sender_key = v;
        }
        if let Some(v) = parse_env::<ClassifierProvider>("TRUST_CLASSIFIER") {
            self.classifier.provider = v;
        }
        if let Some(v) = non_empty_env("TRUST_MODEL_ID") {
            self.classifier.model_id = v;
        }
        if let Some(v) = non_empty_env("TRUST_MODEL_DIR") {
            self.classifier.model_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty_env("TRUST_CLASSIFIER_URL") {
            self.classifier.endpoint = Some(v);
        }
        if let Some(v) = parse_env::<u64>("TRUST_CLASSIFIER_TIMEOUT_MS") {
            self.classifier.timeout_ms = v;
        }
        if let Some(v) = parse_env::<FailurePolicy>("TRUST_FAILURE_POLICY") {
            self.classifier.failure_policy = v;
        }
        if let Some(v) = parse_env::<usize>("TRUST_CONCURRENCY") {
            self.classifier.concurrency = v;
        }
    }

    /// Reject configurations that would break the score bounds or the run
    pub fn validate(&self) -> Result<()> {
        self.scoring.weights.validate()?;
        self.keywords.validate()?;
        if !self.scoring.keyword_divisor.is_finite() || self.scoring.keyword_divisor <= 0.0 {
            return Err(TrustError::config(format!(
                "scoring.keyword_divisor must be > 0, got {}",
                self.scoring.keyword_divisor
            )));
        }
        if !(-1.0..=1.0).contains(&self.scoring.response_placeholder) {
            return Err(TrustError::config(format!(
                "scoring.response_placeholder must lie in [-1, 1], got {}",
                self.scoring.response_placeholder
            )));
        }
        // Room for at least [CLS] and [SEP]
        if self.scoring.token_budget < 2 {
            return Err(TrustError::config(format!(
                "scoring.token_budget must be at least 2, got {}",
                self.scoring.token_budget
            )));
        }
        if self.source.max_results == 0 {
            return Err(TrustError::config("source.max_results must be at least 1"));
        }
        if self.source.provider == SourceProvider::File && self.source.path.is_none() {
            return Err(TrustError::config(
                "source.provider = \"file\" requires source.path (or TRUST_SOURCE_PATH)",
            ));
        }
        if self.source.retries > 10 {
            return Err(TrustError::config("source.retries must be at most 10"));
        }
        if self.classifier.retries > 5 {
            return Err(TrustError::config("classifier.retries must be at most 5"));
        }
        for (key, delay) in [
            ("source.retry_delay_ms", self.source.retry_delay_ms),
            ("classifier.retry_delay_ms", self.classifier.retry_delay_ms),
        ] {
            if delay > MAX_RETRY_DELAY_MS {
                return Err(TrustError::config(format!(
                    "{} must be at most {}, got {}",
                    key, MAX_RETRY_DELAY_MS, delay
                )));
            }
        }
        if self.classifier.timeout_ms == 0 {
            return Err(TrustError::config("classifier.timeout_ms must be > 0"));
        }
        if !(1..=64).contains(&self.classifier.concurrency) {
            return Err(TrustError::config(format!(
                "classifier.concurrency must be between 1 and 64, got {}",
                self.classifier.concurrency
            )));
        }
        Ok(())
    }
}
