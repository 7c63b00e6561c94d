use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SentimentClassifier;
use crate::error::{Result, TrustError};
use crate::scoring::sentiment::{Classification, SentimentLabel};

const HOSTED_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

/// Hosted text-classification endpoint (Hugging Face inference API shape).
/// One request per call; retries belong to the pipeline.
pub struct RemoteClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// The API answers `[[{label, score}, ...]]` for single inputs, some
/// deployments drop the outer array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
    Error { error: String },
}

impl RemoteClassifier {
    pub fn new(
        endpoint: Option<String>,
        model_id: &str,
        api_token: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| TrustError::config(format!("Failed to build HTTP client: {}", e)))?;
        let endpoint =
            endpoint.unwrap_or_else(|| format!("{}/{}", HOSTED_INFERENCE_BASE, model_id));
        Ok(Self {
            client,
            endpoint,
            api_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SentimentClassifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        debug!("Remote classification (chars={})", text.len());
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&InferenceRequest { inputs: text });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TrustError::classifier(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrustError::classifier(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }
        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|e| TrustError::classifier(format!("unreadable response: {}", e)))?;
        pick_top(parsed)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

fn pick_top(response: InferenceResponse) -> Result<Classification> {
    let candidates = match response {
        InferenceResponse::Nested(rows) => rows.into_iter().next().unwrap_or_default(),
        InferenceResponse::Flat(row) => row,
        InferenceResponse::Error { error } => {
            return Err(TrustError::classifier(format!("endpoint error: {}", error)));
        }
    };
    let best = candidates
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| TrustError::classifier("endpoint returned no labels"))?;
    let label = SentimentLabel::parse(&best.label)
        .or_else(|| match best.label.as_str() {
            // Unmapped checkpoints report class ids
            "LABEL_0" => Some(SentimentLabel::Negative),
            "LABEL_1" => Some(SentimentLabel::Positive),
            _ => None,
        })
        .ok_or_else(|| TrustError::classifier(format!("unknown label '{}'", best.label)))?;
    Classification::new(label, best.score)
}
