use async_trait::async_trait;
use candle_core::{D, DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::debug;

use super::{ModelFiles, SentimentClassifier};
use crate::error::{Result, TrustError};
use crate::scoring::sentiment::{Classification, SentimentLabel};
use crate::tokenizer::{HfTokenizer, load_tokenizer_file};

/// Fields of config.json the classification head needs
#[derive(Debug, Deserialize)]
struct HeadConfig {
    dim: usize,
    #[serde(default = "default_max_positions")]
    max_position_embeddings: usize,
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

fn default_max_positions() -> usize {
    512
}

/// Pick the compute device. Metal only when built with the `metal` feature
/// and not disabled through TRUST_USE_METAL.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        let use_metal = std::env::var("TRUST_USE_METAL")
            .ok()
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        if use_metal {
            if let Ok(d) = Device::new_metal(0) {
                return d;
            }
        }
    }
    Device::Cpu
}

struct Inner {
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    tokenizer: HfTokenizer,
    labels: Vec<SentimentLabel>,
    max_positions: usize,
    device: Device,
}

/// DistilBERT fine-tuned for binary sentiment (SST-2 layout:
/// `distilbert.*`, `pre_classifier`, `classifier`)
#[derive(Clone)]
pub struct DistilBertClassifier {
    inner: Arc<Inner>,
}

impl DistilBertClassifier {
    /// Blocking: reads and memory-maps the model files
    pub fn load(files: &ModelFiles, device: Device) -> Result<Self> {
        let tokenizer = Arc::new(load_tokenizer_file(&files.tokenizer)?);

        let config_str = std::fs::read_to_string(&files.config)?;
        let config: DistilBertConfig = serde_json::from_str(&config_str)?;
        let head: HeadConfig = serde_json::from_str(&config_str)?;
        let labels = parse_labels(&head.id2label)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                std::slice::from_ref(&files.weights),
                DType::F32,
                &device,
            )?
        };
        let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;
        let pre_classifier = candle_nn::linear(head.dim, head.dim, vb.pp("pre_classifier"))?;
        let classifier = candle_nn::linear(head.dim, labels.len(), vb.pp("classifier"))?;
        debug!(
            "Loaded DistilBERT (dim={}, max_positions={}) from {}",
            head.dim,
            head.max_position_embeddings,
            files.weights.display()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                model,
                pre_classifier,
                classifier,
                tokenizer: HfTokenizer::new(tokenizer, "distilbert"),
                labels,
                max_positions: head.max_position_embeddings,
                device,
            }),
        })
    }

    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        self.inner.tokenizer.inner()
    }

    pub fn labels(&self) -> &[SentimentLabel] {
        &self.inner.labels
    }
}

impl Inner {
    fn probabilities(&self, text: &str) -> Result<Vec<f32>> {
        let ids = self.tokenizer.encode(text, self.max_positions)?;
        let seq = ids.len();
        let input_ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        // Nonzero entries are masked out; a single unpadded sequence masks nothing
        let mask = Tensor::zeros((seq, seq), DType::U8, &self.device)?;

        let hidden = self.model.forward(&input_ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let x = self.pre_classifier.forward(&cls)?.relu()?;
        let logits = self.classifier.forward(&x)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        Ok(probs.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn classify_blocking(&self, text: &str) -> Result<Classification> {
        let probs = self.probabilities(text)?;
        let (best, p) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| TrustError::classifier("model produced no label scores"))?;
        Classification::new(self.labels[best], f64::from(*p).clamp(0.0, 1.0))
    }
}

#[async_trait]
impl SentimentClassifier for DistilBertClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let inner = self.inner.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.classify_blocking(&text))
            .await
            .map_err(|e| TrustError::classifier(format!("inference task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "distilbert"
    }
}

/// `{"0": "NEGATIVE", "1": "POSITIVE"}` -> labels indexed by class id
fn parse_labels(id2label: &BTreeMap<String, String>) -> Result<Vec<SentimentLabel>> {
    if id2label.is_empty() {
        return Ok(vec![SentimentLabel::Negative, SentimentLabel::Positive]);
    }
    let mut indexed = Vec::with_capacity(id2label.len());
    for (id, name) in id2label {
        let id: usize = id
            .parse()
            .map_err(|_| TrustError::config(format!("bad id2label key '{}'", id)))?;
        let label = SentimentLabel::parse(name).ok_or_else(|| {
            TrustError::config(format!("unsupported sentiment label '{}'", name))
        })?;
        indexed.push((id, label));
    }
    indexed.sort_by_key(|(id, _)| *id);
    if indexed.iter().enumerate().any(|(i, (id, _))| i != *id) {
        return Err(TrustError::config("id2label ids are not contiguous from 0"));
    }
    Ok(indexed.into_iter().map(|(_, l)| l).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_class_ids() {
        let mut map = BTreeMap::new();
        map.insert("1".to_string(), "POSITIVE".to_string());
        map.insert("0".to_string(), "NEGATIVE".to_string());
        assert_eq!(
            parse_labels(&map).unwrap(),
            vec![SentimentLabel::Negative, SentimentLabel::Positive]
        );
    }

    #[test]
    fn missing_id2label_defaults_to_sst2_order() {
        let labels = parse_labels(&BTreeMap::new()).unwrap();
        assert_eq!(labels, vec![SentimentLabel::Negative, SentimentLabel::Positive]);
    }

    #[test]
    fn unknown_or_gapped_labels_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert("0".to_string(), "NEUTRAL".to_string());
        assert!(parse_labels(&map).is_err());

        let mut gapped = BTreeMap::new();
        gapped.insert("0".to_string(), "NEGATIVE".to_string());
        gapped.insert("2".to_string(), "POSITIVE".to_string());
        assert!(parse_labels(&gapped).is_err());
    }

    #[test]
    fn head_config_reads_hub_layout() {
        let raw = r#"{"dim": 768, "n_layers": 6, "id2label": {"0": "NEGATIVE", "1": "POSITIVE"}}"#;
        let head: HeadConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(head.dim, 768);
        assert_eq!(head.max_position_embeddings, 512);
        assert_eq!(head.id2label.len(), 2);
    }
}
