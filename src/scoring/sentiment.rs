//! Sentiment labels and the label/confidence to signed scalar mapping

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::classifier::SentimentClassifier;
use crate::error::{Result, TrustError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
        }
    }

    /// Case-insensitive parse of a classifier label ("POSITIVE", "neg", ...)
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" => Some(SentimentLabel::Positive),
            "negative" | "neg" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output: the winning label and the probability of that label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: SentimentLabel,
    pub confidence: f64,
}

impl Classification {
    pub fn new(label: SentimentLabel, confidence: f64) -> Result<Self> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(TrustError::classifier(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
        Ok(Self { label, confidence })
    }
}

/// Map a classification onto one axis: +1 maximally positive, -1 maximally
/// negative, 0 at the decision boundary whichever label won.
pub fn sentiment_score(classification: &Classification) -> f64 {
    let c = classification.confidence;
    match classification.label {
        SentimentLabel::Positive => 2.0 * c - 1.0,
        SentimentLabel::Negative => 1.0 - 2.0 * c,
    }
}

/// Sentiment term for one message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentOutcome {
    pub classification: Classification,
    pub score: f64,
}

/// Wraps the external classifier. Each call is independent of every other.
#[derive(Clone)]
pub struct SentimentScorer {
    classifier: Arc<dyn SentimentClassifier>,
}

impl SentimentScorer {
    pub fn new(classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub async fn score(&self, text: &str) -> Result<SentimentOutcome> {
        let classification = self.classifier.classify(text).await?;
        Ok(SentimentOutcome {
            score: sentiment_score(&classification),
            classification,
        })
    }
}
