use async_trait::async_trait;
use std::collections::HashSet;

use super::SentimentClassifier;
use crate::error::Result;
use crate::scoring::keywords::KeywordScorer;
use crate::scoring::sentiment::{Classification, SentimentLabel};

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "thanks", "thank", "appreciate", "happy", "glad", "welcome",
    "pleased", "love", "wonderful", "success", "congratulations", "helpful", "confirmed",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "poor", "terrible", "problem", "issue", "error", "failed", "failure", "unfortunately",
    "angry", "sorry", "complaint", "overdue", "suspended", "warning", "urgent",
];

/// Word-count classifier for offline runs and tests. Deterministic; not a
/// substitute for the model.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(POSITIVE_WORDS.iter().copied(), NEGATIVE_WORDS.iter().copied())
    }
}

impl LexiconClassifier {
    pub fn new<'a>(
        positive: impl IntoIterator<Item = &'a str>,
        negative: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            positive: positive.into_iter().map(str::to_lowercase).collect(),
            negative: negative.into_iter().map(str::to_lowercase).collect(),
        }
    }

    pub fn classify_sync(&self, text: &str) -> Classification {
        let mut net: i64 = 0;
        for token in KeywordScorer::tokenize(text) {
            if self.positive.contains(&token) {
                net += 1;
            } else if self.negative.contains(&token) {
                net -= 1;
            }
        }
        let magnitude = net.unsigned_abs() as f64;
        let confidence = 0.5 + 0.5 * magnitude / (magnitude + 2.0);
        let label = if net >= 0 {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Negative
        };
        Classification { label, confidence }
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        Ok(self.classify_sync(text))
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}
