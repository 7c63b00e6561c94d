//! Per-sender grouping of scored messages

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::TrustError;
use crate::scoring::fusion::round3;
use crate::scoring::keywords::KeywordHit;
use crate::scoring::sentiment::SentimentLabel;

/// How the grouping key is derived from the raw `From` header.
///
/// `Raw` keeps the header verbatim, so "Ann <ann@x.io>" and "ann@x.io" are two
/// different senders. That is the default and a known limitation.
/// `Normalized` groups by the lowercased address instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKeyMode {
    #[default]
    Raw,
    Normalized,
}

impl SenderKeyMode {
    pub fn key_for(&self, sender: &str) -> String {
        match self {
            SenderKeyMode::Raw => sender.to_string(),
            SenderKeyMode::Normalized => normalize_address(sender),
        }
    }
}

impl FromStr for SenderKeyMode {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(SenderKeyMode::Raw),
            "normalized" | "normalised" | "address" => Ok(SenderKeyMode::Normalized),
            other => Err(TrustError::config(format!(
                "unknown sender key mode '{}' (expected raw or normalized)",
                other
            ))),
        }
    }
}

/// `"Ann <Ann@X.io>"` -> `"ann@x.io"`; bare values are trimmed and lowercased
pub fn normalize_address(sender: &str) -> String {
    let inner = match (sender.rfind('<'), sender.rfind('>')) {
        (Some(open), Some(close)) if open < close => &sender[open + 1..close],
        _ => sender,
    };
    inner.trim().to_lowercase()
}

/// Component scores behind one fused score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub sentiment_score: f64,
    pub confidence: f64,
    pub keyword_score: f64,
    pub keyword_hits: Vec<KeywordHit>,
    pub response_score: f64,
    pub tokens_kept: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMessage {
    pub subject: String,
    #[serde(rename = "sentiment")]
    pub sentiment_label: SentimentLabel,
    /// Fused trust score, rounded to 3 decimals
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderAggregate {
    /// Grouping key (the raw header in `Raw` mode)
    pub sender: String,
    /// Raw headers folded into this group, first-seen order
    pub raw_senders: Vec<String>,
    /// Mean of message scores rounded to 3 decimals
    pub average: f64,
    /// Messages in arrival order
    pub messages: Vec<ScoredMessage>,
}

impl SenderAggregate {
    fn new(sender: String) -> Self {
        Self {
            sender,
            raw_senders: Vec::new(),
            average: 0.0,
            messages: Vec::new(),
        }
    }

    pub fn mean_score(&self) -> f64 {
        if self.messages.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.messages.iter().map(|m| m.score).sum();
        round3(sum / self.messages.len() as f64)
    }
}

/// Accumulates scored messages in arrival order, grouped by sender key.
/// Senders keep their first-appearance order.
#[derive(Debug, Default)]
pub struct SenderAggregator {
    mode: SenderKeyMode,
    groups: Vec<SenderAggregate>,
    index: HashMap<String, usize>,
}

impl SenderAggregator {
    pub fn new(mode: SenderKeyMode) -> Self {
        Self {
            mode,
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn push(&mut self, sender: &str, scored: ScoredMessage) {
        let key = self.mode.key_for(sender);
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.groups.push(SenderAggregate::new(key.clone()));
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[slot];
        if !group.raw_senders.iter().any(|s| s == sender) {
            group.raw_senders.push(sender.to_string());
        }
        group.messages.push(scored);
    }

    /// Computes the averages and hands back the groups
    pub fn finish(self) -> Vec<SenderAggregate> {
        self.groups
            .into_iter()
            .map(|mut g| {
                g.average = g.mean_score();
                g
            })
            .collect()
    }
}
