//! Keyword-weighted lexical scoring

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TrustError};

/// Default divisor applied to the raw keyword sum before clamping
pub const DEFAULT_KEYWORD_DIVISOR: f64 = 10.0;

// Maximal alphanumeric-or-underscore runs
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Word weights. `positive` holds weights >= 0, `negative` weights <= 0.
/// A table left out of the config keeps its built-in words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    #[serde(default = "default_positive")]
    pub positive: BTreeMap<String, i64>,
    #[serde(default = "default_negative")]
    pub negative: BTreeMap<String, i64>,
}

fn weights(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(w, n)| (w.to_string(), *n)).collect()
}

fn default_positive() -> BTreeMap<String, i64> {
    weights(&[
        ("thank", 1),
        ("reliable", 2),
        ("trust", 2),
        ("great", 1),
        ("help", 1),
        ("appreciate", 1),
        ("excellent", 2),
    ])
}

fn default_negative() -> BTreeMap<String, i64> {
    weights(&[
        ("sorry", -1),
        ("delay", -1),
        ("fail", -2),
        ("issue", -1),
        ("problem", -1),
        ("mistake", -2),
        ("apologies", -1),
    ])
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            positive: default_positive(),
            negative: default_negative(),
        }
    }
}

impl KeywordTable {
    /// Combined weight of `word` across both tables (0 when absent)
    pub fn weight(&self, word: &str) -> i64 {
        self.positive.get(word).copied().unwrap_or(0) + self.negative.get(word).copied().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        for (word, weight) in &self.positive {
            if *weight < 0 {
                return Err(TrustError::config(format!(
                    "positive keyword '{}' has negative weight {}",
                    word, weight
                )));
            }
        }
        for (word, weight) in &self.negative {
            if *weight > 0 {
                return Err(TrustError::config(format!(
                    "negative keyword '{}' has positive weight {}",
                    word, weight
                )));
            }
        }
        // Text is lowercased before lookup, so uppercase keys could never match
        if let Some(word) = self
            .positive
            .keys()
            .chain(self.negative.keys())
            .find(|w| w.to_lowercase() != **w)
        {
            return Err(TrustError::config(format!(
                "keyword '{}' must be lowercase",
                word
            )));
        }
        Ok(())
    }
}

/// A keyword that contributed to a score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub word: String,
    pub weight: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    /// Sum of weights over every token, repeats included
    pub raw_sum: i64,
    /// `raw_sum / divisor` clamped to [-1, 1]
    pub score: f64,
    /// Matched keywords in first-seen order
    pub hits: Vec<KeywordHit>,
}

#[derive(Debug, Clone)]
pub struct KeywordScorer {
    table: KeywordTable,
    divisor: f64,
}

impl KeywordScorer {
    pub fn new(table: KeywordTable, divisor: f64) -> Result<Self> {
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(TrustError::config(format!(
                "keyword divisor must be a positive number, got {}",
                divisor
            )));
        }
        table.validate()?;
        Ok(Self { table, divisor })
    }

    /// Lowercase, then split on anything that is not a word character.
    /// No stemming, no deduplication.
    pub fn tokenize(text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        WORD_RE
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn score(&self, text: &str) -> KeywordScore {
        let mut raw_sum = 0i64;
        let mut hits: Vec<KeywordHit> = Vec::new();

        for token in Self::tokenize(text) {
            let weight = self.table.weight(&token);
            if weight == 0 {
                continue;
            }
            raw_sum += weight;
            match hits.iter_mut().find(|h| h.word == token) {
                Some(hit) => hit.count += 1,
                None => hits.push(KeywordHit {
                    word: token,
                    weight,
                    count: 1,
                }),
            }
        }

        KeywordScore {
            raw_sum,
            score: (raw_sum as f64 / self.divisor).clamp(-1.0, 1.0),
            hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> KeywordScorer {
        KeywordScorer::new(KeywordTable::default(), DEFAULT_KEYWORD_DIVISOR).unwrap()
    }

    #[test]
    fn thank_you_excellent_reliable_scores_half() {
        let ks = scorer().score("Thank you so much, this was excellent and reliable!");
        assert_eq!(ks.raw_sum, 5);
        assert!((ks.score - 0.5).abs() < 1e-12);
        let words: Vec<&str> = ks.hits.iter().map(|h| h.word.as_str()).collect();
        assert_eq!(words, vec!["thank", "excellent", "reliable"]);
    }

    #[test]
    fn empty_text_scores_zero() {
        let ks = scorer().score("");
        assert_eq!(ks.raw_sum, 0);
        assert_eq!(ks.score, 0.0);
        assert!(ks.hits.is_empty());
    }

    #[test]
    fn repeats_count_and_result_is_clamped() {
        let ks = scorer().score("fail fail fail fail fail fail");
        assert_eq!(ks.raw_sum, -12);
        assert_eq!(ks.score, -1.0);
        assert_eq!(ks.hits[0].count, 6);

        let ks = scorer().score(&"excellent ".repeat(8));
        assert_eq!(ks.raw_sum, 16);
        assert_eq!(ks.score, 1.0);
    }

    #[test]
    fn tokens_split_on_punctuation_and_keep_underscores_and_digits() {
        let tokens = KeywordScorer::tokenize("Re: ISSUE_42, delay... thanks!");
        assert_eq!(tokens, vec!["re", "issue_42", "delay", "thanks"]);
        // no stemming: "thanks" and "issue_42" do not match "thank"/"issue"
        assert_eq!(scorer().score("Re: ISSUE_42, delay... thanks!").raw_sum, -1);
    }

    #[test]
    fn word_in_both_tables_sums_weights() {
        let mut table = KeywordTable::default();
        table.negative.insert("help".into(), -3);
        let ks = KeywordScorer::new(table, 10.0).unwrap().score("help");
        assert_eq!(ks.raw_sum, -2);
    }

    #[test]
    fn divisor_is_configurable() {
        let ks = KeywordScorer::new(KeywordTable::default(), 4.0)
            .unwrap()
            .score("great help");
        assert!((ks.score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_tables_and_divisors_are_rejected() {
        assert!(KeywordScorer::new(KeywordTable::default(), 0.0).is_err());
        let mut table = KeywordTable::default();
        table.positive.insert("bad".into(), -1);
        assert!(table.validate().is_err());
        let mut table = KeywordTable::default();
        table.negative.insert("Oops".into(), -1);
        assert!(table.validate().is_err());
    }
}
