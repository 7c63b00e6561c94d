//! Token-budget truncation of message text ahead of classification.
//!
//! Truncation has to use the classifier's own tokenization, otherwise the
//! classifier either sees more tokens than it accepts or silently cuts the
//! text a second time. The local model shares one `tokenizers::Tokenizer`
//! between [`HfTokenizer`] and the classifier for that reason.

use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::error::{Result, TrustError};

/// Default maximum token count, special tokens included
pub const DEFAULT_TOKEN_BUDGET: usize = 512;

/// Text bounded to a token budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    pub text: String,
    /// Token count of the input before truncation
    pub original_tokens: usize,
    /// Token count actually kept
    pub kept_tokens: usize,
}

impl Truncated {
    pub fn was_truncated(&self) -> bool {
        self.kept_tokens < self.original_tokens
    }
}

/// Bounds text to a token budget. Pure: no state survives a call.
pub trait TextTruncator: Send + Sync {
    fn name(&self) -> &str;
    fn truncate(&self, text: &str, max_tokens: usize) -> Result<Truncated>;
}

/// Hugging Face tokenizer, as used by the sentiment model
#[derive(Clone)]
pub struct HfTokenizer {
    inner: Arc<Tokenizer>,
    label: String,
}

impl HfTokenizer {
    pub fn new(inner: Arc<Tokenizer>, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = load_tokenizer_file(path)?;
        Ok(Self::new(Arc::new(tokenizer), path.display().to_string()))
    }

    pub fn inner(&self) -> &Arc<Tokenizer> {
        &self.inner
    }

    /// Token ids for `text` with special tokens, cut to at most `max_length`
    /// ids the same way the tokenizer's own truncation would: content tokens
    /// are dropped from the end, the special tokens framing them are kept.
    pub fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>> {
        Ok(self.encode_counted(text, max_length)?.0)
    }

    /// Text for `ids` with special/control tokens stripped
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| TrustError::tokenizer(format!("decode failed: {}", e)))
    }

    fn encode_counted(&self, text: &str, max_length: usize) -> Result<(Vec<u32>, usize)> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| TrustError::tokenizer(format!("encode failed: {}", e)))?;
        let ids = encoding.get_ids();
        let special_mask = encoding.get_special_tokens_mask();
        let total = ids.len();
        if total <= max_length {
            return Ok((ids.to_vec(), total));
        }

        let specials = special_mask.iter().filter(|&&m| m == 1).count();
        // Leading specials ([CLS]) stay in front, the rest ([SEP]) go last
        let first_content = special_mask
            .iter()
            .position(|&m| m == 0)
            .unwrap_or(total);
        if max_length <= specials {
            // No room for content: keep only the framing tokens
            let mut out: Vec<u32> = ids[..first_content].to_vec();
            out.extend(
                ids.iter()
                    .zip(special_mask)
                    .skip(first_content)
                    .filter(|(_, m)| **m == 1)
                    .map(|(id, _)| *id),
            );
            out.truncate(max_length);
            return Ok((out, total));
        }

        let room = max_length - specials;
        let mut out = Vec::with_capacity(max_length);
        out.extend_from_slice(&ids[..first_content]);
        out.extend(
            ids.iter()
                .zip(special_mask)
                .skip(first_content)
                .filter(|(_, m)| **m == 0)
                .map(|(id, _)| *id)
                .take(room),
        );
        out.extend(
            ids.iter()
                .zip(special_mask)
                .skip(first_content)
                .filter(|(_, m)| **m == 1)
                .map(|(id, _)| *id),
        );
        Ok((out, total))
    }
}

impl TextTruncator for HfTokenizer {
    fn name(&self) -> &str {
        &self.label
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<Truncated> {
        if text.is_empty() {
            return Ok(Truncated {
                text: String::new(),
                original_tokens: 0,
                kept_tokens: 0,
            });
        }
        let (ids, total) = self.encode_counted(text, max_tokens)?;
        Ok(Truncated {
            text: self.decode(&ids)?,
            original_tokens: total,
            kept_tokens: ids.len(),
        })
    }
}

/// Loads `tokenizer.json`, dropping any padding/truncation baked into it
pub fn load_tokenizer_file(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
        TrustError::tokenizer(format!("failed to load {}: {}", path.display(), e))
    })?;
    tokenizer.with_padding(None);
    let _ = tokenizer.with_truncation(None);
    Ok(tokenizer)
}

/// Whitespace token scheme for runs without a model vocabulary (lexicon
/// classifier, tests). Output words are joined by single spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTruncator;

impl TextTruncator for WhitespaceTruncator {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<Truncated> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let kept = words.len().min(max_tokens);
        Ok(Truncated {
            text: words[..kept].join(" "),
            original_tokens: words.len(),
            kept_tokens: kept,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_empty_input_yields_empty_output() {
        let t = WhitespaceTruncator.truncate("", DEFAULT_TOKEN_BUDGET).unwrap();
        assert_eq!(t.text, "");
        assert_eq!(t.kept_tokens, 0);
        assert!(!t.was_truncated());
    }

    #[test]
    fn whitespace_truncates_to_budget() {
        let t = WhitespaceTruncator.truncate("one two three four", 2).unwrap();
        assert_eq!(t.text, "one two");
        assert_eq!(t.original_tokens, 4);
        assert!(t.was_truncated());
    }

    #[test]
    fn whitespace_is_idempotent_under_budget() {
        let first = WhitespaceTruncator.truncate("a  b\tc", 10).unwrap();
        assert_eq!(first.text, "a b c");
        let second = WhitespaceTruncator.truncate(&first.text, 10).unwrap();
        assert_eq!(second.text, first.text);
    }
}
