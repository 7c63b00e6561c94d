//! Linear fusion of the per-message signals into one trust score

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};
use crate::message::Message;

/// Value reported by [`PlaceholderResponse`] unless configured otherwise
pub const DEFAULT_RESPONSE_PLACEHOLDER: f64 = 0.5;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Round to three decimals. Decided on the exact binary value (so 1.0005,
/// stored just below, goes down), true ties go to even.
pub fn round3(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.3}", value).parse().unwrap_or(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub sentiment: f64,
    pub keyword: f64,
    pub response: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            sentiment: 0.5,
            keyword: 0.3,
            response: 0.2,
        }
    }
}

impl FusionWeights {
    /// Weights must be non-negative and sum to 1.0. Anything else lets the
    /// fused score leave [-1, 1], so configuration is rejected up front.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("sentiment", self.sentiment),
            ("keyword", self.keyword),
            ("response", self.response),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(TrustError::config(format!(
                    "fusion weight '{}' must be a non-negative number, got {}",
                    name, w
                )));
            }
        }
        let sum = self.sentiment + self.keyword + self.response;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(TrustError::config(format!(
                "fusion weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        Ok(())
    }

    /// `w_s*sentiment + w_k*keyword + w_r*response`, rounded to 3 decimals
    pub fn fuse(&self, sentiment: f64, keyword: f64, response: f64) -> f64 {
        round3(self.sentiment * sentiment + self.keyword * keyword + self.response * response)
    }
}

/// Source of the responsiveness term of the fused score.
///
/// Nothing in the mailbox data feeds this yet. It is the extension point for
/// reply-latency or thread-responsiveness metrics; until one exists the
/// pipeline uses [`PlaceholderResponse`]. Implementations must return a value
/// in [-1, 1] or the fused score loses its bound.
pub trait ResponseSignal: Send + Sync {
    fn name(&self) -> &str;
    fn response_score(&self, message: &Message) -> f64;
}

/// Fixed responsiveness value, identical for every message
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderResponse {
    value: f64,
}

impl PlaceholderResponse {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            return Err(TrustError::config(format!(
                "response placeholder must lie in [-1, 1], got {}",
                value
            )));
        }
        Ok(Self { value })
    }
}

impl Default for PlaceholderResponse {
    fn default() -> Self {
        Self {
            value: DEFAULT_RESPONSE_PLACEHOLDER,
        }
    }
}

impl ResponseSignal for PlaceholderResponse {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn response_score(&self, _message: &Message) -> f64 {
        self.value
    }
}
