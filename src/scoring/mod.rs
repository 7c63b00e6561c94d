//! Scoring building blocks: sentiment mapping, keyword scoring, fusion and
//! per-sender aggregation. None of these hold state across messages.

pub mod aggregate;
pub mod fusion;
pub mod keywords;
pub mod sentiment;

pub use aggregate::{
    ScoreBreakdown, ScoredMessage, SenderAggregate, SenderAggregator, SenderKeyMode,
    normalize_address,
};
pub use fusion::{FusionWeights, PlaceholderResponse, ResponseSignal, round3};
pub use keywords::{KeywordHit, KeywordScore, KeywordScorer, KeywordTable};
pub use sentiment::{Classification, SentimentLabel, SentimentOutcome, SentimentScorer, sentiment_score};
