use async_trait::async_trait;
use inbox_trust::classifier::{Classification, ScoringModels, SentimentClassifier, SentimentLabel};
use inbox_trust::config::{Config, FailurePolicy};
use inbox_trust::scoring::{FusionWeights, KeywordScorer, KeywordTable, PlaceholderResponse};
use inbox_trust::sources::{MessageSource, StaticSource};
use inbox_trust::tokenizer::WhitespaceTruncator;
use inbox_trust::{Message, PipelineOptions, Result, TrustError, TrustPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Answers from a fixed table keyed by text; unknown text is neutral.
/// Text starting with "FAIL" errors, text starting with "SLOW" hangs.
struct ScriptedClassifier {
    answers: HashMap<String, Classification>,
    delays: HashMap<String, Duration>,
}

impl ScriptedClassifier {
    fn new() -> Self {
        Self {
            answers: HashMap::new(),
            delays: HashMap::new(),
        }
    }

    fn answer(mut self, text: &str, label: SentimentLabel, confidence: f64) -> Self {
        self.answers
            .insert(text.to_string(), Classification::new(label, confidence).unwrap());
        self
    }

    fn delay(mut self, text: &str, ms: u64) -> Self {
        self.delays.insert(text.to_string(), Duration::from_millis(ms));
        self
    }
}

#[async_trait]
impl SentimentClassifier for ScriptedClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        if let Some(d) = self.delays.get(text) {
            tokio::time::sleep(*d).await;
        }
        if text.starts_with("SLOW") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if text.starts_with("FAIL") {
            return Err(TrustError::classifier("model exploded"));
        }
        Ok(self
            .answers
            .get(text)
            .copied()
            .unwrap_or(Classification {
                label: SentimentLabel::Positive,
                confidence: 0.5,
            }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct DownSource {
    calls: AtomicU32,
}

#[async_trait]
impl MessageSource for DownSource {
    async fn fetch(&self, _max_results: usize) -> Result<Vec<Message>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TrustError::source_unavailable("connection refused"))
    }

    fn name(&self) -> &str {
        "down"
    }
}

fn pipeline_with(classifier: ScriptedClassifier, options: PipelineOptions) -> TrustPipeline {
    let models = ScoringModels::new(Arc::new(WhitespaceTruncator), Arc::new(classifier));
    TrustPipeline::with_parts(
        models,
        KeywordScorer::new(KeywordTable::default(), 10.0).unwrap(),
        FusionWeights::default(),
        Arc::new(PlaceholderResponse::default()),
        options,
    )
}

fn fast_options() -> PipelineOptions {
    PipelineOptions {
        classify_timeout: Duration::from_millis(200),
        fetch_retry_delay: Duration::from_millis(1),
        classify_retry_delay: Duration::from_millis(1),
        ..PipelineOptions::default()
    }
}

const TRUSTING: &str = "Thank you so much, this was excellent and reliable!";

#[tokio::test]
async fn confident_positive_with_keywords_scores_point_seven() {
    let classifier = ScriptedClassifier::new().answer(TRUSTING, SentimentLabel::Positive, 0.95);
    let pipeline = pipeline_with(classifier, fast_options());

    let scored = pipeline
        .score_message(&Message::new("a@x.io", Some("Hi".into()), TRUSTING))
        .await
        .unwrap();
    assert_eq!(scored.score, 0.7);
    assert_eq!(scored.sentiment_label, SentimentLabel::Positive);
    assert!((scored.breakdown.sentiment_score - 0.9).abs() < 1e-9);
    assert_eq!(scored.breakdown.keyword_score, 0.5);
    assert_eq!(scored.breakdown.response_score, 0.5);
}

#[tokio::test]
async fn sender_average_over_two_messages() {
    let classifier = ScriptedClassifier::new().answer(TRUSTING, SentimentLabel::Positive, 0.95);
    let pipeline = pipeline_with(classifier, fast_options());
    let source = StaticSource::new(vec![
        Message::new("a@x.io", Some("first".into()), TRUSTING),
        Message::new("a@x.io", Some("second".into()), "see attached"),
    ]);

    let report = pipeline.run(&source).await.unwrap();
    let a = report.sender("a@x.io").unwrap();
    assert_eq!(a.messages[0].score, 0.7);
    assert_eq!(a.messages[1].score, 0.1);
    assert_eq!(a.average, 0.4);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.scored, 2);
    assert_eq!(report.truncator, "whitespace");
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn empty_body_is_scored_not_skipped() {
    let pipeline = pipeline_with(ScriptedClassifier::new(), fast_options());
    let scored = pipeline
        .score_message(&Message::new("x", None, ""))
        .await
        .unwrap();
    assert_eq!(scored.subject, "No Subject");
    assert_eq!(scored.breakdown.keyword_score, 0.0);
    assert_eq!(scored.breakdown.tokens_kept, 0);
    // 0.5*0 + 0.3*0 + 0.2*0.5
    assert_eq!(scored.score, 0.1);
}

#[tokio::test]
async fn keywords_past_the_token_budget_are_ignored() {
    let options = PipelineOptions {
        token_budget: 3,
        ..fast_options()
    };
    let pipeline = pipeline_with(ScriptedClassifier::new(), options);
    let scored = pipeline
        .score_message(&Message::new("x", None, "please reply soon excellent excellent"))
        .await
        .unwrap();
    assert!(scored.breakdown.truncated);
    assert_eq!(scored.breakdown.keyword_score, 0.0);
}

#[tokio::test]
async fn classifier_failure_is_skipped_by_default() {
    let pipeline = pipeline_with(ScriptedClassifier::new(), fast_options());
    let source = StaticSource::new(vec![
        Message::new("a", Some("ok".into()), "fine"),
        Message::new("b", Some("bad".into()), "FAIL please"),
        Message::new("a", Some("ok again".into()), "fine"),
    ]);

    let report = pipeline.run(&source).await.unwrap();
    assert_eq!(report.scored, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
    assert_eq!(report.skipped[0].sender, "b");
    assert!(report.skipped[0].reason.contains("model exploded"));
    assert!(report.sender("b").is_none());
    assert_eq!(report.sender("a").unwrap().messages.len(), 2);
}

#[tokio::test]
async fn abort_policy_fails_the_run() {
    let options = PipelineOptions {
        failure_policy: FailurePolicy::Abort,
        ..fast_options()
    };
    let pipeline = pipeline_with(ScriptedClassifier::new(), options);
    let source = StaticSource::new(vec![
        Message::new("a", None, "fine"),
        Message::new("b", None, "FAIL"),
    ]);
    let err = pipeline.run(&source).await.unwrap_err();
    assert!(matches!(err, TrustError::Classifier { .. }));
}

#[tokio::test]
async fn slow_classification_times_out_and_is_skipped() {
    let pipeline = pipeline_with(ScriptedClassifier::new(), fast_options());
    let source = StaticSource::new(vec![
        Message::new("a", None, "SLOW down"),
        Message::new("b", None, "quick"),
    ]);
    let report = pipeline.run(&source).await.unwrap();
    assert_eq!(report.scored, 1);
    assert!(report.skipped[0].reason.contains("timed out after 200ms"));
}

#[tokio::test]
async fn concurrent_scoring_keeps_arrival_order() {
    // Earlier messages finish last
    let classifier = ScriptedClassifier::new()
        .delay("m0", 80)
        .delay("m1", 60)
        .delay("m2", 40)
        .delay("m3", 20)
        .answer("m3", SentimentLabel::Negative, 0.9);
    let options = PipelineOptions {
        concurrency: 4,
        ..fast_options()
    };
    let pipeline = pipeline_with(classifier, options);
    let messages = (0..5)
        .map(|i| {
            let sender = if i % 2 == 0 { "even" } else { "odd" };
            Message::new(sender, Some(format!("s{}", i)), format!("m{}", i))
        })
        .collect();

    let report = pipeline.score_messages("static", messages).await.unwrap();
    let senders: Vec<&str> = report.senders.iter().map(|s| s.sender.as_str()).collect();
    assert_eq!(senders, vec!["even", "odd"]);
    let even: Vec<&str> = report.senders[0].messages.iter().map(|m| m.subject.as_str()).collect();
    let odd: Vec<&str> = report.senders[1].messages.iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(even, vec!["s0", "s2", "s4"]);
    assert_eq!(odd, vec!["s1", "s3"]);
    assert_eq!(report.senders[1].messages[1].sentiment_label, SentimentLabel::Negative);
}

#[tokio::test]
async fn unreachable_source_is_fatal_after_retries() {
    let options = PipelineOptions {
        fetch_retries: 2,
        ..fast_options()
    };
    let pipeline = pipeline_with(ScriptedClassifier::new(), options);
    let source = DownSource {
        calls: AtomicU32::new(0),
    };
    let err = pipeline.run(&source).await.unwrap_err();
    assert!(matches!(err, TrustError::SourceUnavailable { .. }));
    assert!(err.is_fatal());
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn max_results_limits_the_batch() {
    let options = PipelineOptions {
        max_results: 2,
        ..fast_options()
    };
    let pipeline = pipeline_with(ScriptedClassifier::new(), options);
    let source = StaticSource::new(
        (0..5)
            .map(|i| Message::new(format!("s{}", i), None, "hello"))
            .collect(),
    );
    let report = pipeline.run(&source).await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.senders.len(), 2);
}

#[test]
fn invalid_weights_are_rejected_at_construction() {
    let mut config = Config::default();
    config.scoring.weights.response = 0.5;
    let models = ScoringModels::new(
        Arc::new(WhitespaceTruncator),
        Arc::new(ScriptedClassifier::new()),
    );
    assert!(TrustPipeline::new(models, &config).is_err());
}
