#![cfg(feature = "model_integration")]

use inbox_trust::classifier::{ModelCache, SentimentLabel};
use inbox_trust::config::{ClassifierProvider, Config};
use inbox_trust::{Message, TrustPipeline};

#[tokio::test]
async fn local_distilbert_classifies_obvious_sentiment() {
    if std::env::var("RUN_MODEL_TESTS").is_err() {
        eprintln!("Skipping model test: RUN_MODEL_TESTS not set");
        return;
    }
    let mut config = Config::default();
    config.classifier.provider = ClassifierProvider::Local;

    let cache = ModelCache::new();
    let models = match cache.get_or_load(&config).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Skipping model test: model unavailable ({e})");
            return;
        }
    };

    let happy = models.classifier.classify("I love this, thank you so much!").await.unwrap();
    assert_eq!(happy.label, SentimentLabel::Positive);
    assert!(happy.confidence > 0.9);

    let sad = models.classifier.classify("This is terrible and I am very angry.").await.unwrap();
    assert_eq!(sad.label, SentimentLabel::Negative);
}

#[tokio::test]
async fn long_body_is_truncated_to_model_budget() {
    if std::env::var("RUN_MODEL_TESTS").is_err() {
        eprintln!("Skipping model test: RUN_MODEL_TESTS not set");
        return;
    }
    let config = Config::default();
    let cache = ModelCache::new();
    let models = match cache.get_or_load(&config).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Skipping model test: model unavailable ({e})");
            return;
        }
    };
    let pipeline = TrustPipeline::new(models, &config).unwrap();
    let body = "thank you for the reliable help ".repeat(400);
    let scored = pipeline
        .score_message(&Message::new("a@x.io", None, body))
        .await
        .unwrap();
    assert!(scored.breakdown.truncated);
    assert!(scored.breakdown.tokens_kept <= 512);
    assert!((-1.0..=1.0).contains(&scored.score));
}
