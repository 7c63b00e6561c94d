use inbox_trust::tokenizer::{HfTokenizer, TextTruncator};
use std::str::FromStr;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Tiny BERT-shaped tokenizer: lowercase, whitespace split, [CLS] x [SEP]
fn tiny_tokenizer() -> HfTokenizer {
    let words = [
        "thank", "you", "for", "the", "help", "we", "trust", "your", "excellent", "work",
    ];
    let mut vocab = serde_json::Map::new();
    for (i, special) in ["[UNK]", "[CLS]", "[SEP]"].iter().enumerate() {
        vocab.insert(special.to_string(), serde_json::json!(i));
    }
    for (i, w) in words.iter().enumerate() {
        vocab.insert(w.to_string(), serde_json::json!(i + 3));
    }
    let added = |id: u32, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };
    let spec = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [added(0, "[UNK]"), added(1, "[CLS]"), added(2, "[SEP]")],
        "normalizer": {"type": "Lowercase"},
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": {"type": "BertProcessing", "sep": ["[SEP]", 2], "cls": ["[CLS]", 1]},
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]"}
    });
    let tokenizer = Tokenizer::from_str(&spec.to_string()).unwrap();
    HfTokenizer::new(Arc::new(tokenizer), "tiny")
}

#[test]
fn short_text_passes_through() {
    let t = tiny_tokenizer().truncate("Thank you for the help", 512).unwrap();
    assert_eq!(t.text, "thank you for the help");
    // five words plus [CLS] and [SEP]
    assert_eq!(t.original_tokens, 7);
    assert!(!t.was_truncated());
}

#[test]
fn long_text_is_cut_inside_the_special_tokens() {
    let tok = tiny_tokenizer();
    let ids = tok.encode("we trust your excellent work", 4).unwrap();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids.first(), Some(&1));
    assert_eq!(ids.last(), Some(&2));

    let t = tok.truncate("we trust your excellent work", 4).unwrap();
    assert_eq!(t.text, "we trust");
    assert_eq!(t.kept_tokens, 4);
    assert!(t.was_truncated());
}

#[test]
fn truncation_is_idempotent() {
    let tok = tiny_tokenizer();
    let once = tok.truncate("thank you for the help we trust your work", 6).unwrap();
    let twice = tok.truncate(&once.text, 6).unwrap();
    assert_eq!(once.text, twice.text);
    assert!(!twice.was_truncated());
}

#[test]
fn empty_text_yields_empty_text() {
    let t = tiny_tokenizer().truncate("", 512).unwrap();
    assert_eq!(t.text, "");
    assert_eq!(t.kept_tokens, 0);
}

#[test]
fn budget_with_no_room_for_content_keeps_only_special_tokens() {
    let tok = tiny_tokenizer();
    let ids = tok.encode("we trust your", 2).unwrap();
    assert_eq!(ids, vec![1, 2]);

    let t = tok.truncate("we trust your", 2).unwrap();
    assert_eq!(t.text, "");
    assert_eq!(t.kept_tokens, 2);
    assert!(t.was_truncated());
}

#[test]
fn re_encoded_output_stays_within_small_budgets() {
    let tok = tiny_tokenizer();
    for budget in [2, 3] {
        let t = tok.truncate("we trust your", budget).unwrap();
        let again = tok.encode(&t.text, usize::MAX).unwrap();
        assert!(
            again.len() <= budget,
            "re-encoded {:?} has {} tokens, budget {}",
            t.text,
            again.len(),
            budget
        );
    }
    assert_eq!(tok.truncate("we trust your", 3).unwrap().text, "we");
}
