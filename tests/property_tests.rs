/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use crm_intel::extractor::extract;
use crm_intel::miner::mine;
use crm_intel::models::{CleanedText, Mined, MinedFacts, RawDocument, VendorQuery};
use crm_intel::normalizer::{parse_response, truncate_chars, MAX_FEATURES};
use proptest::prelude::*;

fn cleaned(text: &str) -> CleanedText {
    CleanedText {
        text: text.to_string(),
        title: None,
        description: None,
        extraction_succeeded: true,
    }
}

// Property: the miner is pure and never panics
proptest! {
    #[test]
    fn mining_never_panics(text in "\\PC*") {
        let _ = mine(&cleaned(&text));
    }

    #[test]
    fn mining_is_deterministic(text in "[a-zA-Z0-9$€£/ .,\n]{0,200}") {
        let first = serde_json::to_string(&mine(&cleaned(&text))).unwrap();
        let second = serde_json::to_string(&mine(&cleaned(&text))).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn bare_numbers_are_never_prices(
        n in 1u32..10_000_000,
        noun in prop_oneof!["users", "customers", "companies", "countries", "integrations"],
        magnitude in prop_oneof!["", " million", " thousand", " billion"],
    ) {
        let text = format!("Trusted by {}{} {} worldwide every month", n, magnitude, noun);
        let facts = mine(&cleaned(&text));
        prop_assert_eq!(facts.entry_price, Mined::Absent);
    }

    #[test]
    fn anchored_price_is_found(dollars in 1u32..5_000, cents in 0u32..100) {
        let text = format!("Plans from ${}.{:02}/user/month", dollars, cents);
        let facts = mine(&cleaned(&text));
        let expected = format!("{}.{:02}", dollars, cents).parse::<f64>().unwrap();
        prop_assert_eq!(facts.entry_price, Mined::High(expected));
    }
}

// Property: extraction tolerates arbitrary markup
proptest! {
    #[test]
    fn extraction_never_panics(body in "\\PC*") {
        let doc = RawDocument::success("Acme", "https://acme.test", 200, None, body, 1);
        let cleaned = extract(&doc);
        if !cleaned.extraction_succeeded {
            prop_assert!(cleaned.text.is_empty());
        }
    }

    #[test]
    fn failed_fetch_never_yields_text(name in "[A-Za-z]{1,20}") {
        let doc = RawDocument::not_found(&VendorQuery::new(&name).unwrap());
        let cleaned = extract(&doc);
        prop_assert!(cleaned.usable_text().is_none());
        prop_assert_eq!(mine(&cleaned), MinedFacts::default());
    }
}

// Property: the AI reply parser never panics and never exceeds its caps
proptest! {
    #[test]
    fn reply_parsing_never_panics(raw in "\\PC*") {
        let _ = parse_response(&raw);
    }

    #[test]
    fn parsed_features_are_capped(features in proptest::collection::vec("[a-z ]{0,12}", 0..30)) {
        let raw = serde_json::json!({ "notable_features": features }).to_string();
        let fields = parse_response(&raw).unwrap();
        prop_assert!(fields.notable_features.len() <= MAX_FEATURES);
        prop_assert!(fields.notable_features.iter().all(|f| !f.trim().is_empty()));
    }

    #[test]
    fn truncation_respects_char_limit(text in "\\PC*", limit in 0usize..500) {
        let truncated = truncate_chars(&text, limit);
        prop_assert!(truncated.chars().count() <= limit);
        prop_assert!(text.starts_with(truncated));
    }
}
