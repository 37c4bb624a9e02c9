//! End-to-end scoring properties through the public API.

use candle_core::Device;
use phishguard_model::{encode, PhishDetector, UrlTransformer, DEFAULT_VOCAB_SIZE, MAX_LEN, PAD};
use proptest::prelude::*;

fn detector() -> PhishDetector {
    PhishDetector::new_random(DEFAULT_VOCAB_SIZE, &Device::Cpu).unwrap()
}

#[test]
fn arbitrary_length_urls_score_without_error() {
    let d = detector();
    for len in [0usize, 1, 74, 75, 76, 500, 10_000] {
        let url = "x".repeat(len);
        let score = d.classify(&url).unwrap();
        assert!((0.0..=1.0).contains(&score), "len {len}: {score}");
    }
}

#[test]
fn urls_sharing_first_max_len_chars_score_identically() {
    let d = detector();
    let prefix = "h".repeat(MAX_LEN);
    let a = d.classify(&format!("{prefix}/login.php")).unwrap();
    let b = d.classify(&format!("{prefix}?session=abc")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn empty_url_equals_all_padding() {
    let d = detector();
    let via_url = d.classify("").unwrap();
    let via_ids = d.model().score(&[PAD; MAX_LEN]).unwrap();
    assert_eq!(via_url, via_ids);
}

#[test]
fn non_ascii_urls_score_with_default_vocab() {
    let d = detector();
    let score = d.classify("https://пример.рф/вход").unwrap();
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn batch_order_does_not_change_scores() {
    let model = UrlTransformer::new_random(DEFAULT_VOCAB_SIZE, &Device::Cpu).unwrap();
    let urls = [
        "https://example.com",
        "http://paypal-secure-login.ru",
        "bit.ly/3xYz",
    ];
    let forward: Vec<_> = urls.iter().map(|u| encode(u)).collect();
    let mut reversed = forward.clone();
    reversed.reverse();

    let a = model.score_batch(&forward).unwrap();
    let mut b = model.score_batch(&reversed).unwrap();
    b.reverse();
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-5);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn scores_are_probabilities(url in ".{0,120}") {
        let d = detector();
        let s = d.classify(&url).unwrap();
        prop_assert!((0.0..=1.0).contains(&s));
    }
}
