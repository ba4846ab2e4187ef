//! Rough token accounting for prompts sent to the model.

use once_cell::sync::Lazy;
use regex::Regex;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static regex"));
static PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));

/// Words + punctuation + 5% of the byte length.
pub fn estimate_tokens(text: &str) -> usize {
    let words = WORD.find_iter(text).count();
    let punct = PUNCT.find_iter(text).count();
    words + punct + text.len() / 20
}

/// Cut `text` down to roughly `max_tokens`.
///
/// Whole paragraphs are kept while they fit; if not even the first one
/// fits, as many of its words as fit are kept. Truncated output ends with
/// `...`.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_owned();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0;
    for para in text.split("\n\n") {
        let cost = estimate_tokens(para);
        if used + cost > max_tokens {
            break;
        }
        kept.push(para);
        used += cost;
    }

    let out = kept.join("\n\n");
    if !kept.is_empty() && estimate_tokens(&out) <= max_tokens {
        return format!("{out}...");
    }

    // first paragraph alone is too big: fall back to words
    let mut words: Vec<&str> = Vec::new();
    let mut used = 0;
    for w in text.split_whitespace() {
        let cost = estimate_tokens(w) + 1;
        if used + cost > max_tokens.saturating_sub(1) {
            break;
        }
        words.push(w);
        used += cost;
    }
    if words.is_empty() {
        return String::new();
    }
    format!("{}...", words.join(" "))
}

#[test]
fn estimate_counts_words_and_punctuation() {
    assert_eq!(estimate_tokens(""), 0);
    // 2 words + 11/20
    assert_eq!(estimate_tokens("hello world"), 2);
    assert_eq!(estimate_tokens("foo(bar);"), 2 + 3);
}

#[test]
fn short_text_is_untouched() {
    assert_eq!(truncate_to_tokens("a b c", 100), "a b c");
}

#[test]
fn truncation_keeps_whole_paragraphs_first() {
    let text = "one two three\n\nfour five six\n\nseven eight nine ten eleven twelve";
    let out = truncate_to_tokens(text, 7);
    assert_eq!(out, "one two three\n\nfour five six...");
}

#[test]
fn truncation_falls_back_to_words() {
    let text = "alpha beta gamma delta epsilon zeta eta theta";
    let out = truncate_to_tokens(text, 6);
    assert!(out.ends_with("..."));
    assert!(out.starts_with("alpha"));
    assert!(out.len() < text.len());
}
