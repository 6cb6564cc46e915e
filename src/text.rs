// src/text.rs
//! Text helpers shared by the scorers: overlap tokenization, whitespace folding,
//! char-boundary-safe truncation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));

/// Tokenize text for overlap scoring.
///
/// Lowercases, turns everything except letters, digits, hyphens and whitespace into spaces,
/// splits on whitespace and drops tokens shorter than `min_len` chars.
/// The set is ordered so callers that list tokens get a stable order.
pub fn overlap_tokens(text: &str, min_len: usize) -> BTreeSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

/// Collapse runs of whitespace into one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Decode HTML entities, strip tags, fold whitespace. Used on feed titles/summaries.
pub fn clean_markup(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();
    let untagged = RE_TAGS.replace_all(&decoded, " ");
    collapse_whitespace(&untagged)
}

/// Keep at most `max_chars` chars; never splits a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Short, anonymized id for log lines. Raw prompts and publication text are never logged.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
