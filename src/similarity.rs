//! Lexical similarity between two article texts.
//!
//! # Metric
//!
//! 1. Each text is tokenized into lower-cased Unicode alphanumeric words.
//!    English stop words are dropped unless that leaves nothing, in which
//!    case every word is kept. A text without any alphanumeric word falls
//!    back to its whitespace-separated pieces.
//! 2. For each text build the set of unigrams `U` and the set of adjacent
//!    word pairs (bigrams) `B`.
//! 3. `overlap(X, Y) = |X ∩ Y| / min(|X|, |Y|)`, or `0` if either set is empty.
//! 4. `score = (overlap(U_a, U_b) + overlap(B_a, B_b)) / 2`. When either text
//!    has fewer than two tokens the bigram term is replaced by the unigram
//!    term.
//!
//! # Guarantees
//!
//! - `score(a, b) == score(b, a)`
//! - `score(a, a) == 1.0` for every text with at least one non-whitespace character
//! - `score(a, "") == score("", "") == 0.0`
//! - an excerpt fully contained in a longer article scores `1.0`
//! - runs in time linear in the combined length of both texts
//!
//! The bigram term keeps two texts that share vocabulary but not phrasing
//! from scoring as near-duplicates.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::hash::Hash;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("static word regex"));

pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "also", "an", "and", "are", "as", "at", "be", "been",
        "before", "being", "between", "but", "by", "can", "could", "did", "do", "does", "for",
        "from", "had", "has", "have", "he", "her", "his", "i", "if", "in", "into", "is", "it",
        "its", "more", "new", "no", "not", "of", "on", "or", "our", "over", "she", "so", "than",
        "that", "the", "their", "them", "there", "they", "this", "through", "to", "today",
        "tomorrow", "was", "we", "were", "which", "who", "will", "with", "would", "yesterday",
        "you",
    ]
    .into_iter()
    .collect()
});

/// Similarity in `[0, 1]` between two texts; see the module docs for the metric.
pub fn score(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let ua: HashSet<&str> = ta.iter().map(String::as_str).collect();
    let ub: HashSet<&str> = tb.iter().map(String::as_str).collect();
    let unigram = overlap(&ua, &ub);

    let bigram = if ta.len() < 2 || tb.len() < 2 {
        unigram
    } else {
        overlap(&bigrams(&ta), &bigrams(&tb))
    };

    ((unigram + bigram) / 2.0).clamp(0.0, 1.0)
}

/// Tokenize a text the way [`score`] does.
pub fn tokens(text: &str) -> Vec<String> {
    let words: Vec<String> = WORD
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    if words.is_empty() {
        return text.split_whitespace().map(str::to_lowercase).collect();
    }

    let content: Vec<String> = words
        .iter()
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .cloned()
        .collect();

    if content.is_empty() { words } else { content }
}

fn bigrams(tokens: &[String]) -> HashSet<(&str, &str)> {
    tokens
        .iter()
        .map(String::as_str)
        .tuple_windows::<(_, _)>()
        .collect()
}

fn overlap<T: Eq + Hash>(x: &HashSet<T>, y: &HashSet<T>) -> f64 {
    if x.is_empty() || y.is_empty() {
        return 0.0;
    }
    let (small, large) = if x.len() <= y.len() { (x, y) } else { (y, x) };
    let shared = small.iter().filter(|t| large.contains(t)).count();
    shared as f64 / small.len() as f64
}
