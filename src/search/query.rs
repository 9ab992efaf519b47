//! Search query construction from seed article text.
//!
//! A seed is searched by its most distinctive early sentences: fragments
//! shorter than [`MIN_SENTENCE_CHARS`] are usually headlines, bylines, or
//! captions and are skipped. Typographic quotes are removed so the phrase
//! quoting added here is never nested.

use itertools::Itertools;

/// Fragments at or below this length are not used as queries.
pub const MIN_SENTENCE_CHARS: usize = 25;

/// Pick up to `count` sentences from `text`, each cut to `max_words` words.
///
/// Sentences are split on `.`; quotes are stripped and curly apostrophes
/// replaced by ASCII ones.
pub fn top_sentences(text: &str, count: usize, max_words: usize) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(count)
        .map(|s| clean_quotes(s).split_whitespace().take(max_words).join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// The first `max_words` words of `text`, quotes cleaned as in
/// [`top_sentences`]. Used when no sentence is long enough.
pub fn opening_words(text: &str, max_words: usize) -> Option<String> {
    let words = clean_quotes(text).split_whitespace().take(max_words).join(" ");
    (!words.is_empty()).then_some(words)
}

/// Drop double quotes and turn curly apostrophes into ASCII ones.
pub fn clean_quotes(text: &str) -> String {
    text.replace(['"', '\u{201c}', '\u{201d}'], "")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Wrap a sentence in double quotes for exact-phrase search.
pub fn quote(sentence: &str) -> String {
    format!("\"{sentence}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_short_fragments() {
        let text = "Breaking news. The council approved a sweeping water treaty on Monday. Photo: AP.";
        assert_eq!(
            top_sentences(text, 5, 20),
            vec!["The council approved a sweeping water treaty on Monday"]
        );
    }

    #[test]
    fn test_limits_count_and_words() {
        let text = "One two three four five six seven eight nine ten. \
                    Eleven twelve thirteen fourteen fifteen sixteen. \
                    Seventeen eighteen nineteen twenty twenty-one.";
        let out = top_sentences(text, 2, 3);
        assert_eq!(out, vec!["One two three", "Eleven twelve thirteen"]);
    }

    #[test]
    fn test_strips_quotes() {
        let text = "The minister said \u{201c}we won\u{2019}t back down\u{201d} to \"reporters\" today";
        assert_eq!(
            top_sentences(text, 5, 20),
            vec!["The minister said we won't back down to reporters today"]
        );
    }

    #[test]
    fn test_opening_words_strip_quotes() {
        assert_eq!(
            opening_words("\"Alpha\" \u{201c}Beta\u{201d} Gamma Delta", 3).as_deref(),
            Some("Alpha Beta Gamma")
        );
        assert_eq!(opening_words("\" \u{201c}\u{201d}", 3), None);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("alpha beta"), "\"alpha beta\"");
    }

    #[test]
    fn test_empty_text() {
        assert!(top_sentences("", 5, 20).is_empty());
    }
}
