//! Document splitting.

use std::sync::LazyLock;

use regex::Regex;

static RE_SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());

/// Split `text` into sentences on runs of `.`, `!` and `?`.
///
/// Each fragment is trimmed; fragments of `min_chars` characters or fewer are
/// dropped. The terminators themselves are not kept.
pub fn chunk_sentences(text: &str, min_chars: usize) -> Vec<String> {
    RE_SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().count() > min_chars)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminator_runs() {
        let chunks = chunk_sentences(
            "TechCorp was founded in 2010. It grew fast!!! Did it go public?  Yes...",
            3,
        );
        assert_eq!(
            chunks,
            ["TechCorp was founded in 2010", "It grew fast", "Did it go public"]
        );
    }

    #[test]
    fn short_fragments_dropped() {
        assert!(chunk_sentences("Ok. Fine. No.", 10).is_empty());
        // Exactly `min_chars` long is still too short.
        assert!(chunk_sentences("abcdefghij.", 10).is_empty());
        assert_eq!(chunk_sentences("abcdefghijk.", 10), ["abcdefghijk"]);
    }

    #[test]
    fn text_without_terminator_is_one_chunk() {
        assert_eq!(
            chunk_sentences("  Jane Doe leads the company  ", 5),
            ["Jane Doe leads the company"]
        );
        assert!(chunk_sentences("", 0).is_empty());
    }
}
