//! Free-form statement selection for questions that name no entity or range.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::statement::Statement;

static RE_TERM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "had",
    "has", "have", "how", "in", "is", "it", "its", "of", "on", "or", "that", "the", "their",
    "there", "this", "to", "was", "were", "what", "when", "where", "which", "who", "whom", "why",
    "will", "with",
];

/// Picks the statements most relevant to a question.
pub trait StatementMatcher {
    /// Up to `limit` statements from `candidates`, best first.
    fn select<'a>(
        &self,
        question: &str,
        candidates: &[&'a Statement],
        limit: usize,
    ) -> Vec<&'a Statement>;
}

/// Case-insensitive term overlap between the question and each statement's
/// text and triple parts. Stop-words are ignored; ties keep candidate order.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }

    fn score(question_terms: &HashSet<String>, statement: &Statement) -> usize {
        let mut terms = terms(statement.text());
        for triple in statement.triples() {
            terms.extend(terms_of_all([triple.subject(), triple.predicate(), triple.object()]));
        }
        question_terms.intersection(&terms).count()
    }
}

impl StatementMatcher for KeywordMatcher {
    fn select<'a>(
        &self,
        question: &str,
        candidates: &[&'a Statement],
        limit: usize,
    ) -> Vec<&'a Statement> {
        let wanted = terms(question);
        if wanted.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &'a Statement)> = candidates
            .iter()
            .map(|&s| (Self::score(&wanted, s), s))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable: equal scores keep candidate order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, s)| s).collect()
    }
}

/// Lowercased content terms of `text`.
fn terms(text: &str) -> HashSet<String> {
    RE_TERM
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn terms_of_all<'a>(parts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    parts.into_iter().flat_map(terms).collect()
}
