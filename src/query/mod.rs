//! Query planning over a [`KnowledgeStore`].
//!
//! A [`TemporalQuery`] combines any of: an entity, a point in time, a time
//! range, a predicate filter and a free-form question. The planner routes it:
//!
//! - **entity** given: the entity's statements, narrowed by `at`, range and
//!   predicate; the entity's timeline is attached.
//! - otherwise **range**, `at` or predicate given: a scan over all statements
//!   with the same filters.
//! - otherwise a **question** alone: the [`StatementMatcher`] picks up to
//!   `top_n` statements.
//!
//! If a question is present, the first `top_n` selected statements are handed
//! to the [`Summarizer`] and its reply becomes the [`Answer`].

pub mod matcher;
pub mod range;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::{Summarizer, SupportingFact};
use crate::graph::timeline::TimelineEntry;
use crate::statement::Statement;
use crate::store::KnowledgeStore;

use self::matcher::{KeywordMatcher, StatementMatcher};
use self::range::TimeRange;

/// Default number of statements handed to the summarizer.
pub const DEFAULT_TOP_N: usize = 10;

// ---------------------------------------------------------------------------
// Query and result types
// ---------------------------------------------------------------------------

/// A request against the store. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalQuery {
    pub entity: Option<String>,
    pub predicate: Option<String>,
    pub at: Option<DateTime<Utc>>,
    pub range: Option<TimeRange>,
    pub question: Option<String>,
}

impl TemporalQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn at(mut self, t: DateTime<Utc>) -> Self {
        self.at = Some(t);
        self
    }

    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    fn has_filters(&self) -> bool {
        self.range.is_some() || self.at.is_some() || self.predicate.is_some()
    }

    fn accepts(&self, stmt: &Statement) -> bool {
        self.at.is_none_or(|t| stmt.is_valid_at(t))
            && self.range.is_none_or(|r| r.overlaps(stmt))
            && self.predicate.as_deref().is_none_or(|p| stmt.has_predicate(p))
    }
}

/// Outcome of the question part of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "camelCase")]
pub enum Answer {
    /// Prose returned by the summarizer.
    Text(String),
    /// Nothing matched, so the summarizer was not called.
    NoRelevantFacts,
    /// The summarizer failed; carries the failure message.
    Failed(String),
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::NoRelevantFacts => f.write_str("No relevant information found in the knowledge graph."),
            Self::Failed(_) => f.write_str("Could not generate an answer from the knowledge graph."),
        }
    }
}

/// What a query returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub statements: Vec<Statement>,
    pub timeline: Vec<TimelineEntry>,
    /// `None` when the query asked no question.
    pub answer: Option<Answer>,
    /// Mean confidence of the matched statements that are still current;
    /// 0.0 when there are none.
    pub confidence: f64,
}

/// Statements and timeline chosen for a query, before any summarization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub statements: Vec<Statement>,
    pub timeline: Vec<TimelineEntry>,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Routes queries to store lookups and the summarizer.
pub struct QueryPlanner {
    top_n: usize,
    matcher: Box<dyn StatementMatcher + Send + Sync>,
}

impl QueryPlanner {
    /// A planner using [`KeywordMatcher`].
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            matcher: Box::new(KeywordMatcher::new()),
        }
    }

    /// Replace the free-form matcher.
    pub fn with_matcher(mut self, matcher: impl StatementMatcher + Send + Sync + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Choose statements (and the timeline) for `query`. Reads only.
    pub fn select(&self, store: &KnowledgeStore, query: &TemporalQuery) -> Selection {
        if let Some(entity) = query.entity.as_deref() {
            let statements = store
                .statements_for_entity(entity)
                .into_iter()
                .filter(|s| query.accepts(s))
                .cloned()
                .collect::<Vec<_>>();
            tracing::debug!(entity, matched = statements.len(), "entity query");
            return Selection {
                statements,
                timeline: store.timeline_for_entity(entity),
            };
        }

        if query.has_filters() {
            let statements = store
                .statements()
                .filter(|s| query.accepts(s))
                .cloned()
                .collect::<Vec<_>>();
            tracing::debug!(
                range = ?query.range.map(|r| r.to_string()),
                matched = statements.len(),
                "scan query"
            );
            return Selection {
                statements,
                timeline: Vec::new(),
            };
        }

        if let Some(question) = query.question.as_deref() {
            let candidates: Vec<&Statement> = store.statements().collect();
            let statements = self
                .matcher
                .select(question, &candidates, self.top_n)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>();
            tracing::debug!(matched = statements.len(), "free-form query");
            return Selection {
                statements,
                timeline: Vec::new(),
            };
        }

        Selection::default()
    }

    /// Ask the summarizer about the first `top_n` selected statements.
    ///
    /// Never fails: an empty selection skips the call, and a summarizer error
    /// becomes [`Answer::Failed`].
    pub fn answer(&self, summarizer: &dyn Summarizer, question: &str, statements: &[Statement]) -> Answer {
        let facts: Vec<SupportingFact> = statements
            .iter()
            .take(self.top_n)
            .map(SupportingFact::from_statement)
            .collect();
        if facts.is_empty() {
            return Answer::NoRelevantFacts;
        }

        match summarizer.answer(question, &facts) {
            Ok(text) => Answer::Text(text.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, facts = facts.len(), "summarizer failed");
                Answer::Failed(e.to_string())
            }
        }
    }

    /// Assemble the final result from a selection.
    pub fn finish(&self, summarizer: &dyn Summarizer, query: &TemporalQuery, selection: Selection) -> QueryResult {
        let answer = query
            .question
            .as_deref()
            .map(|q| self.answer(summarizer, q, &selection.statements));
        QueryResult {
            confidence: mean_confidence(&selection.statements),
            statements: selection.statements,
            timeline: selection.timeline,
            answer,
        }
    }

    /// Select and answer in one step.
    pub fn execute(
        &self,
        store: &KnowledgeStore,
        summarizer: &dyn Summarizer,
        query: &TemporalQuery,
    ) -> QueryResult {
        let selection = self.select(store, query);
        self.finish(summarizer, query, selection)
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl std::fmt::Debug for QueryPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlanner")
            .field("top_n", &self.top_n)
            .finish_non_exhaustive()
    }
}

fn mean_confidence(statements: &[Statement]) -> f64 {
    let current: Vec<f64> = statements
        .iter()
        .filter(|s| !s.is_invalidated())
        .map(Statement::confidence)
        .collect();
    if current.is_empty() {
        0.0
    } else {
        current.iter().sum::<f64>() / current.len() as f64
    }
}
