//! Statements: the atomic records of the temporal knowledge graph.
//!
//! A [`Statement`] couples the original text with its temporal classification,
//! extracted [`Triple`]s, an optional [`TemporalEvent`], provenance, and the
//! ids of statements that superseded it. The [`StatementIdAllocator`] provides
//! thread-safe `stmt_<n>` id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StatementError;
use crate::graph::Triple;
use crate::temporal::TemporalEvent;

/// Result type for statement construction.
pub type StatementResult<T> = std::result::Result<T, StatementError>;

/// Prefix for allocated statement ids.
pub const ID_PREFIX: &str = "stmt_";

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a statement behaves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalClass {
    /// Never changes ("water freezes at zero degrees").
    Atemporal,
    /// Holds from a point onward and does not change afterwards.
    Static,
    /// Evolves over time ("X was CEO from 2019 to 2022").
    Dynamic,
}

impl TemporalClass {
    pub const ALL: [TemporalClass; 3] = [Self::Atemporal, Self::Static, Self::Dynamic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atemporal => "atemporal",
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for TemporalClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TemporalClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atemporal" => Ok(Self::Atemporal),
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown temporal class \"{other}\"")),
        }
    }
}

/// Epistemic kind of a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactType {
    /// Objective, verifiable information.
    #[default]
    Fact,
    /// Subjective viewpoint.
    Opinion,
    /// Future-oriented claim.
    Prediction,
}

impl FactType {
    pub const ALL: [FactType; 3] = [Self::Fact, Self::Opinion, Self::Prediction];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Opinion => "opinion",
            Self::Prediction => "prediction",
        }
    }
}

impl std::fmt::Display for FactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for FactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fact" => Ok(Self::Fact),
            "opinion" => Ok(Self::Opinion),
            "prediction" => Ok(Self::Prediction),
            other => Err(format!("unknown fact type \"{other}\"")),
        }
    }
}

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

fn default_confidence() -> f64 {
    1.0
}

/// A single recorded fact with provenance and temporal metadata.
///
/// Statements are soft-invalidated: superseding statements are appended to
/// `invalidated_by`, but the statement itself is never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    id: String,
    text: String,
    temporal_class: TemporalClass,
    #[serde(default)]
    fact_type: FactType,
    #[serde(default)]
    triples: Vec<Triple>,
    #[serde(default)]
    temporal_event: Option<TemporalEvent>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    invalidated_by: Vec<String>,
}

impl Statement {
    /// Start building a statement.
    pub fn builder(
        id: impl Into<String>,
        text: impl Into<String>,
        temporal_class: TemporalClass,
    ) -> StatementBuilder {
        StatementBuilder {
            statement: Statement {
                id: id.into(),
                text: text.into(),
                temporal_class,
                fact_type: FactType::Fact,
                triples: Vec::new(),
                temporal_event: None,
                source: None,
                confidence: default_confidence(),
                invalidated_by: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn temporal_class(&self) -> TemporalClass {
        self.temporal_class
    }

    pub fn fact_type(&self) -> FactType {
        self.fact_type
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn temporal_event(&self) -> Option<&TemporalEvent> {
        self.temporal_event.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Ids of the statements that superseded this one, in the order they arrived.
    pub fn invalidated_by(&self) -> &[String] {
        &self.invalidated_by
    }

    /// Whether any later statement superseded this one.
    pub fn is_invalidated(&self) -> bool {
        !self.invalidated_by.is_empty()
    }

    /// Validity at `t` is delegated to the temporal event; statements without
    /// one are always valid.
    pub fn is_valid_at(&self, t: DateTime<Utc>) -> bool {
        self.temporal_event
            .as_ref()
            .is_none_or(|event| event.is_valid_at(t))
    }

    /// `created` of the temporal event, if any.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.temporal_event.as_ref().and_then(|e| e.created)
    }

    /// Whether `entity` is the subject or object of any triple.
    pub fn mentions(&self, entity: &str) -> bool {
        self.triples.iter().any(|t| t.mentions(entity))
    }

    /// Whether any triple uses `predicate`.
    pub fn has_predicate(&self, predicate: &str) -> bool {
        self.triples.iter().any(|t| t.predicate() == predicate)
    }

    /// Check the invariants the builder enforces. Used after deserialization.
    pub fn validate(&self) -> StatementResult<()> {
        if self.id.trim().is_empty() {
            return Err(StatementError::EmptyId);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(StatementError::ConfidenceOutOfRange {
                id: self.id.clone(),
                confidence: self.confidence,
            });
        }
        if let Some(event) = &self.temporal_event {
            event.validate()?;
        }
        Ok(())
    }

    /// Record that `by_id` supersedes this statement. Repeated ids are ignored.
    pub(crate) fn mark_invalidated_by(&mut self, by_id: &str) -> bool {
        if self.invalidated_by.iter().any(|id| id == by_id) {
            return false;
        }
        self.invalidated_by.push(by_id.to_string());
        true
    }
}

/// Builder for [`Statement`].
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    statement: Statement,
}

impl StatementBuilder {
    pub fn fact_type(mut self, fact_type: FactType) -> Self {
        self.statement.fact_type = fact_type;
        self
    }

    /// Append one triple.
    pub fn triple(mut self, triple: Triple) -> Self {
        self.statement.triples.push(triple);
        self
    }

    /// Append several triples, keeping their order.
    pub fn triples(mut self, triples: impl IntoIterator<Item = Triple>) -> Self {
        self.statement.triples.extend(triples);
        self
    }

    pub fn temporal_event(mut self, event: TemporalEvent) -> Self {
        self.statement.temporal_event = Some(event);
        self
    }

    pub fn maybe_temporal_event(mut self, event: Option<TemporalEvent>) -> Self {
        self.statement.temporal_event = event;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.statement.source = Some(source.into());
        self
    }

    pub fn maybe_source(mut self, source: Option<String>) -> Self {
        self.statement.source = source;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.statement.confidence = confidence;
        self
    }

    /// Finish the statement, checking id, confidence and validity window.
    pub fn build(self) -> StatementResult<Statement> {
        self.statement.validate()?;
        Ok(self.statement)
    }
}

// ---------------------------------------------------------------------------
// Id allocation
// ---------------------------------------------------------------------------

/// Thread-safe monotonic allocator for `stmt_<n>` ids.
///
/// Safe to share across threads. Call [`observe`](Self::observe) for ids that
/// enter the store from elsewhere (files, callers) so allocation never reuses them.
#[derive(Debug)]
pub struct StatementIdAllocator {
    next: AtomicU64,
}

impl StatementIdAllocator {
    /// Create an allocator that starts from 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create an allocator that resumes from a given number.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{ID_PREFIX}{n}")
    }

    /// Ensure future ids are numbered after `id` if it has the `stmt_<n>` shape.
    pub fn observe(&self, id: &str) {
        if let Some(n) = allocated_number(id) {
            self.next.fetch_max(n.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Number the next allocation would use.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for StatementIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The `<n>` of a `stmt_<n>` id.
pub fn allocated_number(id: &str) -> Option<u64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_instant;

    #[test]
    fn builder_defaults() {
        let stmt = Statement::builder("s1", "Water boils at 100C", TemporalClass::Atemporal)
            .build()
            .unwrap();
        assert_eq!(stmt.fact_type(), FactType::Fact);
        assert!(stmt.triples().is_empty());
        assert!(stmt.temporal_event().is_none());
        assert!((stmt.confidence() - 1.0).abs() < f64::EPSILON);
        assert!(!stmt.is_invalidated());
    }

    #[test]
    fn builder_rejects_bad_confidence() {
        let result = Statement::builder("s1", "x", TemporalClass::Static)
            .confidence(1.5)
            .build();
        assert!(matches!(
            result,
            Err(StatementError::ConfidenceOutOfRange { .. })
        ));
    }

    #[test]
    fn builder_rejects_empty_id() {
        let result = Statement::builder("  ", "x", TemporalClass::Static).build();
        assert!(matches!(result, Err(StatementError::EmptyId)));
    }

    #[test]
    fn builder_rejects_inverted_window() {
        let event = TemporalEvent {
            valid_from: Some(parse_instant("2024-01-01").unwrap()),
            valid_until: Some(parse_instant("2023-01-01").unwrap()),
            ..Default::default()
        };
        let result = Statement::builder("s1", "x", TemporalClass::Dynamic)
            .temporal_event(event)
            .build();
        assert!(matches!(result, Err(StatementError::Temporal(_))));
    }

    #[test]
    fn validity_without_event_is_always_true() {
        let stmt = Statement::builder("s1", "x", TemporalClass::Static)
            .build()
            .unwrap();
        assert!(stmt.is_valid_at(DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn validity_delegates_to_event() {
        let stmt = Statement::builder("s1", "x", TemporalClass::Dynamic)
            .temporal_event(
                TemporalEvent::builder()
                    .valid_until(parse_instant("2020-01-01").unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        assert!(stmt.is_valid_at(parse_instant("2019-06-01").unwrap()));
        assert!(!stmt.is_valid_at(parse_instant("2020-06-01").unwrap()));
    }

    #[test]
    fn invalidation_ignores_repeats() {
        let mut stmt = Statement::builder("s1", "x", TemporalClass::Static)
            .build()
            .unwrap();
        assert!(stmt.mark_invalidated_by("s2"));
        assert!(stmt.mark_invalidated_by("s3"));
        assert!(!stmt.mark_invalidated_by("s2"));
        assert_eq!(stmt.invalidated_by(), ["s2", "s3"]);
    }

    #[test]
    fn classification_parsing() {
        assert_eq!("DYNAMIC".parse::<TemporalClass>(), Ok(TemporalClass::Dynamic));
        assert_eq!(" opinion ".parse::<FactType>(), Ok(FactType::Opinion));
        assert!("sometimes".parse::<TemporalClass>().is_err());
    }

    #[test]
    fn deserialize_applies_defaults() {
        let json = serde_json::json!({
            "id": "s9",
            "text": "TechCorp is based in San Francisco",
            "temporalClass": "atemporal",
        });
        let stmt: Statement = serde_json::from_value(json).unwrap();
        assert_eq!(stmt.fact_type(), FactType::Fact);
        assert!((stmt.confidence() - 1.0).abs() < f64::EPSILON);
        assert!(stmt.invalidated_by().is_empty());
    }

    #[test]
    fn allocator_is_monotonic_and_observes() {
        let alloc = StatementIdAllocator::new();
        assert_eq!(alloc.next_id(), "stmt_1");
        assert_eq!(alloc.next_id(), "stmt_2");

        alloc.observe("stmt_41");
        assert_eq!(alloc.next_id(), "stmt_42");

        alloc.observe("stmt_7");
        alloc.observe("doc_3");
        assert_eq!(alloc.next_id(), "stmt_43");
    }

    #[test]
    fn allocated_number_shape() {
        assert_eq!(allocated_number("stmt_12"), Some(12));
        assert_eq!(allocated_number("stmt_x"), None);
        assert_eq!(allocated_number("report_1"), None);
    }
}
