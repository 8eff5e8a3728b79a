//! Per-entity timelines.
//!
//! A timeline lists the statements about one entity that carry temporal
//! metadata, ordered by `created` (falling back to `valid_from`). Statements
//! with neither sort first; ties keep the order the statements were indexed.

use serde::{Deserialize, Serialize};

use crate::statement::{FactType, Statement, TemporalClass};
use crate::temporal::TemporalEvent;

/// One point on an entity's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub statement_id: String,
    pub text: String,
    pub temporal_class: TemporalClass,
    pub fact_type: FactType,
    /// Triples in canonical display form.
    pub triples: Vec<String>,
    pub temporal_event: TemporalEvent,
}

impl TimelineEntry {
    /// Build an entry; `None` when the statement has no temporal event.
    pub fn from_statement(stmt: &Statement) -> Option<Self> {
        let event = stmt.temporal_event()?;
        Some(Self {
            statement_id: stmt.id().to_string(),
            text: stmt.text().to_string(),
            temporal_class: stmt.temporal_class(),
            fact_type: stmt.fact_type(),
            triples: stmt.triples().iter().map(ToString::to_string).collect(),
            temporal_event: event.clone(),
        })
    }
}

/// Build a timeline from statements given in index order.
pub fn build_timeline<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = statements
        .into_iter()
        .filter_map(TimelineEntry::from_statement)
        .collect();
    // `sort_by_key` is stable, so equal keys keep index order.
    entries.sort_by_key(|e| e.temporal_event.sort_key());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::temporal::parse_instant;

    fn stmt(id: &str, event: Option<TemporalEvent>) -> Statement {
        Statement::builder(id, format!("text of {id}"), TemporalClass::Dynamic)
            .triple(Triple::new("TechCorp", "hasCEO", id))
            .maybe_temporal_event(event)
            .build()
            .unwrap()
    }

    fn created(s: &str) -> Option<TemporalEvent> {
        Some(TemporalEvent {
            created: Some(parse_instant(s).unwrap()),
            ..Default::default()
        })
    }

    fn valid_from(s: &str) -> Option<TemporalEvent> {
        Some(TemporalEvent {
            valid_from: Some(parse_instant(s).unwrap()),
            ..Default::default()
        })
    }

    #[test]
    fn skips_statements_without_event() {
        let statements = [stmt("a", None), stmt("b", created("2020-01-01"))];
        let timeline = build_timeline(&statements);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].statement_id, "b");
        assert_eq!(timeline[0].triples, [r#""TechCorp" - "hasCEO" - "b""#]);
    }

    #[test]
    fn orders_by_created_then_valid_from() {
        let statements = [
            stmt("late", created("2024-01-01")),
            stmt("mid", valid_from("2022-01-01")),
            stmt("early", created("2020-01-01")),
            stmt("unbounded", Some(TemporalEvent::always())),
        ];
        let ids: Vec<_> = build_timeline(&statements)
            .into_iter()
            .map(|e| e.statement_id)
            .collect();
        assert_eq!(ids, ["unbounded", "early", "mid", "late"]);
    }

    #[test]
    fn ties_keep_index_order() {
        let statements = [
            stmt("first", created("2021-05-05")),
            stmt("second", valid_from("2021-05-05")),
            stmt("third", created("2021-05-05")),
            stmt("x", Some(TemporalEvent::always())),
            stmt("y", Some(TemporalEvent::always())),
        ];
        let ids: Vec<_> = build_timeline(&statements)
            .into_iter()
            .map(|e| e.statement_id)
            .collect();
        assert_eq!(ids, ["x", "y", "first", "second", "third"]);
    }
}
