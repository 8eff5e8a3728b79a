//! The knowledge store: statements plus the entity index.
//!
//! [`KnowledgeStore`] owns every statement by id and the inverted
//! [`EntityIndex`]. Both are updated together on every insertion, so every id
//! in the index names a stored statement.
//!
//! [`durable`] persists a store as versioned JSON and rebuilds the index on load.

pub mod durable;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::index::EntityIndex;
use crate::graph::timeline::{TimelineEntry, build_timeline};
use crate::statement::{FactType, Statement, TemporalClass};

/// In-memory collection of statements with an entity index.
///
/// Not internally synchronized: callers sharing a store across threads must
/// guard it with one lock (see [`Engine`](crate::engine::Engine)).
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    statements: HashMap<String, Statement>,
    /// Statement ids in first-insertion order.
    order: Vec<String>,
    entities: EntityIndex,
}

impl KnowledgeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a statement by id, indexing its subjects and objects.
    ///
    /// Overwrites keep the statement's original position. Entities the old
    /// version mentioned and the new one does not lose the id, so the index
    /// always matches the stored triples. Returns `true` if the id was new.
    pub fn add_statement(&mut self, statement: Statement) -> bool {
        let id = statement.id().to_string();
        if let Some(old) = self.statements.get(&id) {
            let dropped: Vec<String> = old
                .triples()
                .iter()
                .flat_map(|t| [t.subject(), t.object()])
                .filter(|entity| !statement.mentions(entity))
                .map(str::to_string)
                .collect();
            for entity in &dropped {
                self.entities.remove(entity, &id);
            }
        }
        self.entities.index_triples(&id, statement.triples());

        let is_new = self.statements.insert(id.clone(), statement).is_none();
        if is_new {
            self.order.push(id);
        } else {
            tracing::debug!(statement = %id, "statement overwritten");
        }
        is_new
    }

    /// Look up a statement by id.
    pub fn get(&self, id: &str) -> Option<&Statement> {
        self.statements.get(id)
    }

    /// Whether a statement with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    /// All statements in insertion order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.order.iter().filter_map(|id| self.statements.get(id))
    }

    /// Statements mentioning `entity` as subject or object, in index order.
    pub fn statements_for_entity(&self, entity: &str) -> Vec<&Statement> {
        self.entities
            .ids_for(entity)
            .iter()
            .filter_map(|id| self.statements.get(id))
            .collect()
    }

    /// Statements valid at `t`, in insertion order.
    pub fn valid_statements_at(&self, t: DateTime<Utc>) -> Vec<&Statement> {
        self.statements().filter(|s| s.is_valid_at(t)).collect()
    }

    /// Mark `target_id` as superseded by `by_id`. Unknown targets are ignored.
    ///
    /// Returns `true` if the target existed and gained a new link.
    pub fn invalidate(&mut self, target_id: &str, by_id: &str) -> bool {
        match self.statements.get_mut(target_id) {
            Some(stmt) => stmt.mark_invalidated_by(by_id),
            None => {
                tracing::debug!(target = target_id, by = by_id, "invalidate: unknown statement");
                false
            }
        }
    }

    /// Chronological view of the statements about `entity` that carry
    /// temporal metadata.
    pub fn timeline_for_entity(&self, entity: &str) -> Vec<TimelineEntry> {
        build_timeline(self.statements_for_entity(entity))
    }

    /// Entity names in first-seen order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.entities()
    }

    /// The entity index.
    pub fn entity_index(&self) -> &EntityIndex {
        &self.entities
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the store holds no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Summary counts over the whole store.
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total_statements: self.len(),
            total_entities: self.entities.len(),
            temporal_classes: TemporalClass::ALL.iter().map(|&c| (c, 0)).collect(),
            fact_types: FactType::ALL.iter().map(|&f| (f, 0)).collect(),
            with_temporal_events: 0,
            invalidated: 0,
        };

        for stmt in self.statements() {
            if let Some(slot) = stats
                .temporal_classes
                .iter_mut()
                .find(|(c, _)| *c == stmt.temporal_class())
            {
                slot.1 += 1;
            }
            if let Some(slot) = stats
                .fact_types
                .iter_mut()
                .find(|(f, _)| *f == stmt.fact_type())
            {
                slot.1 += 1;
            }
            if stmt.temporal_event().is_some() {
                stats.with_temporal_events += 1;
            }
            if stmt.is_invalidated() {
                stats.invalidated += 1;
            }
        }
        stats
    }
}

/// Summary statistics for a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_statements: usize,
    pub total_entities: usize,
    /// Count per temporal class, in declaration order.
    pub temporal_classes: Vec<(TemporalClass, usize)>,
    /// Count per fact type, in declaration order.
    pub fact_types: Vec<(FactType, usize)>,
    pub with_temporal_events: usize,
    pub invalidated: usize,
}

impl StoreStats {
    /// Count for one temporal class.
    pub fn class_count(&self, class: TemporalClass) -> usize {
        self.temporal_classes
            .iter()
            .find(|(c, _)| *c == class)
            .map_or(0, |(_, n)| *n)
    }

    /// Count for one fact type.
    pub fn fact_type_count(&self, fact_type: FactType) -> usize {
        self.fact_types
            .iter()
            .find(|(f, _)| *f == fact_type)
            .map_or(0, |(_, n)| *n)
    }
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Statements:       {}", self.total_statements)?;
        writeln!(f, "Entities:         {}", self.total_entities)?;
        writeln!(f, "With time data:   {}", self.with_temporal_events)?;
        writeln!(f, "Invalidated:      {}", self.invalidated)?;
        for (class, n) in &self.temporal_classes {
            writeln!(f, "  {class:<10} {n}")?;
        }
        for (fact_type, n) in &self.fact_types {
            writeln!(f, "  {fact_type:<10} {n}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::temporal::{TemporalEvent, parse_instant};

    fn at(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    fn stmt(id: &str, triples: &[(&str, &str, &str)]) -> Statement {
        Statement::builder(id, format!("statement {id}"), TemporalClass::Static)
            .triples(triples.iter().map(|(s, p, o)| Triple::new(*s, *p, *o)))
            .build()
            .unwrap()
    }

    #[test]
    fn add_indexes_subject_and_object() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s1", &[("A", "hasRole", "CEO")]));

        let for_a = store.statements_for_entity("A");
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].id(), "s1");
        assert_eq!(store.statements_for_entity("CEO")[0].id(), "s1");
        assert!(store.statements_for_entity("hasRole").is_empty());
    }

    #[test]
    fn readding_overwrites_without_duplicating_index() {
        let mut store = KnowledgeStore::new();
        assert!(store.add_statement(stmt("s1", &[("A", "hasRole", "CEO")])));

        let replacement = Statement::builder("s1", "rewritten", TemporalClass::Dynamic)
            .triple(Triple::new("A", "hasRole", "CEO"))
            .build()
            .unwrap();
        assert!(!store.add_statement(replacement));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("s1").unwrap().text(), "rewritten");
        assert_eq!(store.entity_index().ids_for("A"), ["s1"]);
        assert_eq!(store.statements_for_entity("A").len(), 1);
    }

    #[test]
    fn overwrite_with_new_triples_reindexes() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s1", &[("A", "r", "B")]));
        store.add_statement(stmt("s2", &[("A", "r", "E")]));
        store.add_statement(stmt("s1", &[("C", "r", "D")]));

        assert!(store.statements_for_entity("B").is_empty());
        let for_a: Vec<_> = store
            .statements_for_entity("A")
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(for_a, ["s2"]);
        assert_eq!(store.statements_for_entity("C")[0].id(), "s1");

        let entities: Vec<_> = store.entities().collect();
        assert_eq!(entities, ["A", "E", "C", "D"]);

        // Overwriting with no triples unindexes the statement entirely.
        store.add_statement(stmt("s1", &[]));
        assert!(store.statements_for_entity("C").is_empty());
        assert!(store.contains("s1"));
    }

    #[test]
    fn statement_without_triples_is_stored_but_unindexed() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s1", &[]));
        assert!(store.contains("s1"));
        assert_eq!(store.entities().count(), 0);
    }

    #[test]
    fn entity_lookup_keeps_insertion_order() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s2", &[("TechCorp", "hasCEO", "John")]));
        store.add_statement(stmt("s1", &[("Jane", "worksFor", "TechCorp")]));
        let ids: Vec<_> = store
            .statements_for_entity("TechCorp")
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, ["s2", "s1"]);
    }

    #[test]
    fn unknown_entity_is_empty() {
        let store = KnowledgeStore::new();
        assert!(store.statements_for_entity("Nobody").is_empty());
        assert!(store.timeline_for_entity("Nobody").is_empty());
    }

    #[test]
    fn invalidate_unknown_is_noop() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s1", &[("A", "r", "B")]));
        assert!(!store.invalidate("missing", "s1"));
        assert!(!store.get("s1").unwrap().is_invalidated());
    }

    #[test]
    fn invalidate_keeps_statement_queryable() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s1", &[("A", "r", "B")]));
        assert!(store.invalidate("s1", "s2"));
        assert_eq!(store.get("s1").unwrap().invalidated_by(), ["s2"]);
        assert_eq!(store.statements_for_entity("A").len(), 1);
    }

    #[test]
    fn valid_statements_filters_by_instant() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("always", &[("A", "r", "B")]));
        store.add_statement(
            Statement::builder("old", "old", TemporalClass::Dynamic)
                .temporal_event(
                    TemporalEvent::builder()
                        .valid_from(at("2010-01-01"))
                        .valid_until(at("2015-01-01"))
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap(),
        );

        let ids: Vec<_> = store
            .valid_statements_at(at("2020-01-01"))
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, ["always"]);
        assert_eq!(store.valid_statements_at(at("2012-01-01")).len(), 2);
    }

    #[test]
    fn stats_counts() {
        let mut store = KnowledgeStore::new();
        store.add_statement(stmt("s1", &[("A", "r", "B")]));
        store.add_statement(
            Statement::builder("s2", "x", TemporalClass::Dynamic)
                .fact_type(FactType::Prediction)
                .triple(Triple::new("A", "r", "C"))
                .temporal_event(TemporalEvent::always())
                .build()
                .unwrap(),
        );
        store.invalidate("s1", "s2");

        let stats = store.stats();
        assert_eq!(stats.total_statements, 2);
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.class_count(TemporalClass::Static), 1);
        assert_eq!(stats.class_count(TemporalClass::Dynamic), 1);
        assert_eq!(stats.fact_type_count(FactType::Prediction), 1);
        assert_eq!(stats.with_temporal_events, 1);
        assert_eq!(stats.invalidated, 1);
        assert!(stats.to_string().contains("Statements:       2"));
    }
}
