//! Inverted entity index: entity name → ids of statements mentioning it.
//!
//! An entity is mentioned when it is the subject or object of any triple.
//! Buckets keep insertion order and suppress duplicates. Invalidation never
//! removes entries, so superseded statements stay reachable by entity. Only an
//! overwrite that drops an entity from a statement's triples removes one.

use std::collections::{HashMap, HashSet};

use super::Triple;

/// Insertion-ordered, duplicate-free list of statement ids.
#[derive(Debug, Clone, Default)]
struct Bucket {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl Bucket {
    fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.ids.push(id.to_string());
        true
    }

    fn remove(&mut self, id: &str) -> bool {
        if !self.seen.remove(id) {
            return false;
        }
        self.ids.retain(|x| x != id);
        true
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Entity name → statement ids.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    buckets: HashMap<String, Bucket>,
    /// Entity names in first-seen order.
    order: Vec<String>,
}

impl EntityIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `statement_id` under one entity. Returns `false` if it was
    /// already present.
    pub fn insert(&mut self, entity: &str, statement_id: &str) -> bool {
        if !self.buckets.contains_key(entity) {
            self.order.push(entity.to_string());
        }
        self.buckets
            .entry(entity.to_string())
            .or_default()
            .insert(statement_id)
    }

    /// Index every subject and object of `triples` under `statement_id`.
    pub fn index_triples(&mut self, statement_id: &str, triples: &[Triple]) {
        for triple in triples {
            self.insert(triple.subject(), statement_id);
            self.insert(triple.object(), statement_id);
        }
    }

    /// Drop `statement_id` from one entity's bucket. An emptied bucket is
    /// removed along with the entity. Returns `false` if it was not present.
    pub fn remove(&mut self, entity: &str, statement_id: &str) -> bool {
        let Some(bucket) = self.buckets.get_mut(entity) else {
            return false;
        };
        if !bucket.remove(statement_id) {
            return false;
        }
        if bucket.is_empty() {
            self.buckets.remove(entity);
            self.order.retain(|e| e != entity);
        }
        true
    }

    /// Statement ids for an entity, in insertion order. Unknown entities
    /// yield an empty slice.
    pub fn ids_for(&self, entity: &str) -> &[String] {
        self.buckets
            .get(entity)
            .map(|b| b.ids.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the entity has any statements.
    pub fn contains(&self, entity: &str) -> bool {
        self.buckets.contains_key(entity)
    }

    /// Entity names in first-seen order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(entity, ids)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order
            .iter()
            .map(|e| (e.as_str(), self.ids_for(e)))
    }

    /// Number of distinct entities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no entity has been indexed.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
