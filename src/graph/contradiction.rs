//! Conflict detection: decides which existing statements a new one supersedes.
//!
//! Two statements conflict when some pair of their triples shares subject and
//! predicate but differs in object, both statements carry a `created` instant,
//! and the new statement was created strictly later. The check is asymmetric
//! in time: call it as `(incoming, existing)`, never the reverse.
//!
//! Resolution is pairwise only. If A supersedes B and C later supersedes A,
//! C must conflict with B on its own to supersede B as well.

use serde::{Deserialize, Serialize};

use crate::graph::Triple;
use crate::statement::Statement;

// ---------------------------------------------------------------------------
// Conflict types
// ---------------------------------------------------------------------------

/// A detected conflict between an incoming and an existing statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// The statement being superseded.
    pub existing_id: String,
    /// First conflicting triple of the existing statement.
    pub existing: Triple,
    /// The incoming triple that contradicts it.
    pub incoming: Triple,
}

// ---------------------------------------------------------------------------
// Checking
// ---------------------------------------------------------------------------

/// Find the first triple pair on which `incoming` supersedes `existing`.
///
/// Returns `None` when the statements share an id, when either lacks a
/// `created` instant, when `incoming` is not strictly newer, or when no
/// triple pair conflicts.
pub fn find_conflict(incoming: &Statement, existing: &Statement) -> Option<Conflict> {
    if incoming.id() == existing.id() {
        return None;
    }

    let (new_created, old_created) = (incoming.created()?, existing.created()?);
    if new_created <= old_created {
        return None;
    }

    incoming.triples().iter().find_map(|new_t| {
        existing
            .triples()
            .iter()
            .find(|old_t| new_t.conflicts_with(old_t))
            .map(|old_t| Conflict {
                existing_id: existing.id().to_string(),
                existing: old_t.clone(),
                incoming: new_t.clone(),
            })
    })
}

/// Whether `incoming` supersedes `existing`.
pub fn conflicts(incoming: &Statement, existing: &Statement) -> bool {
    find_conflict(incoming, existing).is_some()
}

/// Compares a new statement against a collection of existing statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidationResolver;

impl InvalidationResolver {
    pub fn new() -> Self {
        Self
    }

    /// Every conflict `incoming` has with `existing`, in iteration order.
    pub fn resolve<'a>(
        &self,
        incoming: &Statement,
        existing: impl IntoIterator<Item = &'a Statement>,
    ) -> Vec<Conflict> {
        let conflicts: Vec<Conflict> = existing
            .into_iter()
            .filter_map(|old| find_conflict(incoming, old))
            .collect();

        for c in &conflicts {
            tracing::debug!(
                incoming = incoming.id(),
                superseded = %c.existing_id,
                existing_triple = %c.existing,
                incoming_triple = %c.incoming,
                "statement superseded"
            );
        }
        conflicts
    }

    /// Ids of the existing statements `incoming` supersedes.
    pub fn superseded_ids<'a>(
        &self,
        incoming: &Statement,
        existing: impl IntoIterator<Item = &'a Statement>,
    ) -> Vec<String> {
        self.resolve(incoming, existing)
            .into_iter()
            .map(|c| c.existing_id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
