//! Knowledge graph primitives: triples, the entity index, timelines, and
//! conflict detection between statements.
//!
//! - [`Triple`]: immutable subject/predicate/object fact fragment
//! - [`index::EntityIndex`]: entity name → statement ids, insertion-ordered
//! - [`timeline`]: per-entity chronological views
//! - [`contradiction`]: decides which existing statements a new one supersedes

pub mod contradiction;
pub mod index;
pub mod timeline;

use serde::{Deserialize, Serialize};

/// A triple (subject, predicate, object) extracted from a statement.
///
/// Fields are private so a triple cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    subject: String,
    predicate: String,
    object: String,
}

impl Triple {
    /// Create a new triple.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// The entity being described.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The relationship or property.
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// The value or target entity.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Same subject and predicate, different object.
    pub fn conflicts_with(&self, other: &Triple) -> bool {
        self.subject == other.subject
            && self.predicate == other.predicate
            && self.object != other.object
    }

    /// Whether `entity` is this triple's subject or object.
    pub fn mentions(&self, entity: &str) -> bool {
        self.subject == entity || self.object == entity
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" - \"{}\" - \"{}\"",
            self.subject, self.predicate, self.object
        )
    }
}
