//! JSON persistence for a [`KnowledgeStore`].
//!
//! Layout (format version 1):
//!
//! ```json
//! {
//!   "version": 1,
//!   "statements": { "<id>": { "id": "...", "text": "...", "temporalClass": "static", ... } },
//!   "entities": { "<entity>": ["<id>", ...] },
//!   "savedAt": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! Loading validates every record and rebuilds the entity index by re-adding
//! each statement. The persisted `entities` map is only compared against the
//! rebuilt index; it is never trusted. Files without `version` are read as v1.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::PersistError;
use crate::graph::index::EntityIndex;
use crate::statement::Statement;

use super::KnowledgeStore;

/// Result type for persistence operations.
pub type PersistResult<T> = std::result::Result<T, PersistError>;

/// Newest format version this build writes and reads.
pub const FORMAT_VERSION: u64 = 1;

/// Fields every statement record must carry (non-null).
const REQUIRED_FIELDS: [&str; 3] = ["id", "text", "temporalClass"];
/// Fields every triple must carry.
const TRIPLE_FIELDS: [&str; 3] = ["subject", "predicate", "object"];

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Statements keyed by id, in store insertion order.
struct OrderedStatements<'a>(&'a KnowledgeStore);

impl Serialize for OrderedStatements<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for stmt in self.0.statements() {
            map.serialize_entry(stmt.id(), stmt)?;
        }
        map.end()
    }
}

/// Entity buckets in first-seen order.
struct OrderedEntities<'a>(&'a EntityIndex);

impl Serialize for OrderedEntities<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (entity, ids) in self.0.iter() {
            map.serialize_entry(entity, ids)?;
        }
        map.end()
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    version: u64,
    statements: OrderedStatements<'a>,
    entities: OrderedEntities<'a>,
    saved_at: DateTime<Utc>,
}

/// Encode a store as pretty-printed JSON, stamped with `saved_at`.
pub fn to_json(store: &KnowledgeStore, saved_at: DateTime<Utc>) -> PersistResult<String> {
    let snapshot = Snapshot {
        version: FORMAT_VERSION,
        statements: OrderedStatements(store),
        entities: OrderedEntities(store.entity_index()),
        saved_at,
    };
    serde_json::to_string_pretty(&snapshot).map_err(|e| PersistError::Serialize {
        message: e.to_string(),
    })
}

/// Write a store to `path`, replacing any existing file.
///
/// The JSON goes to a sibling temporary file first and is renamed into place,
/// so a failed write leaves the previous file intact.
pub fn save(store: &KnowledgeStore, path: &Path) -> PersistResult<()> {
    let json = to_json(store, Utc::now())?;
    let io_err = |source| PersistError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;

    tracing::info!(
        path = %path.display(),
        statements = store.len(),
        entities = store.entity_index().len(),
        "store saved"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Decode a store from JSON.
///
/// Fails on the first malformed record; no partially populated store is
/// ever returned.
pub fn from_json(json: &str) -> PersistResult<KnowledgeStore> {
    let doc: Value = serde_json::from_str(json).map_err(|e| PersistError::Syntax {
        message: e.to_string(),
    })?;
    let root = doc.as_object().ok_or_else(|| PersistError::Syntax {
        message: "top level must be a JSON object".into(),
    })?;

    check_version(root)?;

    let records = root
        .get("statements")
        .and_then(Value::as_object)
        .ok_or_else(|| PersistError::MissingSection {
            field: "statements".into(),
        })?;

    let mut store = KnowledgeStore::new();
    for (key, record) in records {
        store.add_statement(decode_record(key, record)?);
    }

    if let Some(persisted) = root.get("entities").and_then(Value::as_object) {
        let drift = index_drift(persisted, store.entity_index());
        if drift > 0 {
            tracing::warn!(
                entities = drift,
                "persisted entity index disagrees with statements; using rebuilt index"
            );
        }
    }

    Ok(store)
}

/// Read a store from `path`.
pub fn load(path: &Path) -> PersistResult<KnowledgeStore> {
    let json = std::fs::read_to_string(path).map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let store = from_json(&json)?;
    tracing::info!(
        path = %path.display(),
        statements = store.len(),
        entities = store.entity_index().len(),
        "store loaded"
    );
    Ok(store)
}

fn check_version(root: &Map<String, Value>) -> PersistResult<()> {
    match root.get("version") {
        None => {
            tracing::debug!("store file has no version; reading as legacy v1");
            Ok(())
        }
        Some(v) => {
            let found = v.as_u64().ok_or_else(|| PersistError::Syntax {
                message: format!("\"version\" must be a non-negative integer, got {v}"),
            })?;
            if found > FORMAT_VERSION {
                return Err(PersistError::UnsupportedVersion {
                    found,
                    supported: FORMAT_VERSION,
                });
            }
            Ok(())
        }
    }
}

fn decode_record(key: &str, record: &Value) -> PersistResult<Statement> {
    let fields = record.as_object().ok_or_else(|| PersistError::InvalidRecord {
        statement_id: key.to_string(),
        message: "record must be a JSON object".into(),
    })?;

    for field in REQUIRED_FIELDS {
        if fields.get(field).is_none_or(Value::is_null) {
            return Err(PersistError::MissingField {
                statement_id: key.to_string(),
                field: field.to_string(),
            });
        }
    }

    if let Some(triples) = fields.get("triples").and_then(Value::as_array) {
        for (i, triple) in triples.iter().enumerate() {
            for field in TRIPLE_FIELDS {
                if triple.get(field).is_none_or(Value::is_null) {
                    return Err(PersistError::MissingField {
                        statement_id: key.to_string(),
                        field: format!("triples[{i}].{field}"),
                    });
                }
            }
        }
    }

    let statement: Statement =
        serde_json::from_value(record.clone()).map_err(|e| PersistError::InvalidRecord {
            statement_id: key.to_string(),
            message: e.to_string(),
        })?;

    if statement.id() != key {
        return Err(PersistError::IdMismatch {
            key: key.to_string(),
            id: statement.id().to_string(),
        });
    }

    statement
        .validate()
        .map_err(|e| PersistError::InvalidRecord {
            statement_id: key.to_string(),
            message: e.to_string(),
        })?;

    Ok(statement)
}

/// Number of entities whose persisted bucket differs from the rebuilt one.
fn index_drift(persisted: &Map<String, Value>, rebuilt: &EntityIndex) -> usize {
    let mut drift = 0;
    for (entity, ids) in rebuilt.iter() {
        let matches = persisted
            .get(entity)
            .and_then(Value::as_array)
            .is_some_and(|stored| {
                stored.len() == ids.len()
                    && stored.iter().zip(ids).all(|(a, b)| a.as_str() == Some(b.as_str()))
            });
        if !matches {
            drift += 1;
        }
    }
    drift + persisted.keys().filter(|e| !rebuilt.contains(e)).count()
}
