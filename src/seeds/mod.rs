//! Seed packs: pre-structured statements for bootstrapping a store.
//!
//! A seed pack is a TOML bundle of statements that already carry their
//! classification, triples and temporal metadata, so no extraction is needed.
//! Packs are applied through the normal ingest workflow, so conflict
//! detection runs exactly as it would for extracted statements.
//!
//! One pack is bundled into the binary: `demo`.

use std::path::Path;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::graph::Triple;
use crate::statement::{FactType, Statement, TemporalClass};
use crate::temporal::{TemporalEvent, parse_instant};

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("seed pack not found: \"{id}\"")]
    #[diagnostic(
        code(tkg::seed::not_found),
        help("Run `tkg seed --list` to see the bundled packs, or pass a path to a seed.toml file.")
    )]
    NotFound { id: String },

    #[error("failed to parse seed pack \"{id}\": {message}")]
    #[diagnostic(
        code(tkg::seed::parse),
        help("Check the seed.toml syntax against data/seeds/demo/seed.toml.")
    )]
    Parse { id: String, message: String },

    #[error("failed to read seed file: {path}")]
    #[diagnostic(code(tkg::seed::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("statement #{index} of seed pack \"{id}\" is invalid: {message}")]
    #[diagnostic(
        code(tkg::seed::invalid_statement),
        help("Dates must be ISO-8601 and valid_from must come before valid_until.")
    )]
    InvalidStatement {
        id: String,
        index: usize,
        message: String,
    },
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

// ── Seed pack data model ────────────────────────────────────────────────

/// A seed pack: TOML-defined statement bundle.
#[derive(Debug, Clone)]
pub struct SeedPack {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub statements: Vec<SeedStatement>,
}

/// A statement in a seed pack. Dates are kept as written until applied.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedStatement {
    pub text: String,
    pub class: TemporalClass,
    #[serde(default)]
    pub fact_type: FactType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub expired: Option<String>,
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub triples: Vec<Triple>,
}

fn default_confidence() -> f64 {
    1.0
}

/// Report after applying a seed pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub id: String,
    pub statements_applied: usize,
    /// Existing statements superseded while applying.
    pub invalidated: usize,
}

impl SeedStatement {
    /// The temporal event described by the date fields, if any is set.
    pub fn temporal_event(&self) -> Result<Option<TemporalEvent>, String> {
        let parse = |field: &Option<String>| {
            field
                .as_deref()
                .map(parse_instant)
                .transpose()
                .map_err(|e| e.to_string())
        };
        let event = TemporalEvent {
            created: parse(&self.created)?,
            expired: parse(&self.expired)?,
            valid_from: parse(&self.valid_from)?,
            valid_until: parse(&self.valid_until)?,
        };
        if event.is_unbounded() {
            return Ok(None);
        }
        event.validate().map_err(|e| e.to_string())?;
        Ok(Some(event))
    }

    /// Build a [`Statement`] under `id`. `pack_id` and `index` only label errors.
    pub fn to_statement(&self, pack_id: &str, index: usize, id: String) -> SeedResult<Statement> {
        let invalid = |message: String| SeedError::InvalidStatement {
            id: pack_id.to_string(),
            index,
            message,
        };
        let event = self.temporal_event().map_err(invalid)?;
        Statement::builder(id, self.text.clone(), self.class)
            .fact_type(self.fact_type)
            .triples(self.triples.iter().cloned())
            .maybe_temporal_event(event)
            .maybe_source(self.source.clone())
            .confidence(self.confidence)
            .build()
            .map_err(|e| invalid(e.to_string()))
    }
}

// ── TOML deserialization helpers ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedToml {
    seed: SeedMeta,
    #[serde(default)]
    statements: Vec<SeedStatement>,
}

#[derive(Debug, Deserialize)]
struct SeedMeta {
    id: String,
    name: String,
    version: String,
    description: String,
}

impl SeedPack {
    /// Parse a pack from TOML.
    pub fn parse(toml_str: &str) -> SeedResult<Self> {
        let parsed: SeedToml = toml::from_str(toml_str).map_err(|e| SeedError::Parse {
            id: "(unknown)".into(),
            message: e.to_string(),
        })?;
        Ok(Self {
            id: parsed.seed.id,
            name: parsed.seed.name,
            version: parsed.seed.version,
            description: parsed.seed.description,
            statements: parsed.statements,
        })
    }

    /// Load a pack from a `seed.toml` on disk.
    pub fn load(path: &Path) -> SeedResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SeedError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// The bundled TechCorp demo pack.
    pub fn demo() -> SeedResult<Self> {
        Self::parse(DEMO_TOML)
    }
}

// ── Bundled seed packs ──────────────────────────────────────────────────

const DEMO_TOML: &str = include_str!("../../data/seeds/demo/seed.toml");

/// All bundled packs that parse.
pub fn bundled() -> Vec<SeedPack> {
    [(DEMO_TOML, "demo")]
        .iter()
        .filter_map(|(toml, id)| match SeedPack::parse(toml) {
            Ok(pack) => Some(pack),
            Err(e) => {
                tracing::warn!(seed = id, "Failed to parse bundled seed: {e}");
                None
            }
        })
        .collect()
}

/// A bundled pack by id.
pub fn find_bundled(id: &str) -> SeedResult<SeedPack> {
    bundled()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| SeedError::NotFound { id: id.to_string() })
}
