//! Rich diagnostic error types for the temporal knowledge graph.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Lookup misses (unknown entity, unknown statement id) are deliberately *not*
//! represented here: they return empty results or are no-ops.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::extract::llm::LlmError;
use crate::paths::PathError;
use crate::seeds::SeedError;
use crate::temporal::TemporalError;

/// Top-level error type for the temporal knowledge graph.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TkgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Seed(#[from] SeedError),
}

// ---------------------------------------------------------------------------
// Statement errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StatementError {
    #[error("statement id must not be empty")]
    #[diagnostic(
        code(tkg::statement::empty_id),
        help(
            "Every statement needs a non-empty identifier. Let the engine allocate one \
             (`stmt_<n>`) or pass an explicit id."
        )
    )]
    EmptyId,

    #[error("confidence {confidence} for statement \"{id}\" is outside [0, 1]")]
    #[diagnostic(
        code(tkg::statement::confidence_range),
        help("Confidence is a probability-like score. Clamp it to the range 0.0..=1.0.")
    )]
    ConfidenceOutOfRange { id: String, confidence: f64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Temporal(#[from] TemporalError),
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error("I/O error on {path}")]
    #[diagnostic(
        code(tkg::persist::io),
        help(
            "A filesystem operation failed. Check that the file exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store file is not valid JSON: {message}")]
    #[diagnostic(
        code(tkg::persist::syntax),
        help("The store file is corrupted or was not written by this tool. Restore it from a backup.")
    )]
    Syntax { message: String },

    #[error("unsupported store format version {found} (this build reads up to {supported})")]
    #[diagnostic(
        code(tkg::persist::version),
        help("The store was written by a newer release. Upgrade before loading it.")
    )]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("store file is missing the top-level \"{field}\" field")]
    #[diagnostic(
        code(tkg::persist::missing_section),
        help("A store file must contain a \"statements\" object. Nothing was loaded.")
    )]
    MissingSection { field: String },

    #[error("statement \"{statement_id}\" is missing required field \"{field}\"")]
    #[diagnostic(
        code(tkg::persist::missing_field),
        help("Every statement record needs `id`, `text` and `temporalClass`. Nothing was loaded.")
    )]
    MissingField { statement_id: String, field: String },

    #[error("statement \"{statement_id}\" is invalid: {message}")]
    #[diagnostic(
        code(tkg::persist::invalid_record),
        help("Fix the record by hand or remove it from the file. Nothing was loaded.")
    )]
    InvalidRecord {
        statement_id: String,
        message: String,
    },

    #[error("statement stored under key \"{key}\" declares id \"{id}\"")]
    #[diagnostic(
        code(tkg::persist::id_mismatch),
        help("The map key and the record's `id` must agree. Nothing was loaded.")
    )]
    IdMismatch { key: String, id: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(tkg::persist::serialize),
        help("Failed to encode the store as JSON. This is a bug; please report it.")
    )]
    Serialize { message: String },
}

/// Convenience alias for functions returning temporal-kg results.
pub type TkgResult<T> = std::result::Result<T, TkgError>;
