//! Temporal events: bitemporal validity descriptors for statements.
//!
//! A [`TemporalEvent`] carries four optional instants:
//!
//! - **created**: when the statement was recorded (transaction time)
//! - **expired**: hard cutoff after which the statement no longer holds
//! - **valid_from**: start of the validity window (valid time)
//! - **valid_until**: exclusive end of the validity window
//!
//! An event with every field unset is valid at every instant.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors specific to temporal metadata.
#[derive(Debug, Error, Diagnostic)]
pub enum TemporalError {
    #[error("validity window is inverted: valid_from {valid_from} is not before valid_until {valid_until}")]
    #[diagnostic(
        code(tkg::temporal::inverted_window),
        help(
            "A statement's validity window is half-open [valid_from, valid_until). \
             Swap the two instants or drop one of them."
        )
    )]
    InvertedWindow {
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    },

    #[error("cannot parse \"{input}\" as an instant")]
    #[diagnostic(
        code(tkg::temporal::unparseable_instant),
        help(
            "Use ISO-8601: `2024-01-01`, `2024-01-01T09:30:00` or \
             `2024-01-01T09:30:00Z` (offsets are converted to UTC)."
        )
    )]
    UnparseableInstant { input: String },
}

/// Result type for temporal operations.
pub type TemporalResult<T> = std::result::Result<T, TemporalError>;

// ---------------------------------------------------------------------------
// Instant parsing
// ---------------------------------------------------------------------------

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 (with offset), naive date-times (taken as UTC) and bare
/// dates (midnight UTC).
pub fn parse_instant(input: &str) -> TemporalResult<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(TemporalError::UnparseableInstant {
        input: input.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Temporal event
// ---------------------------------------------------------------------------

/// Four-timestamp validity descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalEvent {
    /// When the statement was recorded.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Hard expiry.
    #[serde(default)]
    pub expired: Option<DateTime<Utc>>,
    /// Inclusive start of validity.
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    /// Exclusive end of validity.
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl TemporalEvent {
    /// An event with no bounds: valid at every instant.
    pub fn always() -> Self {
        Self::default()
    }

    /// Start building an event; `build()` validates the window.
    pub fn builder() -> TemporalEventBuilder {
        TemporalEventBuilder::default()
    }

    /// Whether the statement holds at instant `t`.
    ///
    /// `t` must be at or after `valid_from`, strictly before `valid_until`,
    /// and strictly before `expired`, for whichever of those are set.
    pub fn is_valid_at(&self, t: DateTime<Utc>) -> bool {
        if self.valid_from.is_some_and(|from| t < from) {
            return false;
        }
        if self.valid_until.is_some_and(|until| t >= until) {
            return false;
        }
        if self.expired.is_some_and(|exp| t >= exp) {
            return false;
        }
        true
    }

    /// Reject windows where `valid_from >= valid_until`.
    pub fn validate(&self) -> TemporalResult<()> {
        match (self.valid_from, self.valid_until) {
            (Some(valid_from), Some(valid_until)) if valid_from >= valid_until => {
                Err(TemporalError::InvertedWindow {
                    valid_from,
                    valid_until,
                })
            }
            _ => Ok(()),
        }
    }

    /// `valid_from`, falling back to `created`.
    pub fn effective_start(&self) -> Option<DateTime<Utc>> {
        self.valid_from.or(self.created)
    }

    /// `valid_until`, falling back to `expired`.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.valid_until.or(self.expired)
    }

    /// Timeline ordering key: `created`, else `valid_from`, else the earliest
    /// representable instant.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.created
            .or(self.valid_from)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether every field is unset.
    pub fn is_unbounded(&self) -> bool {
        self.created.is_none()
            && self.expired.is_none()
            && self.valid_from.is_none()
            && self.valid_until.is_none()
    }
}

impl std::fmt::Display for TemporalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_opt = |t: Option<DateTime<Utc>>| match t {
            Some(t) => t.to_rfc3339(),
            None => "-".to_string(),
        };
        write!(
            f,
            "[{}, {}) created={} expired={}",
            fmt_opt(self.valid_from),
            fmt_opt(self.valid_until),
            fmt_opt(self.created),
            fmt_opt(self.expired),
        )
    }
}

/// Builder for [`TemporalEvent`].
#[derive(Debug, Clone, Default)]
pub struct TemporalEventBuilder {
    event: TemporalEvent,
}

impl TemporalEventBuilder {
    pub fn created(mut self, t: DateTime<Utc>) -> Self {
        self.event.created = Some(t);
        self
    }

    pub fn expired(mut self, t: DateTime<Utc>) -> Self {
        self.event.expired = Some(t);
        self
    }

    pub fn valid_from(mut self, t: DateTime<Utc>) -> Self {
        self.event.valid_from = Some(t);
        self
    }

    pub fn valid_until(mut self, t: DateTime<Utc>) -> Self {
        self.event.valid_until = Some(t);
        self
    }

    /// Finish the event, rejecting inverted windows.
    pub fn build(self) -> TemporalResult<TemporalEvent> {
        self.event.validate()?;
        Ok(self.event)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
