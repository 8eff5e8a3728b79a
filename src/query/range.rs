//! Time-range overlap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::statement::Statement;
use crate::temporal::{TemporalError, TemporalEvent, TemporalResult};

/// A query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range. `start` must not be after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> TemporalResult<Self> {
        if start > end {
            return Err(TemporalError::InvertedWindow {
                valid_from: start,
                valid_until: end,
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether an event's effective window touches this range.
    ///
    /// The event needs an effective start at or before `end`; an event with an
    /// effective end must not have ended before `start`. Both comparisons are
    /// inclusive.
    pub fn overlaps_event(&self, event: &TemporalEvent) -> bool {
        let Some(from) = event.effective_start() else {
            return false;
        };
        from <= self.end && event.effective_end().is_none_or(|until| until >= self.start)
    }

    /// Statements without a temporal event never overlap a range.
    pub fn overlaps(&self, statement: &Statement) -> bool {
        statement
            .temporal_event()
            .is_some_and(|event| self.overlaps_event(event))
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::TemporalClass;
    use crate::temporal::parse_instant;

    fn at(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    fn range(a: &str, b: &str) -> TimeRange {
        TimeRange::new(at(a), at(b)).unwrap()
    }

    fn with_event(event: TemporalEvent) -> Statement {
        Statement::builder("s", "s", TemporalClass::Dynamic)
            .temporal_event(event)
            .build()
            .unwrap()
    }

    #[test]
    fn open_ended_statement_overlaps() {
        let stmt = with_event(
            TemporalEvent::builder()
                .valid_from(at("2020-06-01"))
                .build()
                .unwrap(),
        );
        assert!(range("2021-01-01", "2022-01-01").overlaps(&stmt));
    }

    #[test]
    fn statement_starting_after_range_is_excluded() {
        let stmt = with_event(
            TemporalEvent::builder()
                .valid_from(at("2022-06-01"))
                .build()
                .unwrap(),
        );
        assert!(!range("2021-01-01", "2022-01-01").overlaps(&stmt));
    }

    #[test]
    fn created_stands_in_for_valid_from() {
        let stmt = with_event(
            TemporalEvent::builder()
                .created(at("2021-03-01"))
                .expired(at("2021-04-01"))
                .build()
                .unwrap(),
        );
        assert!(range("2021-01-01", "2022-01-01").overlaps(&stmt));
        assert!(!range("2021-05-01", "2022-01-01").overlaps(&stmt));
    }

    #[test]
    fn boundaries_are_inclusive() {
        let stmt = with_event(
            TemporalEvent::builder()
                .valid_from(at("2020-01-01"))
                .valid_until(at("2021-01-01"))
                .build()
                .unwrap(),
        );
        assert!(range("2021-01-01", "2021-06-01").overlaps(&stmt));
        assert!(range("2019-01-01", "2020-01-01").overlaps(&stmt));
    }

    #[test]
    fn statements_without_start_never_overlap() {
        let bare = Statement::builder("s", "s", TemporalClass::Atemporal)
            .build()
            .unwrap();
        assert!(!range("2000-01-01", "2100-01-01").overlaps(&bare));
        assert!(!range("2000-01-01", "2100-01-01").overlaps(&with_event(TemporalEvent::always())));
    }

    #[test]
    fn inverted_range_rejected() {
        assert!(TimeRange::new(at("2022-01-01"), at("2021-01-01")).is_err());
        assert!(TimeRange::new(at("2022-01-01"), at("2022-01-01")).is_ok());
    }
}
