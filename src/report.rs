//! Human-readable rendering for the `tkg` binary.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::graph::timeline::TimelineEntry;
use crate::query::QueryResult;
use crate::statement::Statement;
use crate::store::StoreStats;
use crate::temporal::TemporalEvent;

const RULE: &str = "==================================================";
const THIN_RULE: &str = "------------------------------";

fn instant(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn push_event(out: &mut String, event: &TemporalEvent) {
    let rows = [
        ("Created", event.created),
        ("Valid from", event.valid_from),
        ("Valid until", event.valid_until),
        ("Expires", event.expired),
    ];
    for (label, value) in rows {
        if let Some(t) = value {
            let _ = writeln!(out, "   {label}: {}", instant(t));
        }
    }
}

/// Render a timeline, oldest first.
pub fn format_timeline(timeline: &[TimelineEntry]) -> String {
    if timeline.is_empty() {
        return "No timeline events found.".into();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Timeline of events:\n{RULE}");
    for entry in timeline {
        let _ = writeln!(out, "\n[{}] {}", entry.statement_id, entry.text);
        let _ = writeln!(out, "   Type: {} ({})", entry.temporal_class, entry.fact_type);
        if !entry.triples.is_empty() {
            let _ = writeln!(out, "   Triples:");
            for triple in &entry.triples {
                let _ = writeln!(out, "     * {triple}");
            }
        }
        push_event(&mut out, &entry.temporal_event);
        let _ = writeln!(out, "{THIN_RULE}");
    }
    out
}

fn push_statement(out: &mut String, n: usize, stmt: &Statement) {
    let _ = writeln!(out, "\n{n}. {}", stmt.text());
    let _ = writeln!(
        out,
        "   Id: {}  Type: {} ({})  Confidence: {:.2}",
        stmt.id(),
        stmt.temporal_class(),
        stmt.fact_type(),
        stmt.confidence()
    );
    let _ = writeln!(out, "   Source: {}", stmt.source().unwrap_or("unknown"));
    if !stmt.triples().is_empty() {
        let _ = writeln!(out, "   Triples:");
        for triple in stmt.triples() {
            let _ = writeln!(out, "     * {triple}");
        }
    }
    if let Some(event) = stmt.temporal_event() {
        push_event(out, event);
    }
    if stmt.is_invalidated() {
        let _ = writeln!(out, "   Superseded by: {}", stmt.invalidated_by().join(", "));
    }
}

/// Render a query result: answer first, then matched statements, then the
/// timeline if there is one.
pub fn format_query_result(result: &QueryResult) -> String {
    let mut out = String::new();

    if let Some(answer) = &result.answer {
        let _ = writeln!(out, "Answer: {answer}\n");
    }

    if result.statements.is_empty() {
        let _ = writeln!(out, "No matching statements.");
    } else {
        let _ = writeln!(
            out,
            "Found {} statements (confidence {:.2}):\n{RULE}",
            result.statements.len(),
            result.confidence
        );
        for (i, stmt) in result.statements.iter().enumerate() {
            push_statement(&mut out, i + 1, stmt);
        }
    }

    if !result.timeline.is_empty() {
        let _ = writeln!(out);
        out.push_str(&format_timeline(&result.timeline));
    }
    out
}

pub fn format_stats(stats: &StoreStats) -> String {
    format!("Knowledge graph statistics:\n{RULE}\n{stats}")
}
