//! Collaborator contracts and the extraction pipeline.
//!
//! Turning free text into statements and answering questions are delegated
//! to an [`Extractor`] and a [`Summarizer`]. Both may fail; the pipeline here
//! never lets a collaborator failure abort statement creation. Each failed
//! step falls back to a safe default and logs a warning:
//!
//! | step | fallback |
//! |---|---|
//! | classification | `static` |
//! | triples | none |
//! | temporal event | unset (also for inverted windows) |
//! | fact type | `fact` |
//!
//! [`llm::LlmClient`] implements both traits over an HTTP chat-completion API.

pub mod chunker;
pub mod llm;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ExtractionConfig;
use crate::error::StatementError;
use crate::graph::Triple;
use crate::statement::{FactType, Statement, TemporalClass};
use crate::temporal::TemporalEvent;

use self::llm::LlmError;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Turns a sentence into structured statement parts.
pub trait Extractor {
    fn classify(&self, text: &str) -> Result<TemporalClass, LlmError>;

    fn extract_triples(&self, text: &str) -> Result<Vec<Triple>, LlmError>;

    /// Temporal metadata for `text`; relative dates resolve against `reference`.
    fn extract_temporal_event(
        &self,
        text: &str,
        reference: DateTime<Utc>,
    ) -> Result<Option<TemporalEvent>, LlmError>;

    /// Only called when fact-type detection is enabled.
    fn classify_fact_type(&self, _text: &str) -> Result<FactType, LlmError> {
        Ok(FactType::Fact)
    }
}

/// Writes prose answers from selected facts.
pub trait Summarizer {
    fn answer(&self, question: &str, facts: &[SupportingFact]) -> Result<String, LlmError>;
}

/// What the summarizer sees of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportingFact {
    pub text: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl SupportingFact {
    pub fn from_statement(stmt: &Statement) -> Self {
        let event = stmt.temporal_event();
        Self {
            text: stmt.text().to_string(),
            valid_from: event.and_then(|e| e.valid_from),
            valid_until: event.and_then(|e| e.valid_until),
        }
    }
}

impl std::fmt::Display for SupportingFact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "- {}", self.text)?;
        if let Some(from) = self.valid_from {
            write!(f, "\n  Valid from: {}", from.to_rfc3339())?;
        }
        if let Some(until) = self.valid_until {
            write!(f, "\n  Valid until: {}", until.to_rfc3339())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Knobs for [`process_statement`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOptions {
    /// Confidence recorded on extracted statements.
    pub confidence: f64,
    pub detect_fact_type: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        ExtractionConfig::default().into()
    }
}

impl From<&ExtractionConfig> for ExtractionOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            confidence: config.confidence,
            detect_fact_type: config.detect_fact_type,
        }
    }
}

impl From<ExtractionConfig> for ExtractionOptions {
    fn from(config: ExtractionConfig) -> Self {
        (&config).into()
    }
}

/// Build a statement from raw text through `extractor`.
///
/// Collaborator failures fall back to defaults; only an invalid id or
/// confidence can make this fail.
pub fn process_statement(
    extractor: &dyn Extractor,
    text: &str,
    id: String,
    source: Option<String>,
    reference: DateTime<Utc>,
    options: &ExtractionOptions,
) -> Result<Statement, StatementError> {
    let class = extractor.classify(text).unwrap_or_else(|e| {
        tracing::warn!(statement = %id, error = %e, "classification failed; using static");
        TemporalClass::Static
    });

    let triples = extractor.extract_triples(text).unwrap_or_else(|e| {
        tracing::warn!(statement = %id, error = %e, "triple extraction failed; storing none");
        Vec::new()
    });

    let event = match extractor.extract_temporal_event(text, reference) {
        Ok(Some(event)) => match event.validate() {
            Ok(()) => Some(event),
            Err(e) => {
                tracing::warn!(statement = %id, error = %e, "extracted event rejected; leaving unset");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(statement = %id, error = %e, "temporal extraction failed; leaving unset");
            None
        }
    };

    let fact_type = if options.detect_fact_type {
        extractor.classify_fact_type(text).unwrap_or_else(|e| {
            tracing::warn!(statement = %id, error = %e, "fact-type detection failed; using fact");
            FactType::Fact
        })
    } else {
        FactType::Fact
    };

    tracing::debug!(
        statement = %id,
        class = %class,
        triples = triples.len(),
        has_event = event.is_some(),
        "statement extracted"
    );

    Statement::builder(id, text, class)
        .fact_type(fact_type)
        .triples(triples)
        .maybe_temporal_event(event)
        .maybe_source(source)
        .confidence(options.confidence)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_instant;

    fn at(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    struct Fixed {
        event: TemporalEvent,
    }

    impl Extractor for Fixed {
        fn classify(&self, _: &str) -> Result<TemporalClass, LlmError> {
            Ok(TemporalClass::Dynamic)
        }
        fn extract_triples(&self, _: &str) -> Result<Vec<Triple>, LlmError> {
            Ok(vec![Triple::new("TechCorp", "hasCEO", "Jane Doe")])
        }
        fn extract_temporal_event(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<Option<TemporalEvent>, LlmError> {
            Ok(Some(self.event.clone()))
        }
        fn classify_fact_type(&self, _: &str) -> Result<FactType, LlmError> {
            Ok(FactType::Opinion)
        }
    }

    struct Broken;

    fn down() -> LlmError {
        LlmError::RequestFailed {
            message: "connection refused".into(),
        }
    }

    impl Extractor for Broken {
        fn classify(&self, _: &str) -> Result<TemporalClass, LlmError> {
            Err(down())
        }
        fn extract_triples(&self, _: &str) -> Result<Vec<Triple>, LlmError> {
            Err(down())
        }
        fn extract_temporal_event(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<Option<TemporalEvent>, LlmError> {
            Err(down())
        }
        fn classify_fact_type(&self, _: &str) -> Result<FactType, LlmError> {
            Err(down())
        }
    }

    #[test]
    fn successful_extraction() {
        let event = TemporalEvent::builder()
            .created(at("2024-03-01"))
            .valid_from(at("2024-03-01"))
            .build()
            .unwrap();
        let stmt = process_statement(
            &Fixed { event: event.clone() },
            "Jane Doe became CEO",
            "stmt_1".into(),
            Some("news".into()),
            at("2024-06-01"),
            &ExtractionOptions::default(),
        )
        .unwrap();

        assert_eq!(stmt.temporal_class(), TemporalClass::Dynamic);
        assert_eq!(stmt.triples().len(), 1);
        assert_eq!(stmt.temporal_event(), Some(&event));
        assert_eq!(stmt.source(), Some("news"));
        assert_eq!(stmt.confidence(), 0.8);
        // Detection disabled by default.
        assert_eq!(stmt.fact_type(), FactType::Fact);
    }

    #[test]
    fn every_failure_falls_back() {
        let options = ExtractionOptions {
            detect_fact_type: true,
            ..Default::default()
        };
        let stmt = process_statement(&Broken, "anything", "s".into(), None, at("2024-01-01"), &options)
            .unwrap();
        assert_eq!(stmt.temporal_class(), TemporalClass::Static);
        assert!(stmt.triples().is_empty());
        assert!(stmt.temporal_event().is_none());
        assert_eq!(stmt.fact_type(), FactType::Fact);
    }

    #[test]
    fn inverted_extracted_window_is_dropped() {
        let inverted = TemporalEvent {
            valid_from: Some(at("2024-01-01")),
            valid_until: Some(at("2020-01-01")),
            ..Default::default()
        };
        let stmt = process_statement(
            &Fixed { event: inverted },
            "x",
            "s".into(),
            None,
            at("2024-01-01"),
            &ExtractionOptions::default(),
        )
        .unwrap();
        assert!(stmt.temporal_event().is_none());
        assert_eq!(stmt.triples().len(), 1);
    }

    #[test]
    fn fact_type_detection_when_enabled() {
        let options = ExtractionOptions {
            detect_fact_type: true,
            ..Default::default()
        };
        let stmt = process_statement(
            &Fixed { event: TemporalEvent::always() },
            "TechCorp is the best",
            "s".into(),
            None,
            at("2024-01-01"),
            &options,
        )
        .unwrap();
        assert_eq!(stmt.fact_type(), FactType::Opinion);
    }

    #[test]
    fn supporting_fact_rendering() {
        let stmt = Statement::builder("s", "Jane Doe is CEO", TemporalClass::Dynamic)
            .temporal_event(
                TemporalEvent::builder()
                    .valid_from(at("2024-03-01"))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let fact = SupportingFact::from_statement(&stmt);
        assert_eq!(
            fact.to_string(),
            "- Jane Doe is CEO\n  Valid from: 2024-03-01T00:00:00+00:00"
        );
    }
}
