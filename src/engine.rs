//! Engine facade: top-level API for temporal-kg.
//!
//! The `Engine` owns the knowledge store, the id allocator, the query planner
//! and the two collaborators. It runs the ingest workflow: conflict check
//! against the current store, invalidation of superseded statements, then
//! insertion, all under one write lock. Extraction and summarization calls
//! happen outside the lock.

use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::TkgResult;
use crate::extract::chunker::chunk_sentences;
use crate::extract::llm::LlmClient;
use crate::extract::{ExtractionOptions, Extractor, Summarizer, process_statement};
use crate::graph::contradiction::InvalidationResolver;
use crate::graph::timeline::TimelineEntry;
use crate::query::matcher::StatementMatcher;
use crate::query::{QueryPlanner, QueryResult, TemporalQuery};
use crate::seeds::{SeedPack, SeedReport};
use crate::statement::{Statement, StatementIdAllocator};
use crate::store::{KnowledgeStore, StoreStats, durable};

/// Outcome of adding one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub statement_id: String,
    /// Existing statements the new one superseded.
    pub invalidated: Vec<String>,
}

/// The temporal knowledge graph engine.
pub struct Engine {
    config: EngineConfig,
    store: RwLock<KnowledgeStore>,
    ids: StatementIdAllocator,
    resolver: InvalidationResolver,
    planner: QueryPlanner,
    extractor: Box<dyn Extractor + Send + Sync>,
    summarizer: Box<dyn Summarizer + Send + Sync>,
}

impl Engine {
    /// Create an engine with an empty store.
    pub fn new(
        config: EngineConfig,
        extractor: impl Extractor + Send + Sync + 'static,
        summarizer: impl Summarizer + Send + Sync + 'static,
    ) -> Self {
        tracing::info!(
            top_n = config.query.top_n,
            detect_fact_type = config.extraction.detect_fact_type,
            "initializing temporal-kg engine"
        );
        Self {
            planner: QueryPlanner::new(config.query.top_n),
            config,
            store: RwLock::new(KnowledgeStore::new()),
            ids: StatementIdAllocator::new(),
            resolver: InvalidationResolver::new(),
            extractor: Box::new(extractor),
            summarizer: Box::new(summarizer),
        }
    }

    /// Create an engine whose extractor and summarizer are an [`LlmClient`]
    /// built from `config.llm`.
    pub fn with_llm(config: EngineConfig) -> Self {
        let client = LlmClient::new(config.llm.clone());
        Self::new(config, client.clone(), client)
    }

    /// Replace the matcher used for questions that name no entity or range.
    pub fn with_matcher(mut self, matcher: impl StatementMatcher + Send + Sync + 'static) -> Self {
        self.planner = self.planner.with_matcher(matcher);
        self
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // A panic while holding the lock cannot leave the maps half-updated
    // (`add_statement` does not panic), so poisoning is ignored.
    fn read_store(&self) -> RwLockReadGuard<'_, KnowledgeStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, KnowledgeStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Allocate a `stmt_<n>` id not yet present in the store.
    pub fn next_statement_id(&self) -> String {
        let store = self.read_store();
        loop {
            let id = self.ids.next_id();
            if !store.contains(&id) {
                return id;
            }
        }
    }

    /// Add a statement, first invalidating every existing statement it
    /// supersedes.
    ///
    /// The conflict check sees the store as it was before this statement, so
    /// a statement never supersedes itself. Re-adding an existing id
    /// overwrites it.
    pub fn ingest(&self, statement: Statement) -> IngestReport {
        let mut store = self.write_store();
        self.ids.observe(statement.id());

        let invalidated = self.resolver.superseded_ids(&statement, store.statements());
        for target in &invalidated {
            store.invalidate(target, statement.id());
        }

        let statement_id = statement.id().to_string();
        let is_new = store.add_statement(statement);
        tracing::info!(
            statement = %statement_id,
            new = is_new,
            invalidated = invalidated.len(),
            "statement ingested"
        );

        IngestReport {
            statement_id,
            invalidated,
        }
    }

    /// Extract a statement from `text` and ingest it.
    ///
    /// Relative dates resolve against `reference` (default: now). Extraction
    /// failures fall back to defaults and never prevent insertion.
    pub fn add_text(
        &self,
        text: &str,
        source: Option<String>,
        reference: Option<DateTime<Utc>>,
    ) -> TkgResult<IngestReport> {
        let id = self.next_statement_id();
        let options = ExtractionOptions::from(&self.config.extraction);
        let statement = process_statement(
            self.extractor.as_ref(),
            text,
            id,
            source,
            reference.unwrap_or_else(Utc::now),
            &options,
        )?;
        Ok(self.ingest(statement))
    }

    /// Split `text` into sentences and add each one.
    pub fn add_document(
        &self,
        text: &str,
        source: Option<String>,
        reference: Option<DateTime<Utc>>,
    ) -> TkgResult<Vec<IngestReport>> {
        let sentences = chunk_sentences(text, self.config.extraction.min_sentence_chars);
        tracing::info!(
            sentences = sentences.len(),
            source = source.as_deref().unwrap_or("-"),
            "ingesting document"
        );

        let mut reports = Vec::with_capacity(sentences.len());
        for sentence in &sentences {
            reports.push(self.add_text(sentence, source.clone(), reference)?);
        }
        Ok(reports)
    }

    /// Ingest every statement of a seed pack, in order.
    ///
    /// All statements are built before any is ingested, so an invalid pack
    /// changes nothing.
    pub fn apply_seed(&self, pack: &SeedPack) -> TkgResult<SeedReport> {
        let statements = pack
            .statements
            .iter()
            .enumerate()
            .map(|(i, s)| s.to_statement(&pack.id, i, self.next_statement_id()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut invalidated = 0;
        for statement in statements {
            invalidated += self.ingest(statement).invalidated.len();
        }

        tracing::info!(seed = %pack.id, statements = pack.statements.len(), invalidated, "seed applied");
        Ok(SeedReport {
            id: pack.id.clone(),
            statements_applied: pack.statements.len(),
            invalidated,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Run a query. The store is only read-locked while statements are
    /// selected; the summarizer runs after the lock is released.
    pub fn query(&self, query: &TemporalQuery) -> QueryResult {
        let selection = {
            let store = self.read_store();
            self.planner.select(&store, query)
        };
        self.planner.finish(self.summarizer.as_ref(), query, selection)
    }

    /// Statements about `entity`, optionally only those valid at `at`.
    pub fn query_entity(&self, entity: &str, at: Option<DateTime<Utc>>) -> QueryResult {
        let mut query = TemporalQuery::new().entity(entity);
        query.at = at;
        self.query(&query)
    }

    /// Answer a free-form question.
    pub fn ask(&self, question: &str) -> QueryResult {
        self.query(&TemporalQuery::new().question(question))
    }

    pub fn timeline(&self, entity: &str) -> Vec<TimelineEntry> {
        self.read_store().timeline_for_entity(entity)
    }

    /// Entity names in first-seen order.
    pub fn entities(&self) -> Vec<String> {
        self.read_store().entities().map(str::to_string).collect()
    }

    pub fn statement(&self, id: &str) -> Option<Statement> {
        self.read_store().get(id).cloned()
    }

    /// Statements valid at `t`, in insertion order.
    pub fn valid_at(&self, t: DateTime<Utc>) -> Vec<Statement> {
        self.read_store()
            .valid_statements_at(t)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.read_store().stats()
    }

    pub fn len(&self) -> usize {
        self.read_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_store().is_empty()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write the store to `path` as JSON.
    pub fn save(&self, path: &Path) -> TkgResult<()> {
        let store = self.read_store();
        durable::save(&store, path)?;
        Ok(())
    }

    /// Replace the store with the one saved at `path`.
    ///
    /// On error the current store is left untouched. Returns the number of
    /// statements loaded.
    pub fn load(&self, path: &Path) -> TkgResult<usize> {
        let fresh = durable::load(path)?;
        let mut store = self.write_store();
        for stmt in fresh.statements() {
            self.ids.observe(stmt.id());
        }
        *store = fresh;
        Ok(store.len())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("statements", &self.len())
            .field("next_id", &self.ids.peek_next())
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SupportingFact;
    use crate::extract::llm::LlmError;
    use crate::graph::Triple;
    use crate::query::Answer;
    use crate::statement::TemporalClass;
    use crate::temporal::{TemporalEvent, parse_instant};

    fn at(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    /// Reads "subject|predicate|object@date" sentences.
    struct PipeExtractor;

    impl Extractor for PipeExtractor {
        fn classify(&self, _: &str) -> Result<TemporalClass, LlmError> {
            Ok(TemporalClass::Dynamic)
        }
        fn extract_triples(&self, text: &str) -> Result<Vec<Triple>, LlmError> {
            let body = text.split('@').next().unwrap_or_default();
            let parts: Vec<&str> = body.split('|').map(str::trim).collect();
            match parts.as_slice() {
                [s, p, o] => Ok(vec![Triple::new(*s, *p, *o)]),
                _ => Err(LlmError::ParseError {
                    message: "not a triple".into(),
                }),
            }
        }
        fn extract_temporal_event(
            &self,
            text: &str,
            _: DateTime<Utc>,
        ) -> Result<Option<TemporalEvent>, LlmError> {
            Ok(text.split_once('@').map(|(_, date)| TemporalEvent {
                created: Some(parse_instant(date).unwrap()),
                valid_from: Some(parse_instant(date).unwrap()),
                ..Default::default()
            }))
        }
    }

    struct Echo;

    impl Summarizer for Echo {
        fn answer(&self, _: &str, facts: &[SupportingFact]) -> Result<String, LlmError> {
            Ok(facts[0].text.clone())
        }
    }

    fn new_engine() -> Engine {
        Engine::new(EngineConfig::default(), PipeExtractor, Echo)
    }

    #[test]
    fn newer_statement_invalidates_older() {
        let engine = new_engine();
        let first = engine
            .add_text("TechCorp|hasCEO|John@2020-01-01", None, None)
            .unwrap();
        let second = engine
            .add_text("TechCorp|hasCEO|Jane@2024-01-01", None, None)
            .unwrap();

        assert_eq!(first.statement_id, "stmt_1");
        assert!(first.invalidated.is_empty());
        assert_eq!(second.invalidated, ["stmt_1"]);

        let old = engine.statement("stmt_1").unwrap();
        assert_eq!(old.invalidated_by(), ["stmt_2"]);
        // Soft invalidation: still reachable by entity.
        assert_eq!(engine.query_entity("John", None).statements.len(), 1);
    }

    #[test]
    fn older_arrival_does_not_invalidate_newer() {
        let engine = new_engine();
        engine.add_text("TechCorp|hasCEO|Jane@2024-01-01", None, None).unwrap();
        let late = engine.add_text("TechCorp|hasCEO|John@2020-01-01", None, None).unwrap();
        assert!(late.invalidated.is_empty());
        assert_eq!(engine.stats().invalidated, 0);
    }

    #[test]
    fn readding_same_id_overwrites_without_self_conflict() {
        let engine = new_engine();
        let s = |obj: &str, date: &str| {
            Statement::builder("fixed", obj, TemporalClass::Dynamic)
                .triple(Triple::new("TechCorp", "hasCEO", obj))
                .temporal_event(TemporalEvent::builder().created(at(date)).build().unwrap())
                .build()
                .unwrap()
        };
        engine.ingest(s("John", "2020-01-01"));
        let report = engine.ingest(s("Jane", "2024-01-01"));
        assert!(report.invalidated.is_empty());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.statement("fixed").unwrap().text(), "Jane");
    }

    #[test]
    fn allocator_skips_existing_ids() {
        let engine = new_engine();
        engine.ingest(
            Statement::builder("stmt_1", "manual", TemporalClass::Static)
                .build()
                .unwrap(),
        );
        let report = engine.add_text("A|r|B", None, None).unwrap();
        assert_eq!(report.statement_id, "stmt_2");
    }

    #[test]
    fn document_is_split_into_sentences() {
        let engine = new_engine();
        let reports = engine
            .add_document(
                "TechCorp|hasCEO|John@2020-01-01. TechCorp|hasCEO|Jane@2024-01-01! ok.",
                Some("doc".into()),
                None,
            )
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].invalidated, ["stmt_1"]);
        assert_eq!(engine.statement("stmt_2").unwrap().source(), Some("doc"));
    }

    #[test]
    fn extraction_failure_still_stores_statement() {
        let engine = new_engine();
        let report = engine.add_text("no structure here", None, None).unwrap();
        let stmt = engine.statement(&report.statement_id).unwrap();
        assert!(stmt.triples().is_empty());
        assert!(engine.entities().is_empty());
    }

    #[test]
    fn ask_routes_through_summarizer() {
        let engine = new_engine();
        engine.add_text("TechCorp|hasCEO|Jane@2024-01-01", None, None).unwrap();
        let result = engine.ask("Who leads TechCorp?");
        assert_eq!(
            result.answer,
            Some(Answer::Text("TechCorp|hasCEO|Jane@2024-01-01".into()))
        );
    }

    #[test]
    fn save_then_load_resumes_ids() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("kg.json");

        let engine = new_engine();
        engine.add_text("A|r|B@2020-01-01", None, None).unwrap();
        engine.add_text("A|r|C@2021-01-01", None, None).unwrap();
        engine.save(&path).unwrap();

        let restored = new_engine();
        assert_eq!(restored.load(&path).unwrap(), 2);
        assert_eq!(restored.statement("stmt_1").unwrap().invalidated_by(), ["stmt_2"]);
        let next = restored.add_text("X|r|Y", None, None).unwrap();
        assert_eq!(next.statement_id, "stmt_3");
    }

    #[test]
    fn failed_load_keeps_current_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, r#"{"statements": {"a": {"id": "a"}}}"#).unwrap();

        let engine = new_engine();
        engine.add_text("A|r|B", None, None).unwrap();
        assert!(engine.load(&path).is_err());
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn demo_seed_applies_with_invalidation() {
        let engine = new_engine();
        let report = engine.apply_seed(&SeedPack::demo().unwrap()).unwrap();
        assert_eq!(report.statements_applied, 10);
        assert_eq!(report.invalidated, 1);

        let ceo_2022 = engine.query_entity("TechCorp", Some(at("2022-06-01")));
        assert!(
            ceo_2022
                .statements
                .iter()
                .any(|s| s.text().starts_with("John Smith was appointed"))
        );
        assert!(
            !ceo_2022
                .statements
                .iter()
                .any(|s| s.text().starts_with("Sarah Johnson became"))
        );
    }
}
