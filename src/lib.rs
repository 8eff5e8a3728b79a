// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # temporal-kg
//!
//! A temporal knowledge graph: natural-language statements annotated with
//! bitemporal validity windows, indexed by entity, and answered with
//! point-in-time and range queries.
//!
//! ## Architecture
//!
//! - **Temporal events** (`temporal`): four optional instants and the
//!   point-in-time containment test
//! - **Graph** (`graph`): triples, the entity index, timelines and conflict
//!   detection between statements
//! - **Store** (`store`): statements plus entity index, persisted as versioned JSON
//! - **Queries** (`query`): entity, range and free-form routing
//! - **Extraction** (`extract`): collaborator traits and an HTTP chat client
//! - **Engine** (`engine`): the ingest workflow behind one lock
//!
//! ## Library usage
//!
//! ```no_run
//! use temporal_kg::config::EngineConfig;
//! use temporal_kg::engine::Engine;
//! use temporal_kg::graph::Triple;
//! use temporal_kg::statement::{Statement, TemporalClass};
//! use temporal_kg::temporal::{TemporalEvent, parse_instant};
//!
//! let engine = Engine::with_llm(EngineConfig::default());
//! let stmt = Statement::builder(engine.next_statement_id(), "Jane Doe became CEO", TemporalClass::Dynamic)
//!     .triple(Triple::new("TechCorp", "hasCEO", "Jane Doe"))
//!     .temporal_event(
//!         TemporalEvent::builder()
//!             .created(parse_instant("2024-03-01").unwrap())
//!             .valid_from(parse_instant("2024-03-01").unwrap())
//!             .build()
//!             .unwrap(),
//!     )
//!     .build()
//!     .unwrap();
//! let report = engine.ingest(stmt);
//! println!("superseded: {:?}", report.invalidated);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod graph;
pub mod paths;
pub mod query;
pub mod report;
pub mod seeds;
pub mod statement;
pub mod store;
pub mod temporal;
