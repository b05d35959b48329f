//! # Percolate
//!
//! ## Purpose
//!
//! `percolate` is a reverse-search engine: it stores a named collection of
//! compiled queries and, given an incoming document, reports which of them
//! the document would match. Ordinary search runs a query over many stored
//! documents; percolation runs many stored queries over one live document.
//! Typical uses are alerting ("tell me when a document like this arrives")
//! and classification by saved search.
//!
//! Each call builds a transient single-document inverted index from the
//! request's `doc` section and executes registered predicates against it,
//! existence-only. With a large query set, callers can supply a
//! [`PercolatorShard`] holding one stored document per registered query;
//! the request's embedded `query` section then narrows the candidate set
//! before per-query re-execution.
//!
//! ## Core Types
//!
//! - [`Percolator`]: the engine; wires the registry, document mapper,
//!   analyzer, and query parser together.
//! - [`QueryRegistry`]: name -> predicate map with lock-free snapshot
//!   reads; mutations publish a fresh immutable snapshot atomically.
//! - [`Request`] / [`Response`]: raw JSON request bytes in, matched query
//!   names plus the schema-change flag out.
//! - [`Predicate`]: compiled, executable form of a query.
//! - [`MemoryIndex`]: the ephemeral per-call index.
//! - [`PercolatorShard`] / [`InMemoryQueryShard`]: the candidate-filtering
//!   surface for two-phase matching.
//!
//! ## Example
//!
//! ```rust
//! use percolate::{Percolator, PercolatorConfig, Request};
//! use serde_json::json;
//!
//! let engine = Percolator::new(PercolatorConfig::default()).expect("engine init");
//! engine
//!     .add_query("fox-alert", &json!({ "term": { "title": "fox" } }))
//!     .expect("register query");
//!
//! let body = serde_json::to_vec(&json!({
//!     "doc": { "tweet": { "title": "the quick fox" } }
//! }))
//! .expect("serialize request");
//!
//! let response = engine.percolate(&Request::new(&body)).expect("percolate");
//! assert_eq!(response.matches(), ["fox-alert".to_string()]);
//! ```

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod memory_index;
pub mod metrics;
pub mod query;
pub mod registry;
pub mod shard;

pub use analysis::{Analyzer, StandardAnalyzer, Token};
pub use config::{AnalyzerConfig, MapperConfig, PercolatorConfig};
pub use engine::{Percolator, Request, Response};
pub use error::{
    AnalysisError, ExecutionError, MapperError, PercolateError, QueryParseError,
};
pub use mapper::{
    DocumentMapper, DynamicMapper, FieldKind, FieldValue, IndexField, MaterializedDocument,
};
pub use memory_index::MemoryIndex;
pub use metrics::{set_percolate_metrics, PercolateMetrics, PercolateMode};
pub use query::{JsonQueryParser, Predicate, QueryParser};
pub use registry::{QueryRegistry, QuerySnapshot};
pub use shard::{InMemoryQueryShard, PercolatorShard, ShardSearcher, ID_FIELD};
