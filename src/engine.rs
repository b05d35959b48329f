//! The percolation engine: reverse search of one document against the
//! registered query set.
//!
//! `Percolator::percolate` materializes the request's `doc` section,
//! builds a transient [`MemoryIndex`] over its fields, and then matches in
//! one of two modes:
//!
//! - **Scan**: every predicate in the current registry snapshot is executed
//!   against the ephemeral index.
//! - **Filtered**: when the request embeds a `query` section and the caller
//!   supplies a [`PercolatorShard`], the filter runs over the shard's
//!   stored query documents first, and only the visited candidates are
//!   re-executed. The filter narrows, it never decides: every returned
//!   match passed full predicate execution.
//!
//! Per-predicate execution failures are logged and skipped; structural
//! failures (malformed request, missing doc, field analysis) abort the
//! call.
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::config::PercolatorConfig;
use crate::error::PercolateError;
use crate::mapper::{DocumentMapper, DynamicMapper, MaterializedDocument};
use crate::memory_index::MemoryIndex;
use crate::metrics::{metrics_recorder, PercolateMode};
use crate::query::{JsonQueryParser, Predicate, QueryParser};
use crate::registry::QueryRegistry;
use crate::shard::PercolatorShard;

#[cfg(test)]
mod tests;

/// A percolate request: an opaque byte span holding a JSON object with a
/// required `doc` section and an optional `query` section.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    source: &'a [u8],
}

impl<'a> Request<'a> {
    /// Wrap a raw request body. Callers holding a larger buffer pass the
    /// relevant subslice.
    pub fn new(source: &'a [u8]) -> Self {
        Self { source }
    }

    /// The raw request bytes.
    pub fn source(&self) -> &'a [u8] {
        self.source
    }
}

/// Result of one percolate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    matches: Vec<String>,
    schema_changed: bool,
}

impl Response {
    fn new(matches: Vec<String>, schema_changed: bool) -> Self {
        Self {
            matches,
            schema_changed,
        }
    }

    /// Names of the registered queries the document matched, in discovery
    /// order. Order is not significant.
    pub fn matches(&self) -> &[String] {
        &self.matches
    }

    /// Whether materializing the document auto-extended the shared schema.
    pub fn schema_changed(&self) -> bool {
        self.schema_changed
    }
}

/// The engine: a query registry plus the collaborators needed to turn a
/// raw request into an ephemeral index and execute predicates against it.
pub struct Percolator {
    registry: QueryRegistry,
    mapper: Arc<dyn DocumentMapper>,
    parser: Arc<dyn QueryParser>,
    analyzer: Arc<dyn Analyzer>,
}

impl Percolator {
    /// Build an engine with the default collaborators (standard analyzer,
    /// JSON DSL parser, dynamic mapper) from validated configuration.
    pub fn new(cfg: PercolatorConfig) -> Result<Self, PercolateError> {
        cfg.validate()?;
        let analyzer: Arc<dyn Analyzer> = Arc::new(StandardAnalyzer::new(cfg.analyzer));
        let parser: Arc<dyn QueryParser> = Arc::new(JsonQueryParser::new(Arc::clone(&analyzer)));
        let mapper: Arc<dyn DocumentMapper> = Arc::new(DynamicMapper::new(cfg.mapper));
        Ok(Self::with_collaborators(mapper, parser, analyzer))
    }

    /// Build an engine around host-supplied collaborators.
    pub fn with_collaborators(
        mapper: Arc<dyn DocumentMapper>,
        parser: Arc<dyn QueryParser>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            registry: QueryRegistry::new(Arc::clone(&parser)),
            mapper,
            parser,
            analyzer,
        }
    }

    /// The query registry backing this engine.
    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    /// Compile and register a query (see [`QueryRegistry::add_query`]).
    pub fn add_query(&self, name: &str, source: &JsonValue) -> Result<(), PercolateError> {
        self.registry.add_query(name, source)
    }

    /// Register a pre-compiled predicate.
    pub fn add_predicate(&self, name: &str, predicate: Predicate) {
        self.registry.add_predicate(name, predicate)
    }

    /// Remove a registered query; idempotent.
    pub fn remove_query(&self, name: &str) {
        self.registry.remove_query(name)
    }

    /// Drop every registered query.
    pub fn close(&self) {
        self.registry.close()
    }

    /// Percolate with an exhaustive registry scan.
    pub fn percolate(&self, request: &Request<'_>) -> Result<Response, PercolateError> {
        self.percolate_inner(request, None)
    }

    /// Percolate with two-phase candidate filtering when the request
    /// embeds a `query` section; falls back to the exhaustive scan when it
    /// does not.
    pub fn percolate_with_shard(
        &self,
        request: &Request<'_>,
        shard: &dyn PercolatorShard,
    ) -> Result<Response, PercolateError> {
        self.percolate_inner(request, Some(shard))
    }

    fn percolate_inner(
        &self,
        request: &Request<'_>,
        shard: Option<&dyn PercolatorShard>,
    ) -> Result<Response, PercolateError> {
        let start = Instant::now();
        let (doc, filter) = self.materialize(request.source())?;

        // The ephemeral index lives exactly as long as this call; dropping
        // it on any exit path frees the postings.
        let index = MemoryIndex::from_document(&doc, self.analyzer.as_ref())?;
        let snapshot = self.registry.snapshot();

        let mut matches = Vec::new();
        let mode = match (filter, shard) {
            (Some(filter), Some(shard)) => {
                let searcher = shard.searcher();
                let visited = searcher.visit(&filter, &mut |candidate| {
                    // Stale shard entries whose name no longer resolves are
                    // skipped; the shard may lag the registry.
                    if let Some(predicate) = snapshot.get(candidate) {
                        match predicate.execute(&index) {
                            Ok(true) => matches.push(candidate.to_string()),
                            Ok(false) => {}
                            Err(err) => {
                                warn!(query = candidate, error = %err, "failed to execute query");
                            }
                        }
                    }
                });
                if let Err(err) = visited {
                    warn!(error = %err, "failed to execute percolator filter query");
                }
                PercolateMode::Filtered
            }
            (filter, _) => {
                if filter.is_some() {
                    debug!("request embeds a filter query but no percolator shard was supplied");
                }
                for (name, predicate) in snapshot.iter() {
                    match predicate.execute(&index) {
                        Ok(true) => matches.push(name.clone()),
                        Ok(false) => {}
                        Err(err) => {
                            warn!(query = %name, error = %err, "failed to execute query");
                        }
                    }
                }
                PercolateMode::Scan
            }
        };

        let latency = start.elapsed();
        debug!(
            ?mode,
            matches = matches.len(),
            registered = snapshot.len(),
            "percolate finished"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_percolate(mode, latency, matches.len());
        }

        Ok(Response::new(matches, doc.schema_changed))
    }

    /// Parse the request body: the `query` section compiles into the filter
    /// predicate, the `doc` section's first key declares the type and its
    /// body goes to the document mapper.
    fn materialize(
        &self,
        source: &[u8],
    ) -> Result<(MaterializedDocument, Option<Predicate>), PercolateError> {
        let root: JsonValue = serde_json::from_slice(source)
            .map_err(|err| PercolateError::MalformedRequest(err.to_string()))?;
        let root = root.as_object().ok_or_else(|| {
            PercolateError::MalformedRequest("request body must be a JSON object".into())
        })?;

        let mut filter = None;
        let mut doc = None;
        for (section, value) in root {
            match section.as_str() {
                "query" => {
                    let predicate = self.parser.parse(value).map_err(|err| {
                        PercolateError::MalformedRequest(format!("invalid query section: {err}"))
                    })?;
                    filter = Some(predicate);
                }
                "doc" => {
                    let body = value.as_object().ok_or_else(|| {
                        PercolateError::MalformedRequest("doc section must be an object".into())
                    })?;
                    // The first nested field name is the document type.
                    let (doc_type, fields) = body.iter().next().ok_or_else(|| {
                        PercolateError::MalformedRequest("doc section must not be empty".into())
                    })?;
                    let mapped = self.mapper.map(doc_type, fields).map_err(|source| {
                        PercolateError::Mapper {
                            doc_type: doc_type.clone(),
                            source,
                        }
                    })?;
                    doc = Some(mapped);
                }
                // Unknown top-level sections are ignored.
                _ => {}
            }
        }

        let doc = doc.ok_or(PercolateError::MissingDocument)?;
        Ok((doc, filter))
    }
}
