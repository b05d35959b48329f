//! Error types produced by the percolation engine.
//!
//! The engine distinguishes two failure classes:
//!
//! - **Structural errors** ([`PercolateError`]) abort the whole call and are
//!   surfaced to the caller, so "bad input" is always distinguishable from
//!   "no match". There is no partial result for a structural error.
//! - **Per-predicate execution errors** ([`ExecutionError`]) are recovered
//!   locally: the offending query is logged and skipped, and percolation
//!   continues over the remaining registered queries.
//!
//! All error types are typed (not stringly `anyhow`-style) so callers can
//! match on the exact failure and tests can assert on error kinds.
use thiserror::Error;

/// Structural errors: each one aborts the `percolate` call (or the
/// `add_query` call, for [`PercolateError::QueryCompilation`]).
#[derive(Debug, Error)]
pub enum PercolateError {
    /// A submitted query source could not be compiled into a predicate.
    /// The registry is left unchanged when this is returned.
    #[error("failed to compile query [{name}]: {source}")]
    QueryCompilation {
        /// Name under which the query was being registered.
        name: String,
        #[source]
        source: QueryParseError,
    },

    /// The percolate request byte span is not a well-formed JSON object,
    /// or its `query` section does not parse into a predicate.
    #[error("malformed percolate request: {0}")]
    MalformedRequest(String),

    /// The request carries no `doc` section; there is nothing to test.
    #[error("no doc to percolate in the request")]
    MissingDocument,

    /// A document field could not be tokenized while building the
    /// ephemeral index. The document under test is unusable.
    #[error("failed to analyze field [{field}]: {source}")]
    FieldAnalysis {
        /// Name of the field that failed analysis.
        field: String,
        #[source]
        source: AnalysisError,
    },

    /// The document mapper rejected the `doc` section.
    #[error("failed to map document of type [{doc_type}]: {source}")]
    Mapper {
        /// Declared document type from the `doc` section.
        doc_type: String,
        #[source]
        source: MapperError,
    },

    /// Engine configuration failed validation.
    #[error("invalid percolator config: {0}")]
    InvalidConfig(String),
}

/// Errors raised by an [`Analyzer`](crate::analysis::Analyzer) while
/// tokenizing field text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A single field produced more tokens than the configured cap.
    #[error("field [{field}] produced more than {limit} tokens")]
    TokenLimitExceeded {
        /// Field whose text exceeded the token budget.
        field: String,
        /// Configured `max_token_count`.
        limit: usize,
    },
}

/// Errors raised by a [`DocumentMapper`](crate::mapper::DocumentMapper).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    /// The `doc` section's body was not a JSON object.
    #[error("document body for type [{0}] must be an object")]
    NotAnObject(String),

    /// Dynamic mapping is disabled and the type has never been seen.
    #[error("dynamic mapping is disabled; type [{0}] is not defined")]
    StrictType(String),

    /// Dynamic mapping is disabled and the document carries an unmapped field.
    #[error("dynamic mapping is disabled; field [{field}] is not defined for type [{doc_type}]")]
    StrictField {
        /// Declared document type.
        doc_type: String,
        /// Unmapped field path.
        field: String,
    },

    /// The flattened document exceeds the configured field budget.
    #[error("document carries more than {limit} fields")]
    TooManyFields {
        /// Configured `max_fields_per_document`.
        limit: usize,
    },
}

/// Errors raised while parsing a query DSL source into a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryParseError {
    /// The source was not a JSON object with a single query-kind key.
    #[error("query source must be an object with exactly one query kind")]
    NotAnObject,

    /// The single top-level key named a query kind the parser does not know.
    #[error("unknown query kind [{0}]")]
    UnknownKind(String),

    /// The query kind was recognised but its body was malformed.
    #[error("malformed [{kind}] query: {reason}")]
    Malformed {
        /// Query kind being parsed (`term`, `bool`, ...).
        kind: String,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// Analysis of `match` query text failed.
    #[error("failed to analyze query text for field [{field}]: {source}")]
    Analysis {
        /// Field the `match` query targets.
        field: String,
        #[source]
        source: AnalysisError,
    },
}

/// Non-fatal failure while executing a single predicate against an index.
///
/// The matcher logs these with the offending query's name and continues the
/// scan; one broken predicate never aborts percolation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query execution failed: {message}")]
pub struct ExecutionError {
    /// What went wrong, for the log line.
    pub message: String,
}

impl ExecutionError {
    /// Build an execution error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
