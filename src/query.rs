//! Compiled predicates and the default JSON query DSL parser.
//!
//! A [`Predicate`] is the executable form of a registered query. It has one
//! capability: execute against a [`MemoryIndex`] and report whether at
//! least one match exists. Concrete variants are a closed set owned by the
//! parser; the [`Predicate::Extern`] variant is the escape hatch for hosts
//! that compile queries elsewhere and hand the engine an opaque callable.
//!
//! The [`JsonQueryParser`] understands a small DSL, one kind per source
//! object:
//!
//! ```json
//! { "term":      { "status": "active" } }
//! { "match":     { "title": "quick fox" } }
//! { "prefix":    { "title": "qui" } }
//! { "range":     { "age": { "gte": "18", "lt": "65" } } }
//! { "bool":      { "must": [..], "should": [..], "must_not": [..] } }
//! { "match_all": {} }
//! { "match_none": {} }
//! ```
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::analysis::Analyzer;
use crate::error::{ExecutionError, QueryParseError};
use crate::memory_index::MemoryIndex;

/// Host-supplied opaque predicate body.
pub type ExternFn = dyn Fn(&MemoryIndex) -> Result<bool, ExecutionError> + Send + Sync;

/// Executable form of a query.
#[derive(Clone)]
pub enum Predicate {
    /// Matches every document.
    MatchAll,
    /// Matches nothing.
    MatchNone,
    /// Exact single-term existence in a field.
    Term {
        /// Target field path.
        field: String,
        /// Verbatim term.
        value: String,
    },
    /// Analyzed text match: any of the analyzed terms present in the field.
    Match {
        /// Target field path.
        field: String,
        /// Terms produced by analyzing the query text at parse time.
        terms: Vec<String>,
    },
    /// Any term in the field starting with the given prefix.
    Prefix {
        /// Target field path.
        field: String,
        /// Verbatim prefix.
        value: String,
    },
    /// Lexicographic term range over a field.
    Range {
        /// Target field path.
        field: String,
        /// Lower bound, if any.
        lower: Option<String>,
        /// Upper bound, if any.
        upper: Option<String>,
        /// Lower bound inclusive (`gte`) vs exclusive (`gt`).
        include_lower: bool,
        /// Upper bound inclusive (`lte`) vs exclusive (`lt`).
        include_upper: bool,
    },
    /// Boolean combination of sub-predicates.
    Bool {
        /// Every clause must match.
        must: Vec<Predicate>,
        /// With no `must` clauses, at least one `should` clause must match.
        should: Vec<Predicate>,
        /// No clause may match.
        must_not: Vec<Predicate>,
    },
    /// Opaque host-compiled predicate.
    Extern {
        /// Label used in logs and `Debug` output.
        tag: String,
        /// The executable body.
        body: Arc<ExternFn>,
    },
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::MatchAll => write!(f, "MatchAll"),
            Predicate::MatchNone => write!(f, "MatchNone"),
            Predicate::Term { field, value } => write!(f, "Term({field}:{value})"),
            Predicate::Match { field, terms } => write!(f, "Match({field}:{terms:?})"),
            Predicate::Prefix { field, value } => write!(f, "Prefix({field}:{value}*)"),
            Predicate::Range { field, lower, upper, .. } => {
                write!(f, "Range({field}:{lower:?}..{upper:?})")
            }
            Predicate::Bool { must, should, must_not } => f
                .debug_struct("Bool")
                .field("must", must)
                .field("should", should)
                .field("must_not", must_not)
                .finish(),
            Predicate::Extern { tag, .. } => write!(f, "Extern({tag})"),
        }
    }
}

impl Predicate {
    /// Existence-only execution: does at least one match exist in `index`?
    pub fn execute(&self, index: &MemoryIndex) -> Result<bool, ExecutionError> {
        match self {
            Predicate::MatchAll => Ok(true),
            Predicate::MatchNone => Ok(false),
            Predicate::Term { field, value } => Ok(index.has_term(field, value)),
            Predicate::Match { field, terms } => {
                Ok(terms.iter().any(|t| index.has_term(field, t)))
            }
            Predicate::Prefix { field, value } => Ok(index.has_prefix(field, value)),
            Predicate::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => Ok(index.has_term_in_range(
                field,
                lower.as_deref(),
                upper.as_deref(),
                *include_lower,
                *include_upper,
            )),
            Predicate::Bool {
                must,
                should,
                must_not,
            } => {
                for clause in must {
                    if !clause.execute(index)? {
                        return Ok(false);
                    }
                }
                for clause in must_not {
                    if clause.execute(index)? {
                        return Ok(false);
                    }
                }
                if must.is_empty() && !should.is_empty() {
                    for clause in should {
                        if clause.execute(index)? {
                            return Ok(true);
                        }
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            Predicate::Extern { body, .. } => body(index),
        }
    }

    /// Wrap a host-compiled callable as a predicate.
    pub fn extern_fn<F>(tag: impl Into<String>, body: F) -> Self
    where
        F: Fn(&MemoryIndex) -> Result<bool, ExecutionError> + Send + Sync + 'static,
    {
        Predicate::Extern {
            tag: tag.into(),
            body: Arc::new(body),
        }
    }
}

/// Parses a structured query description into an executable predicate.
pub trait QueryParser: Send + Sync {
    /// Compile `source` or fail with a parse error.
    fn parse(&self, source: &JsonValue) -> Result<Predicate, QueryParseError>;
}

/// Default DSL parser. Holds the engine's analyzer so `match` query text is
/// analyzed the same way document fields are.
pub struct JsonQueryParser {
    analyzer: Arc<dyn Analyzer>,
}

impl JsonQueryParser {
    /// Build a parser around the given analyzer.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer }
    }

    fn single_entry<'a>(
        kind: &str,
        body: &'a JsonValue,
    ) -> Result<(&'a String, &'a JsonValue), QueryParseError> {
        let map = body.as_object().ok_or_else(|| QueryParseError::Malformed {
            kind: kind.to_string(),
            reason: "body must be an object".into(),
        })?;
        if map.len() != 1 {
            return Err(QueryParseError::Malformed {
                kind: kind.to_string(),
                reason: "body must contain exactly one field".into(),
            });
        }
        Ok(map.iter().next().expect("len checked above"))
    }

    fn scalar_to_string(kind: &str, field: &str, value: &JsonValue) -> Result<String, QueryParseError> {
        match value {
            JsonValue::String(s) => Ok(s.clone()),
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::Bool(b) => Ok(b.to_string()),
            _ => Err(QueryParseError::Malformed {
                kind: kind.to_string(),
                reason: format!("value for field [{field}] must be a scalar"),
            }),
        }
    }

    fn parse_clauses(&self, value: &JsonValue) -> Result<Vec<Predicate>, QueryParseError> {
        // A clause list may be a single object or an array of objects.
        match value {
            JsonValue::Array(items) => items.iter().map(|item| self.parse(item)).collect(),
            JsonValue::Object(_) => Ok(vec![self.parse(value)?]),
            _ => Err(QueryParseError::Malformed {
                kind: "bool".into(),
                reason: "clauses must be an object or an array of objects".into(),
            }),
        }
    }

    fn parse_range(&self, body: &JsonValue) -> Result<Predicate, QueryParseError> {
        let (field, bounds) = Self::single_entry("range", body)?;
        let bounds = bounds.as_object().ok_or_else(|| QueryParseError::Malformed {
            kind: "range".into(),
            reason: format!("bounds for field [{field}] must be an object"),
        })?;

        let mut lower = None;
        let mut upper = None;
        let mut include_lower = true;
        let mut include_upper = true;
        for (bound, value) in bounds {
            let value = Self::scalar_to_string("range", field, value)?;
            match bound.as_str() {
                "gte" => {
                    lower = Some(value);
                    include_lower = true;
                }
                "gt" => {
                    lower = Some(value);
                    include_lower = false;
                }
                "lte" => {
                    upper = Some(value);
                    include_upper = true;
                }
                "lt" => {
                    upper = Some(value);
                    include_upper = false;
                }
                other => {
                    return Err(QueryParseError::Malformed {
                        kind: "range".into(),
                        reason: format!("unknown bound [{other}]"),
                    })
                }
            }
        }
        if lower.is_none() && upper.is_none() {
            return Err(QueryParseError::Malformed {
                kind: "range".into(),
                reason: format!("field [{field}] needs at least one bound"),
            });
        }
        Ok(Predicate::Range {
            field: field.clone(),
            lower,
            upper,
            include_lower,
            include_upper,
        })
    }
}

impl QueryParser for JsonQueryParser {
    fn parse(&self, source: &JsonValue) -> Result<Predicate, QueryParseError> {
        let map = source.as_object().ok_or(QueryParseError::NotAnObject)?;
        if map.len() != 1 {
            return Err(QueryParseError::NotAnObject);
        }
        let (kind, body) = map.iter().next().expect("len checked above");

        match kind.as_str() {
            "match_all" => Ok(Predicate::MatchAll),
            "match_none" => Ok(Predicate::MatchNone),
            "term" => {
                let (field, value) = Self::single_entry("term", body)?;
                Ok(Predicate::Term {
                    field: field.clone(),
                    value: Self::scalar_to_string("term", field, value)?,
                })
            }
            "match" => {
                let (field, value) = Self::single_entry("match", body)?;
                let text = Self::scalar_to_string("match", field, value)?;
                let tokens = self
                    .analyzer
                    .analyze(field, &text)
                    .map_err(|source| QueryParseError::Analysis {
                        field: field.clone(),
                        source,
                    })?;
                Ok(Predicate::Match {
                    field: field.clone(),
                    terms: tokens.into_iter().map(|t| t.term).collect(),
                })
            }
            "prefix" => {
                let (field, value) = Self::single_entry("prefix", body)?;
                Ok(Predicate::Prefix {
                    field: field.clone(),
                    value: Self::scalar_to_string("prefix", field, value)?,
                })
            }
            "range" => self.parse_range(body),
            "bool" => {
                let clauses = body.as_object().ok_or_else(|| QueryParseError::Malformed {
                    kind: "bool".into(),
                    reason: "body must be an object".into(),
                })?;
                let mut must = Vec::new();
                let mut should = Vec::new();
                let mut must_not = Vec::new();
                for (occur, value) in clauses {
                    let parsed = self.parse_clauses(value)?;
                    match occur.as_str() {
                        "must" => must.extend(parsed),
                        "should" => should.extend(parsed),
                        "must_not" => must_not.extend(parsed),
                        other => {
                            return Err(QueryParseError::Malformed {
                                kind: "bool".into(),
                                reason: format!("unknown occurrence [{other}]"),
                            })
                        }
                    }
                }
                Ok(Predicate::Bool {
                    must,
                    should,
                    must_not,
                })
            }
            other => Err(QueryParseError::UnknownKind(other.to_string())),
        }
    }
}
