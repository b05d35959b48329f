//! The ephemeral single-document inverted index.
//!
//! A [`MemoryIndex`] is built fresh from one materialized document at the
//! start of a percolate call and dropped when the call returns; ownership
//! is the scope guard, so the backing structures are freed on every exit
//! path including errors. Its only downstream capability is existence-only
//! predicate execution, so the reader surface is deliberately small: term
//! lookup, prefix and range probes, and positions for phrase-style checks.
use hashbrown::HashMap;

use crate::analysis::Analyzer;
use crate::error::PercolateError;
use crate::mapper::{FieldValue, MaterializedDocument};

#[derive(Debug, Default)]
struct FieldPostings {
    /// term -> ordered token positions within the field.
    terms: HashMap<String, Vec<u32>>,
    /// Effective boost (field boost x document boost). Inert for
    /// existence-only search but kept so the index mirrors what was fed in.
    boost: f32,
}

/// Transient in-memory inverted index over exactly one document.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    fields: HashMap<String, FieldPostings>,
}

impl MemoryIndex {
    /// Index every indexable field of `doc`.
    ///
    /// Field strategies, in priority order: a pre-built token stream is
    /// taken as-is; text is run through `analyzer`; keyword values become a
    /// single verbatim term. Analysis failure on any field aborts the build.
    pub fn from_document(
        doc: &MaterializedDocument,
        analyzer: &dyn Analyzer,
    ) -> Result<Self, PercolateError> {
        let mut index = Self::default();
        for field in &doc.fields {
            if !field.indexed {
                continue;
            }
            let boost = field.boost * doc.boost;
            match &field.value {
                FieldValue::Tokens(tokens) => {
                    for token in tokens {
                        index.insert(&field.name, &token.term, token.position, boost);
                    }
                }
                FieldValue::Text(text) => {
                    let tokens = analyzer.analyze(&field.name, text).map_err(|source| {
                        PercolateError::FieldAnalysis {
                            field: field.name.clone(),
                            source,
                        }
                    })?;
                    for token in tokens {
                        index.insert(&field.name, &token.term, token.position, boost);
                    }
                }
                FieldValue::Keyword(value) => {
                    index.insert(&field.name, value, 0, boost);
                }
            }
        }
        Ok(index)
    }

    fn insert(&mut self, field: &str, term: &str, position: u32, boost: f32) {
        let postings = self.fields.entry(field.to_string()).or_default();
        postings.boost = boost;
        postings
            .terms
            .entry(term.to_string())
            .or_default()
            .push(position);
    }

    /// Whether the exact `term` exists in `field`.
    pub fn has_term(&self, field: &str, term: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|p| p.terms.contains_key(term))
    }

    /// Whether any term in `field` starts with `prefix`.
    pub fn has_prefix(&self, field: &str, prefix: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|p| p.terms.keys().any(|t| t.starts_with(prefix)))
    }

    /// Whether any term in `field` falls inside the lexicographic range.
    pub fn has_term_in_range(
        &self,
        field: &str,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> bool {
        let Some(postings) = self.fields.get(field) else {
            return false;
        };
        postings.terms.keys().any(|term| {
            let above = match lower {
                Some(bound) if include_lower => term.as_str() >= bound,
                Some(bound) => term.as_str() > bound,
                None => true,
            };
            let below = match upper {
                Some(bound) if include_upper => term.as_str() <= bound,
                Some(bound) => term.as_str() < bound,
                None => true,
            };
            above && below
        })
    }

    /// Ordered positions of `term` in `field`, if present.
    pub fn positions(&self, field: &str, term: &str) -> Option<&[u32]> {
        self.fields
            .get(field)
            .and_then(|p| p.terms.get(term))
            .map(Vec::as_slice)
    }

    /// Effective boost recorded for `field`, if the field was indexed.
    pub fn field_boost(&self, field: &str) -> Option<f32> {
        self.fields.get(field).map(|p| p.boost)
    }

    /// Number of distinct indexed fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// True when no field produced any postings.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
