//! The percolator-shard surface used by two-phase (Mode B) matching.
//!
//! A percolator shard holds one stored document per registered query, keyed
//! by the query's name in the reserved identifier field. A cheap filter
//! query over those stored documents narrows the candidate set before the
//! expensive per-query re-execution; the shard is never the source of
//! truth for a match.
//!
//! [`PercolatorShard::searcher`] returns a guard value. Dropping the guard
//! releases the shard handle, so acquisition-to-release is tied to scope
//! and survives every exit path.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::analysis::Analyzer;
use crate::error::{ExecutionError, PercolateError};
use crate::mapper::{FieldValue, IndexField, MaterializedDocument};
use crate::memory_index::MemoryIndex;
use crate::query::Predicate;

/// Identifier field every stored query document carries.
pub const ID_FIELD: &str = "_id";

/// Read-only search pass over a shard's stored query documents.
///
/// Candidates are visited in unspecified order. The searcher borrows the
/// shard; dropping it releases the handle.
pub trait ShardSearcher {
    /// Run `filter` over the stored documents, invoking `visitor` with the
    /// identifier of every document the filter matches.
    fn visit(
        &self,
        filter: &Predicate,
        visitor: &mut dyn FnMut(&str),
    ) -> Result<(), ExecutionError>;
}

/// An auxiliary index whose documents each represent one registered query.
pub trait PercolatorShard: Send + Sync {
    /// Acquire a searcher over the current stored documents.
    fn searcher(&self) -> Box<dyn ShardSearcher + '_>;
}

/// In-process shard implementation backed by one [`MemoryIndex`] per
/// stored query document.
pub struct InMemoryQueryShard {
    analyzer: Arc<dyn Analyzer>,
    docs: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryQueryShard {
    /// Build an empty shard; `analyzer` tokenizes stored document text.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Store (or replace) the document representing query `name`.
    ///
    /// The identifier field is added automatically, so filters can always
    /// target it.
    pub fn index_query(
        &self,
        name: &str,
        mut doc: MaterializedDocument,
    ) -> Result<(), PercolateError> {
        doc.fields
            .push(IndexField::new(ID_FIELD, FieldValue::Keyword(name.to_string())));
        let index = MemoryIndex::from_document(&doc, self.analyzer.as_ref())?;
        let mut guard = self
            .docs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(name.to_string(), index);
        Ok(())
    }

    /// Remove the stored document for query `name`, if present.
    pub fn delete_query(&self, name: &str) {
        let mut guard = self
            .docs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(name);
    }

    /// Number of stored query documents.
    pub fn len(&self) -> usize {
        let guard = self
            .docs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }

    /// True when no query documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct InMemorySearcher<'a> {
    docs: RwLockReadGuard<'a, HashMap<String, MemoryIndex>>,
}

impl ShardSearcher for InMemorySearcher<'_> {
    fn visit(
        &self,
        filter: &Predicate,
        visitor: &mut dyn FnMut(&str),
    ) -> Result<(), ExecutionError> {
        for (name, index) in self.docs.iter() {
            if filter.execute(index)? {
                visitor(name);
            }
        }
        Ok(())
    }
}

impl PercolatorShard for InMemoryQueryShard {
    fn searcher(&self) -> Box<dyn ShardSearcher + '_> {
        Box::new(InMemorySearcher {
            docs: self
                .docs
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        })
    }
}
