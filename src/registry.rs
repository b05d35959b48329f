//! The concurrently-mutable query registry.
//!
//! The registry owns the name -> predicate mapping. Mutations follow a
//! copy-mutate-swap discipline: writers serialize on an internal mutex,
//! clone the current snapshot, apply their change, and publish the result
//! with one atomic swap. Readers call [`QueryRegistry::snapshot`], which is
//! an `ArcSwap` load and never blocks; a reader holding a snapshot is
//! unaffected by later mutations.
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use hashbrown::HashMap;
use serde_json::Value as JsonValue;

use crate::error::PercolateError;
use crate::query::{Predicate, QueryParser};

/// Immutable point-in-time view of the registered queries.
///
/// Never mutated after publication; the registry replaces the whole
/// snapshot on every mutation.
#[derive(Debug, Default, Clone)]
pub struct QuerySnapshot {
    entries: HashMap<String, Arc<Predicate>>,
}

impl QuerySnapshot {
    /// Look up a registered predicate by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Predicate>> {
        self.entries.get(name)
    }

    /// Iterate the registered (name, predicate) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<Predicate>)> {
        self.entries.iter()
    }

    /// Whether `name` is registered in this snapshot.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no queries are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of named, compiled queries with lock-free snapshot reads.
pub struct QueryRegistry {
    parser: Arc<dyn QueryParser>,
    published: ArcSwap<QuerySnapshot>,
    // Serializes writers; readers never touch it.
    write: Mutex<()>,
}

impl QueryRegistry {
    /// Build an empty registry around the given query parser.
    pub fn new(parser: Arc<dyn QueryParser>) -> Self {
        Self {
            parser,
            published: ArcSwap::from_pointee(QuerySnapshot::default()),
            write: Mutex::new(()),
        }
    }

    /// Compile `source` and register it under `name` (last write wins).
    ///
    /// On a compilation failure the registry is left unchanged.
    pub fn add_query(&self, name: &str, source: &JsonValue) -> Result<(), PercolateError> {
        let predicate =
            self.parser
                .parse(source)
                .map_err(|source| PercolateError::QueryCompilation {
                    name: name.to_string(),
                    source,
                })?;
        self.add_predicate(name, predicate);
        Ok(())
    }

    /// Register a pre-compiled predicate under `name` (last write wins).
    pub fn add_predicate(&self, name: &str, predicate: Predicate) {
        self.publish(|entries| {
            entries.insert(name.to_string(), Arc::new(predicate));
        });
    }

    /// Remove `name` from the registry. Idempotent: removing an absent
    /// name is not an error and publishes an equivalent snapshot.
    pub fn remove_query(&self, name: &str) {
        self.publish(|entries| {
            entries.remove(name);
        });
    }

    /// Drop every registered query by publishing an empty snapshot. The
    /// prior snapshot's predicates are freed once the last reader holding
    /// it lets go.
    pub fn close(&self) {
        let guard = self
            .write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.published.store(Arc::new(QuerySnapshot::default()));
        drop(guard);
    }

    /// Current snapshot reference. Cheap, non-blocking, never partial.
    pub fn snapshot(&self) -> Arc<QuerySnapshot> {
        self.published.load_full()
    }

    fn publish<F>(&self, mutate: F)
    where
        F: FnOnce(&mut HashMap<String, Arc<Predicate>>),
    {
        let guard = self
            .write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**self.published.load()).clone();
        mutate(&mut next.entries);
        self.published.store(Arc::new(next));
        drop(guard);
    }
}
