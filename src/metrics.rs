// Metrics hooks for the percolation engine.
//
// Callers install a global `PercolateMetrics` implementation via
// [`set_percolate_metrics`]; `Percolator` then reports per-call latency,
// mode, and match counts. This keeps instrumentation decoupled from any
// specific metrics backend.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

/// Which matching algorithm a percolate call used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercolateMode {
    /// Exhaustive scan of the registry snapshot.
    Scan,
    /// Two-phase candidate filtering against a percolator shard.
    Filtered,
}

/// Metrics observer for percolate operations.
pub trait PercolateMetrics: Send + Sync {
    /// Record the outcome of one percolate call.
    ///
    /// `mode` is the algorithm that ran, `latency` the wall-clock duration
    /// of the call, and `match_count` the number of query names returned.
    fn record_percolate(&self, mode: PercolateMode, latency: Duration, match_count: usize);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PercolateMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn PercolateMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn PercolateMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global percolate metrics recorder.
///
/// Typically called once during service startup so every `Percolator`
/// shares the same metrics backend.
pub fn set_percolate_metrics(recorder: Option<Arc<dyn PercolateMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().expect("percolate metrics lock poisoned");
    *guard = recorder;
}
