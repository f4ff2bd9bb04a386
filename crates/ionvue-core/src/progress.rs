//! Progress reporting and cooperative cancellation.
//!
//! Key contracts:
//! - Long loops poll the cancel flag every [`PROGRESS_CHUNK`] records and
//!   return their abort error promptly when it is raised.
//! - Progress counters are plain atomics; any thread may read them while a
//!   refresh runs, and workers serialise their updates through them.
//! - A refresh that spawned rayon work must not return until every worker
//!   has finished or observed the abort flag.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Poll cadence for cancellation and progress updates, in records.
pub const PROGRESS_CHUNK: usize = 5000;

/// Shared cancellation flag. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared progress counters for one tree refresh.
///
/// `filter_progress` is the active filter's 0..=100 counter; the step
/// fields describe multi-stage filters (build tree, query, bin, ...).
#[derive(Debug, Default)]
pub struct ProgressSink {
    filter_progress: AtomicU32,
    total_progress: AtomicU32,
    step: AtomicU32,
    max_step: AtomicU32,
    labels: Mutex<ProgressLabels>,
}

#[derive(Debug, Default, Clone)]
struct ProgressLabels {
    step_name: String,
    current_filter: String,
}

/// A point-in-time snapshot of the sink, for hosts that display progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressData {
    pub filter_progress: u32,
    pub total_progress: u32,
    pub step: u32,
    pub max_step: u32,
    pub step_name: String,
    pub current_filter: String,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the active filter's progress, clamped to 100.
    pub fn set_filter_progress(&self, pct: u32) {
        self.filter_progress.store(pct.min(100), Ordering::Relaxed);
    }

    pub fn set_total_progress(&self, pct: u32) {
        self.total_progress.store(pct.min(100), Ordering::Relaxed);
    }

    /// Begin a named step within the active filter; resets the per-filter
    /// counter.
    pub fn begin_step(&self, step: u32, max_step: u32, name: &str) {
        self.step.store(step, Ordering::Relaxed);
        self.max_step.store(max_step, Ordering::Relaxed);
        self.filter_progress.store(0, Ordering::Relaxed);
        self.labels.lock().step_name = name.to_string();
    }

    pub fn set_current_filter(&self, name: &str) {
        self.filter_progress.store(0, Ordering::Relaxed);
        self.labels.lock().current_filter = name.to_string();
    }

    pub fn snapshot(&self) -> ProgressData {
        let labels = self.labels.lock().clone();
        ProgressData {
            filter_progress: self.filter_progress.load(Ordering::Relaxed),
            total_progress: self.total_progress.load(Ordering::Relaxed),
            step: self.step.load(Ordering::Relaxed),
            max_step: self.max_step.load(Ordering::Relaxed),
            step_name: labels.step_name,
            current_filter: labels.current_filter,
        }
    }
}

/// Everything a loader or filter needs to report progress and observe
/// cancellation during a refresh.
#[derive(Clone)]
pub struct RefreshContext {
    pub progress: Arc<ProgressSink>,
    pub cancel: CancelFlag,
}

impl Default for RefreshContext {
    fn default() -> Self {
        Self {
            progress: Arc::new(ProgressSink::new()),
            cancel: CancelFlag::new(),
        }
    }
}

impl RefreshContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let a = CancelFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_progress_snapshot() {
        let sink = ProgressSink::new();
        sink.set_current_filter("Bounding box");
        sink.begin_step(1, 2, "Bound compute");
        sink.set_filter_progress(250);
        let snap = sink.snapshot();
        assert_eq!(snap.filter_progress, 100);
        assert_eq!(snap.step, 1);
        assert_eq!(snap.max_step, 2);
        assert_eq!(snap.step_name, "Bound compute");
        assert_eq!(snap.current_filter, "Bounding box");
    }
}
