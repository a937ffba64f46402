//! Lock contention profiler facade.
//!
//! ```no_run
//! use lockprof::DiagnosticMutex;
//!
//! let counter = DiagnosticMutex::new("counter", 0u64);
//! *counter.lock() += 1;
//!
//! lockprof::dump_stats("session.pclprof").unwrap();
//! ```
//!
//! With the `diagnostics` feature off (the default), [`DiagnosticMutex`]
//! and [`DiagnosticRwLock`] compile down to plain `parking_lot` wrappers —
//! no interning, no event recording, no exit hook installed. Enable
//! `diagnostics` to get the real tracer: every lock wrapped with this
//! crate's types records acquire/release events, and the process
//! registers a one-shot `atexit` hook that writes a `.pclprof` report.
//!
//! No init call needed — when `diagnostics` is on, lockprof wires up its
//! default [`lockprof_tracer::Tracer`] and exit hook via `ctor` the moment
//! this crate is loaded.

mod locks;

pub use locks::{DiagnosticMutex, DiagnosticRwLock};

pub use lockprof_aggregate::{
    aggregate, aggregate_with, AggregateDiagnostics, FrameFilter, LineKey, ReducedStats,
    ResidualDepth, Timeline,
};
pub use lockprof_clock::{current_tid, now};
pub use lockprof_report::{DumpError, STATS_FILENAME_ENV};
pub use lockprof_tracer::{
    capture_stack, disable, enable, enable_count, register_coroutine, register_function,
    register_generator,
};
pub use lockprof_types::{Event, LockHash, LockSnapshot, LockStats, StackFrame, StackHash};

use std::path::Path;
use std::sync::OnceLock;

/// The process-wide default tracer. Every [`DiagnosticMutex`] and
/// [`DiagnosticRwLock`] constructed without an explicit tracer records
/// into this instance (spec §9's design note: "an exit hook owns the
/// default instance").
pub(crate) fn default_tracer() -> &'static lockprof_tracer::Tracer {
    static TRACER: OnceLock<lockprof_tracer::Tracer> = OnceLock::new();
    TRACER.get_or_init(lockprof_tracer::Tracer::new)
}

/// Freezes and returns the default tracer's current snapshot (spec §4.C).
pub fn get_stats() -> LockSnapshot {
    default_tracer().get_stats()
}

/// Aggregates the default tracer's current snapshot and writes it as a
/// `.pclprof` document at `path` (spec §6's dump API).
pub fn dump_stats(path: impl AsRef<Path>) -> Result<(), DumpError> {
    let snapshot = get_stats();
    let (reduced, _timeline) = lockprof_aggregate::aggregate(&snapshot);
    lockprof_report::write_report(path, &reduced)
}

#[cfg(feature = "diagnostics")]
#[ctor::ctor]
fn install_default_tracer_hooks() {
    lockprof_report::set_dump_source(|| default_tracer().get_stats());
    lockprof_report::install_atexit_hook();
    tracing::debug!("lockprof: default tracer and exit hook installed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_stats_is_callable_before_any_lock_is_touched() {
        let _ = get_stats();
    }

    #[test]
    fn dump_stats_writes_a_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("lockprof-test-{:p}.pclprof", &dir));
        dump_stats(&path).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
