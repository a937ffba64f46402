use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use lockprof_aggregate::aggregate;
use lockprof_types::LockSnapshot;

use crate::writer::write_report;

/// Environment variable overriding the default `.pclprof` output path
/// (spec §6).
pub const STATS_FILENAME_ENV: &str = "PC_LINE_PROFILER_STATS_FILENAME";

type DumpSource = Box<dyn Fn() -> LockSnapshot + Send + Sync>;

static DUMP_SOURCE: OnceLock<DumpSource> = OnceLock::new();
static DUMPED: AtomicBool = AtomicBool::new(false);

/// Registers the closure the exit hook calls to obtain the snapshot to
/// dump. Expected to be called once, at startup, by the facade crate that
/// owns the process-wide default `Tracer`. A second call is ignored —
/// there is exactly one default instance per spec §9's design note.
pub fn set_dump_source(source: impl Fn() -> LockSnapshot + Send + Sync + 'static) {
    if DUMP_SOURCE.set(Box::new(source)).is_err() {
        tracing::warn!("lockprof dump source already registered; ignoring");
    }
}

/// Resolves the `.pclprof` output path: the `PC_LINE_PROFILER_STATS_FILENAME`
/// environment variable if set, otherwise `argv[0]`'s basename — either way
/// `.pclprof` is then appended. Matches the original implementation, which
/// appends the extension to `_stats_filename` regardless of where that
/// stem came from.
pub fn default_output_path() -> PathBuf {
    let stem = env::var(STATS_FILENAME_ENV).ok().unwrap_or_else(|| {
        env::args()
            .next()
            .as_deref()
            .and_then(|a| std::path::Path::new(a).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("lockprof")
            .to_string()
    });
    PathBuf::from(format!("{stem}.pclprof"))
}

/// Runs the dump once: aggregates the registered source's current
/// snapshot and writes it to [`default_output_path`]. Idempotent — a
/// second call is a no-op, matching spec §5's "the hook is idempotent".
/// Failure is logged, never propagated (spec §7, error #5).
pub fn run_dump_hook() {
    if DUMPED.swap(true, Ordering::SeqCst) {
        return;
    }
    let Some(source) = DUMP_SOURCE.get() else {
        return;
    };
    let snapshot = source();
    let (reduced, _timeline) = aggregate(&snapshot);
    let path = default_output_path();
    if let Err(err) = write_report(&path, &reduced) {
        tracing::warn!(error = %err, path = %path.display(), "failed to write pclprof report at exit");
    }
}

#[cfg(unix)]
extern "C" fn run_dump_hook_extern() {
    run_dump_hook();
}

/// Installs [`run_dump_hook_extern`] as a `libc::atexit` callback. Called
/// once from the facade crate's `ctor`-driven self-initialization; safe to
/// call more than once, `libc::atexit` simply chains the callbacks (the
/// idempotence guard in [`run_dump_hook`] still applies).
#[cfg(unix)]
pub fn install_atexit_hook() {
    // SAFETY: `run_dump_hook_extern` takes no arguments, returns nothing,
    // and only touches process-wide atomics and a `OnceLock` — it upholds
    // every precondition `atexit` imposes on its callback.
    #[allow(unsafe_code)]
    unsafe {
        libc::atexit(run_dump_hook_extern);
    }
}

#[cfg(not(unix))]
pub fn install_atexit_hook() {
    tracing::warn!("lockprof's dump-at-exit hook is only implemented on unix targets");
}
