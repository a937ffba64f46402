use compact_str::CompactString;
use facet::Facet;

/// Dense, append-only handle into the lock interner's lookup table.
///
/// Handles are assigned in first-seen order starting at 0 and never reused.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct LockHash(pub u32);

/// Dense, append-only handle into the stack-frame interner's lookup table.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct FrameId(pub u32);

/// Dense, append-only handle into the stack-trace interner's lookup table.
///
/// `StackHash(0)` is reserved for the empty trace (see
/// [`crate::EMPTY_STACK_HASH`]) and is always present, even before any real
/// capture happens.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct StackHash(pub u32);

/// A single frame of a captured call stack. Compared structurally: two
/// frames are the same frame iff file, line, and function name all match.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackFrame {
    pub file: CompactString,
    pub line_no: u32,
    pub function_name: CompactString,
}

impl StackFrame {
    pub fn new(
        file: impl Into<CompactString>,
        line_no: u32,
        function_name: impl Into<CompactString>,
    ) -> Self {
        Self {
            file: file.into(),
            line_no,
            function_name: function_name.into(),
        }
    }
}

/// The hot-path record. Fixed-size, `Copy`, no heap allocation of its own.
///
/// An acquire has `duration >= 0` (elapsed ns spent waiting). A release
/// carries [`crate::RELEASE_SENTINEL`] (`-1`) in `duration`.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Nanoseconds since an arbitrary monotonic epoch (see `lockprof-clock`).
    pub timestamp: i64,
    /// Acquire: wait time in ns. Release: [`crate::RELEASE_SENTINEL`].
    pub duration: i64,
    /// Thread id, stable for the lifetime of the thread.
    pub tid: u32,
    /// Interned lock identity.
    pub lock_hash: LockHash,
    /// Interned stack trace. Populated for acquires; for releases the
    /// aggregator uses the matching acquire's stack instead, so this field
    /// may be [`crate::EMPTY_STACK_HASH`] on release events.
    pub stack_hash: StackHash,
}

impl Event {
    #[inline]
    pub fn is_acquire(&self) -> bool {
        self.duration >= 0
    }

    #[inline]
    pub fn is_release(&self) -> bool {
        self.duration < 0
    }
}

/// Per-lock (or per-(file,line,lock)) statistics. See spec §3.
///
/// The aggregator's private `depth` counter used to compute these fields is
/// not part of this type — it lives only in the reducer's scratch state.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Every acquire event, including reentrant ones.
    pub hits: u64,
    /// Outermost acquisitions only (depth 0 -> 1 transitions).
    pub acquires: u64,
    pub total_acquire_time: i64,
    pub max_acquire_time: i64,
    pub avg_acquire_time: i64,
    pub total_hold_time: i64,
    pub max_hold_time: i64,
    pub avg_hold_time: i64,
}

impl LockStats {
    /// Finalizes averages from accumulated totals. No-op if `acquires == 0`
    /// (callers should omit such entries rather than call this).
    pub fn finalize_averages(&mut self) {
        if self.acquires == 0 {
            return;
        }
        self.avg_acquire_time = self.total_acquire_time / self.acquires as i64;
        self.avg_hold_time = self.total_hold_time / self.acquires as i64;
    }
}

/// Diagnostics recorded alongside a snapshot, surfaced instead of raised as
/// errors (see spec §7 — the hot path never propagates errors into user
/// code).
#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiagnostics {
    /// Interner capacity was exhausted; the tracer disabled itself.
    pub interner_exhausted: bool,
}

/// Frozen view of everything the tracer captured, produced by `get_stats()`.
///
/// `lock_list` is the concatenation of every thread's buffer: sorted within
/// each thread's subsequence, but not globally sorted.
#[derive(Facet, Debug, Clone, Default)]
pub struct LockSnapshot {
    pub lock_list: Vec<Event>,
    /// Indexed by `lock_hash`.
    pub lock_hashes: Vec<CompactString>,
    /// Indexed by `stack_hash`; each entry is the ordered, innermost-first
    /// frame sequence for that trace.
    pub stack_hashes: Vec<Vec<StackFrame>>,
    pub diagnostics: SnapshotDiagnostics,
}
