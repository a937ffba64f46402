use compact_str::CompactString;
use lockprof_types::LockHash;

/// Diagnostics surfaced by aggregation instead of raised as errors (spec
/// §7): the hot path never knows about these, only the offline reducer does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateDiagnostics {
    /// Count of release events with no matching acquire on the scratch
    /// stack for their `(tid, lock_hash)` (error #1: discarded, non-fatal).
    pub unbalanced_releases: u64,
    /// One entry per `(tid, lock_hash)` whose scratch stack was still
    /// nonempty after the last event (error #2: acceptable unbalanced
    /// tail; see spec §9's open question about mid-session toggling).
    pub residual_depths: Vec<ResidualDepth>,
    /// Propagated from [`lockprof_types::SnapshotDiagnostics`]: the tracer
    /// hit interner capacity and disabled itself mid-session.
    pub interner_exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualDepth {
    pub tid: u32,
    pub lock_hash: LockHash,
    pub depth: u32,
}

/// Key for a per-(file, line, lock) statistics bucket (spec §4.D.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub file: CompactString,
    pub line_no: u32,
    pub lock_hash: LockHash,
}
