//! The offline aggregation pipeline (spec §4.D): turns a `LockSnapshot`
//! into per-lock statistics, per-(file, line, lock) statistics, and a
//! swimlane timeline model.
//!
//! Nothing in this crate runs on the hot path — it is handed a frozen
//! snapshot after profiling has quiesced and reduces it in one or two
//! linear passes.

mod frame_filter;
mod reduce;
mod timeline;
mod types;

pub use frame_filter::FrameFilter;
pub use reduce::{reduce, ReducedStats};
pub use timeline::{
    build_timeline, IntervalKind, RenderInterval, Swimlane, Timeline, DEFAULT_PIXELS_PER_SECOND,
};
pub use types::{AggregateDiagnostics, LineKey, ResidualDepth};

use lockprof_types::LockSnapshot;

/// Runs both the statistics reduction and the timeline build over a single
/// snapshot, using the default frame filter and pixel scale.
pub fn aggregate(snapshot: &LockSnapshot) -> (ReducedStats, Timeline) {
    aggregate_with(snapshot, &FrameFilter::default(), DEFAULT_PIXELS_PER_SECOND)
}

/// Same as [`aggregate`] with an explicit filter and pixel scale.
pub fn aggregate_with(
    snapshot: &LockSnapshot,
    filter: &FrameFilter,
    pixels_per_second: f64,
) -> (ReducedStats, Timeline) {
    if snapshot.diagnostics.interner_exhausted {
        tracing::warn!("aggregating a snapshot recorded after interner exhaustion");
    }
    let stats = reduce::reduce(snapshot, filter);
    let timeline = timeline::build_timeline(snapshot, pixels_per_second);
    (stats, timeline)
}
