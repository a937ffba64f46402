//! Monotonic timestamps and stable per-thread identity (spec §4.A).
//!
//! Both [`now`] and [`current_tid`] are lock-free and allocation-free after
//! the first call on a given thread. `now()` is not synchronized across
//! cores — the aggregator only uses timestamps to order events within a
//! single thread and to lay out the timeline, never to establish a
//! cross-thread total order.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// First-use monotonic anchor. "Profiler birth" is the first call to `now()`.
fn epoch() -> &'static Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now)
}

/// Returns a monotonic nanosecond counter, not wall time.
///
/// Saturates at `i64::MAX` rather than overflowing; in practice this would
/// require a session running for roughly 292 years.
#[inline]
pub fn now() -> i64 {
    let elapsed = epoch().elapsed().as_nanos();
    elapsed.min(i64::MAX as u128) as i64
}

static NEXT_TID: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static TID: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Returns a small, stable integer id for the calling thread. The first
/// call on a thread assigns it the next sequential id; subsequent calls on
/// the same thread return the same value.
#[inline]
pub fn current_tid() -> u32 {
    TID.with(|cell| match cell.get() {
        Some(tid) => tid,
        None => {
            let tid = NEXT_TID.fetch_add(1, Ordering::Relaxed);
            cell.set(Some(tid));
            tid
        }
    })
}
