use compact_str::CompactString;
use lockprof_types::{LockSnapshot, StackFrame};

/// No-op stand-in for [`crate::enabled::EnableGuard`]. Carries no state.
pub struct EnableGuard;

/// No-op: without the `diagnostics` feature there is no enable count to
/// track.
#[inline(always)]
pub fn enable() {}

/// No-op counterpart to [`enable`].
#[inline(always)]
pub fn disable() {}

/// Always zero when `diagnostics` is disabled.
#[inline(always)]
pub fn enable_count() -> u32 {
    0
}

/// Returns `f` unwrapped: no guard to install.
#[inline(always)]
pub fn register_function<F, R>(f: F) -> F
where
    F: FnOnce() -> R,
{
    f
}

/// Returns the future unwrapped: no guard to install.
#[inline(always)]
pub fn register_coroutine<F: core::future::Future>(future: F) -> F {
    future
}

/// Returns the future unwrapped: no guard to install.
#[inline(always)]
pub fn register_generator<F: core::future::Future>(future: F) -> F {
    future
}

/// Always empty when `diagnostics` is disabled.
#[inline(always)]
pub fn capture_stack(_skip_frames: usize) -> Vec<StackFrame> {
    Vec::new()
}

/// Zero-cost stand-in for [`crate::enabled::Tracer`]. Every method is a
/// no-op; `get_stats` always reports an empty, non-exhausted snapshot.
#[derive(Default)]
pub struct Tracer;

impl Tracer {
    pub fn new() -> Self {
        Self
    }

    #[inline(always)]
    pub fn acquire_hook(
        &self,
        _lock_addr: usize,
        _label: impl FnOnce() -> CompactString,
        _wait_start_ts: i64,
        _wait_end_ts: i64,
        _stack: &[StackFrame],
    ) {
    }

    #[inline(always)]
    pub fn release_hook(&self, _lock_addr: usize, _label: impl FnOnce() -> CompactString, _ts: i64) {}

    #[inline(always)]
    pub fn get_stats(&self) -> LockSnapshot {
        LockSnapshot::default()
    }
}
