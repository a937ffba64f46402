use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use compact_str::CompactString;
use lockprof_clock::current_tid;
use lockprof_types::{
    Event, FrameInterner, InternerSnapshot, LockHash, LockInterner, LockSnapshot, StackFrame,
    StackHash, TraceInterner,
};
use parking_lot::Mutex;

thread_local! {
    /// Per-thread enable depth. Shared by every [`Tracer`] instance in the
    /// process: the gating rule in spec §4.C talks about "the calling
    /// thread's enable count", not "this tracer's enable count".
    static ENABLE_COUNT: Cell<u32> = const { Cell::new(0) };
}

/// RAII guard produced by [`register_function`], [`register_coroutine`],
/// [`register_generator`], and manual [`enable`] calls. Decrementing on
/// `Drop` covers both normal return and unwinding failure exits (spec §6).
pub struct EnableGuard(());

impl EnableGuard {
    #[inline]
    fn enter() -> Self {
        ENABLE_COUNT.with(|c| c.set(c.get() + 1));
        EnableGuard(())
    }
}

impl Drop for EnableGuard {
    #[inline]
    fn drop(&mut self) {
        ENABLE_COUNT.with(|c| c.set(c.get().saturating_sub(1)));
    }
}

/// Unconditionally increments the calling thread's enable count. Paired
/// with [`disable`].
#[inline]
pub fn enable() {
    ENABLE_COUNT.with(|c| c.set(c.get() + 1));
}

/// Unconditionally decrements the calling thread's enable count. A no-op
/// floor at zero — disabling an already-disabled thread never underflows.
#[inline]
pub fn disable() {
    ENABLE_COUNT.with(|c| c.set(c.get().saturating_sub(1)));
}

/// Returns the calling thread's current enable count.
#[inline]
pub fn enable_count() -> u32 {
    ENABLE_COUNT.with(Cell::get)
}

/// Wraps `f` so that its body runs with profiling enabled on entry and
/// disabled on exit (both normal return and panic unwind).
pub fn register_function<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    move || {
        let _guard = EnableGuard::enter();
        f()
    }
}

/// Wraps a future so every `poll` (every resume) runs with profiling
/// enabled, and profiling reverts to its prior state the instant `poll`
/// returns — whether that's a suspension (`Poll::Pending`) or completion.
/// This is the same mechanism for `register_coroutine` and
/// `register_generator`: Rust's `Future::poll` already has exactly this
/// "increment on resume, decrement on suspend or completion" shape.
pub struct TracedFuture<F> {
    inner: F,
}

impl<F: core::future::Future> core::future::Future for TracedFuture<F> {
    type Output = F::Output;

    fn poll(
        self: core::pin::Pin<&mut Self>,
        cx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Self::Output> {
        let _guard = EnableGuard::enter();
        // SAFETY: we never move `inner` out from behind the pin; projecting
        // through `get_unchecked_mut` only hands out a `&mut` to a field we
        // never relocate.
        #[allow(unsafe_code)]
        let inner = unsafe { self.get_unchecked_mut() };
        #[allow(unsafe_code)]
        let inner = unsafe { core::pin::Pin::new_unchecked(&mut inner.inner) };
        inner.poll(cx)
    }
}

/// See [`TracedFuture`]. Named separately per the registration API in spec
/// §6; both coroutines and generators are modeled identically here.
pub fn register_coroutine<F: core::future::Future>(future: F) -> TracedFuture<F> {
    TracedFuture { inner: future }
}

/// See [`TracedFuture`].
pub fn register_generator<F: core::future::Future>(future: F) -> TracedFuture<F> {
    TracedFuture { inner: future }
}

/// Best-effort snapshot of the current call stack, innermost frame first.
/// Returns an empty vector if capture is unavailable — the caller interns
/// that as the empty trace (handle 0), per spec §4.C.
pub fn capture_stack(skip_frames: usize) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut skip_remaining = skip_frames;
    backtrace::trace(|frame| {
        if skip_remaining > 0 {
            skip_remaining -= 1;
            return true;
        }
        let mut recorded = false;
        backtrace::resolve_frame(frame, |symbol| {
            if recorded {
                return;
            }
            let file = symbol
                .filename()
                .map(|p| CompactString::from(p.to_string_lossy().as_ref()))
                .unwrap_or_else(|| CompactString::from("<unknown>"));
            let line_no = symbol.lineno().unwrap_or(0);
            let function_name = symbol
                .name()
                .map(|n| CompactString::from(n.to_string()))
                .unwrap_or_else(|| CompactString::from("<unknown>"));
            frames.push(StackFrame::new(file, line_no, function_name));
            recorded = true;
        });
        true
    });
    frames
}

struct Buffers {
    by_tid: Mutex<HashMap<u32, Arc<Mutex<Vec<Event>>>>>,
}

impl Buffers {
    fn new() -> Self {
        Self {
            by_tid: Mutex::new(HashMap::new()),
        }
    }

    fn local(&self) -> Arc<Mutex<Vec<Event>>> {
        thread_local! {
            static LOCAL: RefCell<HashMap<usize, Arc<Mutex<Vec<Event>>>>> = RefCell::new(HashMap::new());
        }
        let key = self as *const Self as usize;
        LOCAL.with(|local| {
            let mut local = local.borrow_mut();
            if let Some(buf) = local.get(&key) {
                return buf.clone();
            }
            let tid = current_tid();
            let buf = self
                .by_tid
                .lock()
                .entry(tid)
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                .clone();
            local.insert(key, buf.clone());
            buf
        })
    }

    fn drain_all(&self) -> Vec<Event> {
        let buffers = self.by_tid.lock();
        let mut all = Vec::new();
        for buf in buffers.values() {
            all.extend(buf.lock().iter().copied());
        }
        all
    }
}

/// An independent tracer: its own lock/frame/trace interners and its own
/// per-thread event buffers. The default, process-wide instance lives
/// behind the free functions in `lockprof`; tests and embedders that want
/// isolation can construct their own.
///
/// The per-thread *enable count* is deliberately **not** owned by `Tracer`
/// — it is shared ambient state per spec §4.C, so multiple tracers observing
/// the same thread agree on whether that thread is currently profiling.
pub struct Tracer {
    locks: LockInterner,
    frames: FrameInterner,
    traces: TraceInterner,
    buffers: Buffers,
    exhausted: AtomicBool,
}

impl Tracer {
    pub fn new() -> Self {
        Self {
            locks: LockInterner::new(),
            frames: FrameInterner::new(),
            traces: TraceInterner::new(),
            buffers: Buffers::new(),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Records an acquire event iff the calling thread's enable count is
    /// positive and the tracer has not hit interner capacity. `lock_addr`
    /// should be the lock's stable object identity (e.g. its address);
    /// `label` is only invoked the first time this identity is seen.
    pub fn acquire_hook(
        &self,
        lock_addr: usize,
        label: impl FnOnce() -> CompactString,
        wait_start_ts: i64,
        wait_end_ts: i64,
        stack: &[StackFrame],
    ) {
        if self.exhausted.load(Ordering::Relaxed) || enable_count() == 0 {
            return;
        }
        let Some(lock_hash) = self.locks.intern(lock_addr, label) else {
            self.mark_exhausted();
            return;
        };
        let stack_hash = self.intern_stack(stack);
        let Some(stack_hash) = stack_hash else {
            self.mark_exhausted();
            return;
        };
        // `timestamp` is the start of the wait, not the moment of acquisition:
        // the aggregator reconstructs "acquired at" as `timestamp + duration`
        // (spec §4.D.3's acquire interval is `[a.timestamp, a.timestamp +
        // a.duration)`).
        let event = Event {
            timestamp: wait_start_ts,
            duration: wait_end_ts - wait_start_ts,
            tid: current_tid(),
            lock_hash,
            stack_hash,
        };
        self.buffers.local().lock().push(event);
    }

    /// Records a release event (`duration == -1`) iff the calling thread's
    /// enable count is positive.
    pub fn release_hook(&self, lock_addr: usize, label: impl FnOnce() -> CompactString, ts: i64) {
        if self.exhausted.load(Ordering::Relaxed) || enable_count() == 0 {
            return;
        }
        let Some(lock_hash) = self.locks.intern(lock_addr, label) else {
            self.mark_exhausted();
            return;
        };
        let event = Event {
            timestamp: ts,
            duration: lockprof_types::RELEASE_SENTINEL,
            tid: current_tid(),
            lock_hash,
            stack_hash: lockprof_types::EMPTY_STACK_HASH,
        };
        self.buffers.local().lock().push(event);
    }

    fn intern_stack(&self, stack: &[StackFrame]) -> Option<StackHash> {
        if stack.is_empty() {
            return Some(lockprof_types::EMPTY_STACK_HASH);
        }
        let mut frame_ids = Vec::with_capacity(stack.len());
        for frame in stack {
            frame_ids.push(self.frames.intern(frame.clone())?);
        }
        self.traces.intern(frame_ids)
    }

    fn mark_exhausted(&self) {
        if !self.exhausted.swap(true, Ordering::Relaxed) {
            tracing::warn!("lockprof interner capacity exhausted; further events are dropped");
        }
    }

    /// Freezes nothing by itself (callers are expected to `disable()` every
    /// profiled thread first, per spec §5) and returns a snapshot of
    /// everything captured so far. Pure with respect to the tracer's state:
    /// calling this twice with no intervening events yields structurally
    /// equal snapshots.
    pub fn get_stats(&self) -> LockSnapshot {
        LockSnapshot {
            lock_list: self.buffers.drain_all(),
            lock_hashes: self.locks.snapshot(),
            stack_hashes: InternerSnapshot::resolve_traces(&self.traces, &self.frames),
            diagnostics: lockprof_types::SnapshotDiagnostics {
                interner_exhausted: self.exhausted.load(Ordering::Relaxed),
            },
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_are_noop_when_disabled() {
        let tracer = Tracer::new();
        tracer.acquire_hook(0x1, || "lock".into(), 0, 10, &[]);
        assert!(tracer.get_stats().lock_list.is_empty());
    }

    #[test]
    fn acquire_and_release_are_recorded_when_enabled() {
        let tracer = Tracer::new();
        enable();
        tracer.acquire_hook(0x1, || "lock".into(), 100, 150, &[]);
        tracer.release_hook(0x1, || "lock".into(), 300);
        disable();

        let snapshot = tracer.get_stats();
        assert_eq!(snapshot.lock_list.len(), 2);
        assert_eq!(snapshot.lock_list[0].duration, 50);
        assert_eq!(snapshot.lock_list[1].duration, -1);
        assert_eq!(snapshot.lock_hashes.len(), 1);
    }

    #[test]
    fn register_function_restores_enable_count_on_panic() {
        let before = enable_count();
        let wrapped = register_function(|| -> i32 { panic!("boom") });
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(wrapped));
        assert!(result.is_err());
        assert_eq!(enable_count(), before);
    }

    #[test]
    fn nested_enable_disable_is_depth_counted() {
        let before = enable_count();
        enable();
        enable();
        assert_eq!(enable_count(), before + 2);
        disable();
        assert_eq!(enable_count(), before + 1);
        disable();
        assert_eq!(enable_count(), before);
    }

    #[tokio::test]
    async fn traced_future_keeps_enabled_only_while_polling() {
        let before = enable_count();
        let observed = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let observed2 = observed.clone();
        let fut = register_coroutine(async move {
            observed2.lock().unwrap().push(enable_count());
            tokio::task::yield_now().await;
            observed2.lock().unwrap().push(enable_count());
        });
        fut.await;
        assert_eq!(enable_count(), before);
        for count in observed.lock().unwrap().iter() {
            assert_eq!(*count, before + 1);
        }
    }

    #[test]
    fn get_stats_is_idempotent_absent_new_events() {
        let tracer = Tracer::new();
        enable();
        tracer.acquire_hook(0x1, || "lock".into(), 0, 5, &[]);
        disable();

        let a = tracer.get_stats();
        let b = tracer.get_stats();
        assert_eq!(a.lock_list, b.lock_list);
        assert_eq!(a.lock_hashes, b.lock_hashes);
    }
}
