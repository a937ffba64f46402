use compact_str::CompactString;
use lockprof_clock::now;
use lockprof_tracer::capture_stack;
use lockprof_types::StackFrame;

use crate::default_tracer;

/// How many innermost frames to skip when capturing a stack at acquire
/// time: `capture_stack` itself and this wrapper's `lock`/`read`/`write`
/// method.
const SKIP_FRAMES: usize = 2;

/// Turns a `#[track_caller]` location into the innermost "user" frame,
/// prepended ahead of whatever `capture_stack` walks. This is what actually
/// attributes an acquire to its call site — `capture_stack`'s own
/// frame-skipping is a best-effort fallback for frames above it, not the
/// primary mechanism.
fn caller_frame(caller: &'static std::panic::Location<'static>) -> StackFrame {
    StackFrame::new(caller.file(), caller.line(), "<lock call site>")
}

fn record_acquire(
    lock_addr: usize,
    label: &CompactString,
    wait_start: i64,
    caller: &'static std::panic::Location<'static>,
) {
    let wait_end = now();
    let mut stack = vec![caller_frame(caller)];
    stack.extend(capture_stack(SKIP_FRAMES));
    default_tracer().acquire_hook(lock_addr, || label.clone(), wait_start, wait_end, &stack);
}

fn record_release(lock_addr: usize, label: &CompactString) {
    let ts = now();
    default_tracer().release_hook(lock_addr, || label.clone(), ts);
}

/// A `parking_lot::Mutex` instrumented to record an acquire event on
/// `lock`/`try_lock` and a release event when the returned guard drops.
pub struct DiagnosticMutex<T> {
    inner: parking_lot::Mutex<T>,
    label: CompactString,
}

impl<T> DiagnosticMutex<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
            label: CompactString::from(name),
        }
    }

    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let caller = std::panic::Location::caller();
        let lock_addr = self as *const _ as usize;
        let wait_start = now();
        let inner = self.inner.lock();
        record_acquire(lock_addr, &self.label, wait_start, caller);
        MutexGuard {
            inner,
            lock_addr,
            label: self.label.clone(),
        }
    }

    #[track_caller]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let caller = std::panic::Location::caller();
        let lock_addr = self as *const _ as usize;
        let wait_start = now();
        let inner = self.inner.try_lock()?;
        record_acquire(lock_addr, &self.label, wait_start, caller);
        Some(MutexGuard {
            inner,
            lock_addr,
            label: self.label.clone(),
        })
    }
}

pub struct MutexGuard<'a, T> {
    inner: parking_lot::MutexGuard<'a, T>,
    lock_addr: usize,
    label: CompactString,
}

impl<T> std::ops::Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> std::ops::DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Recorded while `inner` is still locked: "immediately before the
        // lock is released" per spec §4.C. `inner`'s own drop (after this
        // method returns) is what actually unlocks it.
        record_release(self.lock_addr, &self.label);
    }
}

/// A `parking_lot::RwLock` instrumented the same way as
/// [`DiagnosticMutex`]; readers and writers share one lock identity but
/// get their own release on guard drop.
pub struct DiagnosticRwLock<T> {
    inner: parking_lot::RwLock<T>,
    label: CompactString,
}

impl<T> DiagnosticRwLock<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            inner: parking_lot::RwLock::new(value),
            label: CompactString::from(name),
        }
    }

    #[track_caller]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let caller = std::panic::Location::caller();
        let lock_addr = self as *const _ as usize;
        let wait_start = now();
        let inner = self.inner.read();
        record_acquire(lock_addr, &self.label, wait_start, caller);
        RwLockReadGuard {
            inner,
            lock_addr,
            label: self.label.clone(),
        }
    }

    #[track_caller]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let caller = std::panic::Location::caller();
        let lock_addr = self as *const _ as usize;
        let wait_start = now();
        let inner = self.inner.write();
        record_acquire(lock_addr, &self.label, wait_start, caller);
        RwLockWriteGuard {
            inner,
            lock_addr,
            label: self.label.clone(),
        }
    }

    #[track_caller]
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        let caller = std::panic::Location::caller();
        let lock_addr = self as *const _ as usize;
        let wait_start = now();
        let inner = self.inner.try_read()?;
        record_acquire(lock_addr, &self.label, wait_start, caller);
        Some(RwLockReadGuard {
            inner,
            lock_addr,
            label: self.label.clone(),
        })
    }

    #[track_caller]
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        let caller = std::panic::Location::caller();
        let lock_addr = self as *const _ as usize;
        let wait_start = now();
        let inner = self.inner.try_write()?;
        record_acquire(lock_addr, &self.label, wait_start, caller);
        Some(RwLockWriteGuard {
            inner,
            lock_addr,
            label: self.label.clone(),
        })
    }
}

pub struct RwLockReadGuard<'a, T> {
    inner: parking_lot::RwLockReadGuard<'a, T>,
    lock_addr: usize,
    label: CompactString,
}

impl<T> std::ops::Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        record_release(self.lock_addr, &self.label);
    }
}

pub struct RwLockWriteGuard<'a, T> {
    inner: parking_lot::RwLockWriteGuard<'a, T>,
    lock_addr: usize,
    label: CompactString,
}

impl<T> std::ops::Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> std::ops::DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        record_release(self.lock_addr, &self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_acquire_and_release_are_recorded() {
        lockprof_tracer::enable();
        let mutex = DiagnosticMutex::new("test-mutex", 0u64);
        {
            let mut guard = mutex.lock();
            *guard += 1;
        }
        lockprof_tracer::disable();

        let snapshot = default_tracer().get_stats();
        let events: Vec<_> = snapshot
            .lock_list
            .iter()
            .filter(|e| snapshot.lock_hashes[e.lock_hash.0 as usize] == "test-mutex")
            .collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_acquire());
        assert!(events[1].is_release());
    }

    #[test]
    fn rwlock_read_and_write_both_release_on_drop() {
        lockprof_tracer::enable();
        let lock = DiagnosticRwLock::new("test-rwlock", 0u64);
        {
            let _r = lock.read();
        }
        {
            let mut w = lock.write();
            *w += 1;
        }
        lockprof_tracer::disable();

        let snapshot = default_tracer().get_stats();
        let count = snapshot
            .lock_list
            .iter()
            .filter(|e| snapshot.lock_hashes[e.lock_hash.0 as usize] == "test-rwlock")
            .count();
        assert_eq!(count, 4);
    }
}
