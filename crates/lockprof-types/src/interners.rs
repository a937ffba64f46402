//! Lock, stack-frame, and stack-trace interners.
//!
//! All three follow the same shape: a read-mostly map guarded by a
//! `parking_lot::RwLock`, checked with a read lock on the common (already
//! interned) path and upgraded to a write lock only to insert a new entry.
//! `intern` never blocks indefinitely — contention degrades throughput, not
//! correctness (spec §4.B).

use std::collections::HashMap;

use compact_str::CompactString;
use parking_lot::RwLock;

use crate::model::{FrameId, LockHash, StackFrame, StackHash};

/// Default ceiling on the number of distinct entries an interner will hold
/// before it reports exhaustion (spec §7, error #3: fatal, tracer disables
/// itself).
pub const DEFAULT_INTERNER_CAPACITY: usize = 1_000_000;

struct InternerState<K, V> {
    by_key: HashMap<K, u32>,
    values: Vec<V>,
    capacity: usize,
}

impl<K, V> InternerState<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            by_key: HashMap::new(),
            values: Vec::new(),
            capacity,
        }
    }
}

/// Interns lock identities, keyed on the lock's stable object identity (its
/// machine address, as a `usize`). Retains a human-readable label for each
/// handle.
pub struct LockInterner {
    state: RwLock<InternerState<usize, CompactString>>,
}

impl LockInterner {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTERNER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(InternerState::new(capacity)),
        }
    }

    /// Interns `address` (the lock's stable identity), idempotently. Returns
    /// `None` only if the interner is at capacity and `address` is new.
    pub fn intern(&self, address: usize, label: impl FnOnce() -> CompactString) -> Option<LockHash> {
        if let Some(&handle) = self.state.read().by_key.get(&address) {
            return Some(LockHash(handle));
        }
        let mut state = self.state.write();
        if let Some(&handle) = state.by_key.get(&address) {
            return Some(LockHash(handle));
        }
        if state.values.len() >= state.capacity {
            return None;
        }
        let handle = state.values.len() as u32;
        state.values.push(label());
        state.by_key.insert(address, handle);
        Some(LockHash(handle))
    }

    pub fn label(&self, handle: LockHash) -> Option<CompactString> {
        self.state.read().values.get(handle.0 as usize).cloned()
    }

    /// Snapshot of `lock_hash -> label`, indexed by handle.
    pub fn snapshot(&self) -> Vec<CompactString> {
        self.state.read().values.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LockInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Interns stack frames, keyed on `(file, line_no, function_name)` equality.
pub struct FrameInterner {
    state: RwLock<InternerState<StackFrame, StackFrame>>,
}

impl FrameInterner {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTERNER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(InternerState::new(capacity)),
        }
    }

    pub fn intern(&self, frame: StackFrame) -> Option<FrameId> {
        if let Some(&handle) = self.state.read().by_key.get(&frame) {
            return Some(FrameId(handle));
        }
        let mut state = self.state.write();
        if let Some(&handle) = state.by_key.get(&frame) {
            return Some(FrameId(handle));
        }
        if state.values.len() >= state.capacity {
            return None;
        }
        let handle = state.values.len() as u32;
        state.values.push(frame.clone());
        state.by_key.insert(frame, handle);
        Some(FrameId(handle))
    }

    pub fn frame(&self, id: FrameId) -> Option<StackFrame> {
        self.state.read().values.get(id.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Interns stack traces, keyed on the ordered tuple of frame handles.
/// Handle 0 is always the empty trace.
pub struct TraceInterner {
    state: RwLock<InternerState<Vec<FrameId>, Vec<FrameId>>>,
}

impl TraceInterner {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTERNER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let interner = Self {
            state: RwLock::new(InternerState::new(capacity)),
        };
        let empty = interner.intern(Vec::new());
        debug_assert_eq!(empty, Some(StackHash(0)));
        interner
    }

    pub fn intern(&self, frames: Vec<FrameId>) -> Option<StackHash> {
        if let Some(&handle) = self.state.read().by_key.get(&frames) {
            return Some(StackHash(handle));
        }
        let mut state = self.state.write();
        if let Some(&handle) = state.by_key.get(&frames) {
            return Some(StackHash(handle));
        }
        if state.values.len() >= state.capacity {
            return None;
        }
        let handle = state.values.len() as u32;
        state.values.push(frames.clone());
        state.by_key.insert(frames, handle);
        Some(StackHash(handle))
    }

    pub fn frame_ids(&self, id: StackHash) -> Option<Vec<FrameId>> {
        self.state.read().values.get(id.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().values.len()
    }
}

impl Default for TraceInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// A read-only, fully resolved view of the lock and stack-trace interners,
/// suitable for embedding in a [`crate::LockSnapshot`].
pub struct InternerSnapshot;

impl InternerSnapshot {
    /// Resolves every interned trace (by walking its frame handles through
    /// `frames`) into a `Vec<StackFrame>`, indexed by `stack_hash`.
    pub fn resolve_traces(traces: &TraceInterner, frames: &FrameInterner) -> Vec<Vec<StackFrame>> {
        let count = traces.len();
        let mut resolved = Vec::with_capacity(count);
        for idx in 0..count {
            let handle = StackHash(idx as u32);
            let frame_ids = traces.frame_ids(handle).unwrap_or_default();
            let resolved_frames = frame_ids
                .into_iter()
                .filter_map(|fid| frames.frame(fid))
                .collect();
            resolved.push(resolved_frames);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_interner_is_idempotent() {
        let interner = LockInterner::new();
        let a = interner
            .intern(0x1000, || CompactString::from("lock-a"))
            .unwrap();
        let b = interner
            .intern(0x1000, || CompactString::from("lock-a-again"))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(interner.label(a).unwrap(), "lock-a");
    }

    #[test]
    fn lock_interner_assigns_dense_handles_in_first_seen_order() {
        let interner = LockInterner::new();
        let a = interner.intern(1, || CompactString::from("a")).unwrap();
        let b = interner.intern(2, || CompactString::from("b")).unwrap();
        assert_eq!(a, LockHash(0));
        assert_eq!(b, LockHash(1));
    }

    #[test]
    fn frame_interner_round_trips() {
        let interner = FrameInterner::new();
        let frame = StackFrame::new("user.rs", 40, "foo");
        let id = interner.intern(frame.clone()).unwrap();
        assert_eq!(interner.frame(id).unwrap(), frame);
    }

    #[test]
    fn trace_interner_reserves_handle_zero_for_empty_trace() {
        let interner = TraceInterner::with_capacity(16);
        assert_eq!(interner.frame_ids(StackHash(0)), Some(Vec::new()));
    }

    #[test]
    fn trace_interner_keys_on_ordered_frame_tuple() {
        let interner = TraceInterner::with_capacity(16);
        let t1 = interner.intern(vec![FrameId(1), FrameId(2)]).unwrap();
        let t2 = interner.intern(vec![FrameId(2), FrameId(1)]).unwrap();
        let t3 = interner.intern(vec![FrameId(1), FrameId(2)]).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(t1, t3);
    }

    #[test]
    fn interner_reports_exhaustion_at_capacity() {
        let interner = LockInterner::with_capacity(1);
        assert!(interner.intern(1, || CompactString::from("a")).is_some());
        assert!(interner.intern(2, || CompactString::from("b")).is_none());
    }
}
