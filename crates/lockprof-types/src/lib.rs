//! Core data model for lockprof: the record shapes the event tracer emits and
//! the aggregator consumes, plus the interners that turn repeated wide values
//! (lock identities, stack frames, stack traces) into dense integer handles.
//!
//! This crate has no notion of "how" an event gets recorded — it only defines
//! what a recorded event looks like and how handles are assigned. The hot
//! path lives in `lockprof-tracer`; the offline reducer lives in
//! `lockprof-aggregate`.

mod interners;
mod model;

pub use interners::{FrameInterner, InternerSnapshot, LockInterner, TraceInterner};
pub use model::{
    Event, LockHash, LockStats, LockSnapshot, SnapshotDiagnostics, StackFrame, StackHash,
};

/// Sentinel duration carried by release events (see [`Event::duration`]).
pub const RELEASE_SENTINEL: i64 = -1;

/// Handle for the empty stack trace, used when stack capture fails or is
/// unavailable for a given event.
pub const EMPTY_STACK_HASH: StackHash = StackHash(0);
