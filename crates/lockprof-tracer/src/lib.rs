//! The event tracer (spec §4.C): a low-overhead, thread-safe capture path.
//!
//! When the `diagnostics` feature is **disabled** (the default), every
//! function in this crate compiles down to a zero-cost pass-through — no
//! interning, no buffering, no enable-count bookkeeping. When **enabled**,
//! every `acquire_hook`/`release_hook` call gated by a positive per-thread
//! enable count is recorded with minimal contention: no locks on the hot
//! path except the interners' read-mostly locks and the calling thread's
//! own, uncontended event buffer.

#[cfg(not(feature = "diagnostics"))]
mod disabled;
#[cfg(feature = "diagnostics")]
mod enabled;

#[cfg(not(feature = "diagnostics"))]
pub use disabled::*;
#[cfg(feature = "diagnostics")]
pub use enabled::*;

pub use lockprof_types::{Event, LockHash, LockSnapshot, LockStats, StackFrame, StackHash};
