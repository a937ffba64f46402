//! Diagnostic wrappers for `parking_lot::Mutex`/`RwLock`.
//!
//! When the `diagnostics` feature is enabled, every acquire and release
//! goes through the default [`crate::default_tracer`]. When disabled,
//! these compile down to plain `parking_lot` wrappers with no overhead.

#[cfg(not(feature = "diagnostics"))]
mod disabled;
#[cfg(feature = "diagnostics")]
mod enabled;

#[cfg(not(feature = "diagnostics"))]
pub use disabled::*;
#[cfg(feature = "diagnostics")]
pub use enabled::*;
