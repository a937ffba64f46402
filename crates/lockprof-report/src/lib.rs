//! The `.pclprof` report writer and the process-exit dump hook (spec §6,
//! §9's "global mutable state" design note).
//!
//! This crate knows nothing about how a snapshot is produced — it only
//! knows how to turn a [`lockprof_aggregate::ReducedStats`] into the
//! on-disk JSON shape and how to wire that into a one-shot `atexit`
//! callback. The facade crate supplies the actual `Tracer` via
//! [`set_dump_source`] and triggers [`install_atexit_hook`] at load time.

mod document;
mod error;
mod hook;
mod writer;

pub use document::{build_document, PclProfDocument, ProfiledFunction, ProfiledLine, UNIT};
pub use error::DumpError;
pub use hook::{
    default_output_path, install_atexit_hook, run_dump_hook, set_dump_source, STATS_FILENAME_ENV,
};
pub use writer::write_report;
