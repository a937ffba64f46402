use std::collections::HashSet;

use compact_str::CompactString;
use lockprof_types::StackFrame;

/// Decides whether a stack frame counts as "user source" for per-line
/// attribution (spec §4.D.2).
///
/// Without the denylist, every acquire would attribute to the locking
/// wrapper's own frame (the innermost frame on any captured stack) rather
/// than the call site that actually reached for the lock.
#[derive(Debug, Clone)]
pub struct FrameFilter {
    user_source_extensions: Vec<CompactString>,
    denylist: HashSet<CompactString>,
}

impl FrameFilter {
    pub fn new(
        user_source_extensions: Vec<CompactString>,
        denylist: HashSet<CompactString>,
    ) -> Self {
        Self {
            user_source_extensions,
            denylist,
        }
    }

    /// Adds a filename to the denylist. Configurable per spec §4.D.2.
    pub fn deny(&mut self, filename: impl Into<CompactString>) {
        self.denylist.insert(filename.into());
    }

    pub fn allows(&self, frame: &StackFrame) -> bool {
        if self.denylist.iter().any(|d| frame.file.ends_with(d.as_str())) {
            return false;
        }
        self.user_source_extensions
            .iter()
            .any(|ext| frame.file.ends_with(ext.as_str()))
    }
}

impl Default for FrameFilter {
    /// `.rs` files are "user source"; frames from the thread-coordination
    /// machinery and lockprof's own wrapper are denied by default.
    fn default() -> Self {
        Self::new(
            vec![CompactString::from(".rs")],
            [
                CompactString::from("thread/mod.rs"),
                CompactString::from("lockprof/src/locks/enabled.rs"),
            ]
            .into_iter()
            .collect(),
        )
    }
}
