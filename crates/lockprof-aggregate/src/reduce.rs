use std::collections::HashMap;

use compact_str::CompactString;
use lockprof_types::{Event, LockHash, LockSnapshot, LockStats};

use crate::frame_filter::FrameFilter;
use crate::types::{AggregateDiagnostics, LineKey, ResidualDepth};

/// Result of reducing a [`LockSnapshot`] into per-lock and per-line
/// statistics (spec §4.D.1 and §4.D.2).
#[derive(Debug, Clone, Default)]
pub struct ReducedStats {
    /// Ordered by `total_acquire_time` descending, then `lock_hash`
    /// ascending (spec §4.D.1's tie-break rule).
    pub lock_stats: Vec<(LockHash, LockStats)>,
    /// Same tie-break applied per `(file, line_no, lock_hash)`.
    pub line_stats: Vec<(LineKey, LockStats)>,
    pub diagnostics: AggregateDiagnostics,
}

/// Depth is represented implicitly as the scratch stack's length — on
/// acquire, "was this outermost" is `stack.is_empty()` *before* the push;
/// on release, "did this return to zero" is `stack.is_empty()` *after* the
/// pop. This sidesteps keeping a parallel counter in sync with the stack.
///
/// Keyed by `(tid, lock_hash)` rather than `lock_hash` alone: a real mutex
/// never has two threads inside the held region at once, so this only
/// differs from a global-per-lock counter when depth would otherwise be
/// perturbed by cross-thread event interleaving order, which the snapshot
/// does not guarantee (spec §4.D only guarantees per-thread order).
type HeldStack = Vec<Event>;

/// Depth scratch for per-(file, line, lock) buckets, keyed on the acquire's
/// `tid` as well so that concurrent threads touching the same line don't
/// smear each other's depth accounting (same reasoning as [`HeldStack`]).
type LineDepthKey = (u32, CompactString, u32, LockHash);

/// Reduces a snapshot into per-lock and per-line statistics. Pure function
/// of its inputs: no global state, so it's safe to call from both the
/// report writer and tests.
pub fn reduce(snapshot: &LockSnapshot, filter: &FrameFilter) -> ReducedStats {
    let mut lock_buckets: HashMap<LockHash, LockStats> = HashMap::new();
    let mut lock_order: Vec<LockHash> = Vec::new();
    let mut held: HashMap<(u32, LockHash), HeldStack> = HashMap::new();

    let mut line_buckets: HashMap<LineKey, LockStats> = HashMap::new();
    let mut line_order: Vec<LineKey> = Vec::new();
    let mut line_depth: HashMap<LineDepthKey, u32> = HashMap::new();

    let mut unbalanced_releases = 0u64;

    for event in &snapshot.lock_list {
        if event.is_acquire() {
            let held_stack = held.entry((event.tid, event.lock_hash)).or_default();
            let outermost = held_stack.is_empty();
            held_stack.push(*event);

            let bucket = lock_buckets.entry(event.lock_hash).or_insert_with(|| {
                lock_order.push(event.lock_hash);
                LockStats::default()
            });
            apply_acquire(bucket, event, outermost);

            for (file, line_no) in filtered_lines(snapshot, event, filter) {
                let key = (event.tid, file.clone(), line_no, event.lock_hash);
                let depth = line_depth.entry(key).or_insert(0);
                let line_outermost = *depth == 0;
                *depth += 1;

                let line_key = LineKey {
                    file,
                    line_no,
                    lock_hash: event.lock_hash,
                };
                let bucket = line_buckets.entry(line_key.clone()).or_insert_with(|| {
                    line_order.push(line_key);
                    LockStats::default()
                });
                apply_acquire(bucket, event, line_outermost);
            }
        } else {
            let Some(held_stack) = held.get_mut(&(event.tid, event.lock_hash)) else {
                unbalanced_releases += 1;
                tracing::warn!(
                    tid = event.tid,
                    lock_hash = event.lock_hash.0,
                    "release with no matching held lock"
                );
                continue;
            };
            let Some(acquire) = held_stack.pop() else {
                unbalanced_releases += 1;
                tracing::warn!(
                    tid = event.tid,
                    lock_hash = event.lock_hash.0,
                    "release with an empty held stack"
                );
                continue;
            };
            let returned_to_zero = held_stack.is_empty();
            let hold = event.timestamp - (acquire.timestamp + acquire.duration);

            if returned_to_zero {
                let bucket = lock_buckets
                    .get_mut(&event.lock_hash)
                    .expect("bucket created on the matching acquire");
                apply_release(bucket, hold);
            }

            for (file, line_no) in filtered_lines(snapshot, &acquire, filter) {
                let key = (event.tid, file.clone(), line_no, event.lock_hash);
                if let Some(depth) = line_depth.get_mut(&key) {
                    if *depth > 0 {
                        *depth -= 1;
                        if *depth == 0 {
                            let line_key = LineKey {
                                file,
                                line_no,
                                lock_hash: event.lock_hash,
                            };
                            if let Some(bucket) = line_buckets.get_mut(&line_key) {
                                apply_release(bucket, hold);
                            }
                        }
                    }
                }
            }
        }
    }

    let mut residual_depths = Vec::new();
    for ((tid, lock_hash), stack) in &held {
        if !stack.is_empty() {
            residual_depths.push(ResidualDepth {
                tid: *tid,
                lock_hash: *lock_hash,
                depth: stack.len() as u32,
            });
        }
    }
    residual_depths.sort_by_key(|r| (r.tid, r.lock_hash));

    let mut lock_stats: Vec<(LockHash, LockStats)> = lock_order
        .into_iter()
        .map(|hash| {
            let mut stats = lock_buckets.remove(&hash).unwrap();
            stats.finalize_averages();
            (hash, stats)
        })
        .collect();
    sort_stats(&mut lock_stats, |(hash, _)| hash.0);

    let mut line_stats: Vec<(LineKey, LockStats)> = line_order
        .into_iter()
        .map(|key| {
            let mut stats = line_buckets.remove(&key).unwrap();
            stats.finalize_averages();
            (key, stats)
        })
        .collect();
    sort_stats(&mut line_stats, |(key, _)| key.lock_hash.0);

    ReducedStats {
        lock_stats,
        line_stats,
        diagnostics: AggregateDiagnostics {
            unbalanced_releases,
            residual_depths,
            interner_exhausted: snapshot.diagnostics.interner_exhausted,
        },
    }
}

fn apply_acquire(stats: &mut LockStats, event: &Event, outermost: bool) {
    stats.hits += 1;
    if outermost {
        stats.acquires += 1;
    }
    stats.total_acquire_time += event.duration;
    stats.max_acquire_time = stats.max_acquire_time.max(event.duration);
}

fn apply_release(stats: &mut LockStats, hold: i64) {
    stats.total_hold_time += hold;
    stats.max_hold_time = stats.max_hold_time.max(hold);
}

/// Resolves `event`'s stack trace, applies the frame filter, and returns
/// the distinct `(file, line_no)` pairs it contains — deduplicated so a
/// recursive stack frame doesn't double-count a single acquire event.
fn filtered_lines(
    snapshot: &LockSnapshot,
    event: &Event,
    filter: &FrameFilter,
) -> Vec<(CompactString, u32)> {
    let Some(frames) = snapshot.stack_hashes.get(event.stack_hash.0 as usize) else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    for frame in frames {
        if !filter.allows(frame) {
            continue;
        }
        let entry = (frame.file.clone(), frame.line_no);
        if !seen.contains(&entry) {
            seen.push(entry);
        }
    }
    seen
}

/// Sorts by `total_acquire_time` descending with the given ascending
/// tie-break key (spec §4.D.1).
fn sort_stats<T>(items: &mut [(T, LockStats)], tie_break: impl Fn(&(T, LockStats)) -> u32) {
    items.sort_by(|a, b| {
        b.1.total_acquire_time
            .cmp(&a.1.total_acquire_time)
            .then_with(|| tie_break(a).cmp(&tie_break(b)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockprof_types::{StackFrame, EMPTY_STACK_HASH};

    fn acq(ts: i64, dur: i64, tid: u32, lock: u32) -> Event {
        Event {
            timestamp: ts,
            duration: dur,
            tid,
            lock_hash: LockHash(lock),
            stack_hash: EMPTY_STACK_HASH,
        }
    }

    fn rel(ts: i64, tid: u32, lock: u32) -> Event {
        Event {
            timestamp: ts,
            duration: -1,
            tid,
            lock_hash: LockHash(lock),
            stack_hash: EMPTY_STACK_HASH,
        }
    }

    fn snapshot(events: Vec<Event>) -> LockSnapshot {
        LockSnapshot {
            lock_list: events,
            lock_hashes: vec![CompactString::from("A")],
            stack_hashes: vec![Vec::new()],
            diagnostics: Default::default(),
        }
    }

    #[test]
    fn scenario_1_single_outermost_acquire() {
        let snap = snapshot(vec![acq(100, 50, 1, 0), rel(300, 1, 0)]);
        let reduced = reduce(&snap, &FrameFilter::default());
        let (_, stats) = &reduced.lock_stats[0];
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.acquires, 1);
        assert_eq!(stats.total_acquire_time, 50);
        assert_eq!(stats.max_acquire_time, 50);
        assert_eq!(stats.avg_acquire_time, 50);
        assert_eq!(stats.total_hold_time, 150);
        assert_eq!(stats.max_hold_time, 150);
        assert_eq!(stats.avg_hold_time, 150);
    }

    #[test]
    fn scenario_2_reentrant_acquire() {
        let snap = snapshot(vec![
            acq(100, 10, 1, 0),
            acq(120, 5, 1, 0),
            rel(200, 1, 0),
            rel(250, 1, 0),
        ]);
        let reduced = reduce(&snap, &FrameFilter::default());
        let (_, stats) = &reduced.lock_stats[0];
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.acquires, 1);
        assert_eq!(stats.total_acquire_time, 15);
        assert_eq!(stats.max_acquire_time, 10);
        assert_eq!(stats.avg_acquire_time, 15);
        assert_eq!(stats.total_hold_time, 140);
        assert_eq!(stats.max_hold_time, 140);
        assert_eq!(stats.avg_hold_time, 140);
    }

    #[test]
    fn scenario_3_two_threads_contending() {
        let snap = snapshot(vec![
            acq(0, 0, 1, 0),
            rel(1000, 1, 0),
            acq(0, 1000, 2, 0),
            rel(2000, 2, 0),
        ]);
        let reduced = reduce(&snap, &FrameFilter::default());
        let (_, stats) = &reduced.lock_stats[0];
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.acquires, 2);
        assert_eq!(stats.total_acquire_time, 1000);
        assert_eq!(stats.max_acquire_time, 1000);
        assert_eq!(stats.total_hold_time, 2000);
        assert_eq!(stats.max_hold_time, 1000);
        assert_eq!(stats.avg_hold_time, 1000);
    }

    #[test]
    fn scenario_4_unbalanced_tail() {
        let snap = snapshot(vec![acq(10, 5, 1, 0)]);
        let reduced = reduce(&snap, &FrameFilter::default());
        let (_, stats) = &reduced.lock_stats[0];
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.acquires, 1);
        assert_eq!(stats.total_acquire_time, 5);
        assert_eq!(stats.total_hold_time, 0);
        assert_eq!(reduced.diagnostics.residual_depths.len(), 1);
        assert_eq!(reduced.diagnostics.residual_depths[0].tid, 1);
        assert_eq!(reduced.diagnostics.residual_depths[0].depth, 1);
    }

    #[test]
    fn unbalanced_release_is_counted_and_discarded() {
        let snap = snapshot(vec![rel(10, 1, 0)]);
        let reduced = reduce(&snap, &FrameFilter::default());
        assert_eq!(reduced.diagnostics.unbalanced_releases, 1);
        assert!(reduced.lock_stats.is_empty());
    }

    #[test]
    fn scenario_5_stack_filter_attributes_only_the_user_frame() {
        let frames = vec![
            StackFrame::new("Lockable.rs", 12, "acquire"),
            StackFrame::new("user.rs", 40, "foo"),
            StackFrame::new("thread/mod.rs", 99, "run"),
        ];
        let mut snap = snapshot(vec![]);
        snap.stack_hashes = vec![Vec::new(), frames];
        snap.lock_list = vec![
            Event {
                timestamp: 0,
                duration: 10,
                tid: 1,
                lock_hash: LockHash(0),
                stack_hash: lockprof_types::StackHash(1),
            },
            rel(50, 1, 0),
        ];
        let mut filter = FrameFilter::default();
        filter.deny("Lockable.rs");
        let reduced = reduce(&snap, &filter);
        assert_eq!(reduced.line_stats.len(), 1);
        let (key, stats) = &reduced.line_stats[0];
        assert_eq!(key.file, "user.rs");
        assert_eq!(key.line_no, 40);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.acquires, 1);
    }

    #[test]
    fn independent_lifo_stacks_per_thread_and_lock() {
        let snap = snapshot(vec![
            acq(0, 1, 1, 0),
            acq(0, 1, 1, 1),
            rel(10, 1, 1),
            rel(10, 1, 0),
        ]);
        let reduced = reduce(&snap, &FrameFilter::default());
        assert_eq!(reduced.diagnostics.unbalanced_releases, 0);
        assert_eq!(reduced.lock_stats.len(), 2);
    }
}
