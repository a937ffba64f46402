use std::collections::HashMap;

use lockprof_types::{Event, LockHash, LockSnapshot};

/// One second of wall time maps to this many pixels by default (spec §6).
pub const DEFAULT_PIXELS_PER_SECOND: f64 = 100.0;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Rendering category; also the z-order (higher paints over lower), per
/// spec §6: "acquire > held > alive".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntervalKind {
    Alive,
    Held,
    Waiting,
}

/// A single rectangle on a swimlane, already in pixel (scaled) coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInterval {
    pub lock_hash: Option<LockHash>,
    pub kind: IntervalKind,
    pub x_start: i64,
    pub x_end: i64,
}

impl RenderInterval {
    fn width(&self) -> i64 {
        self.x_end - self.x_start
    }
}

/// One swimlane per thread, ordered by that thread's first-seen timestamp.
#[derive(Debug, Clone, Default)]
pub struct Swimlane {
    pub tid: u32,
    pub intervals: Vec<RenderInterval>,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub swimlanes: Vec<Swimlane>,
    pub pixels_per_second: f64,
}

/// Builds the swimlane timeline model (spec §4.D.3) from a snapshot.
/// Timestamps are normalized so the earliest event across all threads is
/// at `t=0`, then scaled to pixels at `pixels_per_second`.
pub fn build_timeline(snapshot: &LockSnapshot, pixels_per_second: f64) -> Timeline {
    let Some(min_ts) = snapshot.lock_list.iter().map(|e| e.timestamp).min() else {
        return Timeline {
            swimlanes: Vec::new(),
            pixels_per_second,
        };
    };
    let scale = pixels_per_second / NANOS_PER_SECOND;
    let scaled = |ts: i64| -> i64 { ((ts - min_ts) as f64 * scale).round() as i64 };

    let mut per_thread_order: Vec<u32> = Vec::new();
    let mut held: HashMap<(u32, LockHash), Vec<Event>> = HashMap::new();
    let mut raw_intervals: HashMap<u32, Vec<RenderInterval>> = HashMap::new();
    let mut thread_span: HashMap<u32, (i64, i64)> = HashMap::new();

    for event in &snapshot.lock_list {
        if !per_thread_order.contains(&event.tid) {
            per_thread_order.push(event.tid);
        }
        let span = thread_span
            .entry(event.tid)
            .or_insert((event.timestamp, event.timestamp));
        span.0 = span.0.min(event.timestamp);
        span.1 = span.1.max(event.timestamp);

        if event.is_acquire() {
            held.entry((event.tid, event.lock_hash)).or_default().push(*event);
        } else if let Some(acquire) = held
            .get_mut(&(event.tid, event.lock_hash))
            .and_then(|stack| stack.pop())
        {
            let acquired_at = acquire.timestamp + acquire.duration;
            thread_span
                .entry(event.tid)
                .and_modify(|s| s.1 = s.1.max(event.timestamp));

            let intervals = raw_intervals.entry(event.tid).or_default();
            intervals.push(RenderInterval {
                lock_hash: Some(acquire.lock_hash),
                kind: IntervalKind::Waiting,
                x_start: scaled(acquire.timestamp),
                x_end: scaled(acquired_at),
            });
            intervals.push(RenderInterval {
                lock_hash: Some(acquire.lock_hash),
                kind: IntervalKind::Held,
                x_start: scaled(acquired_at),
                x_end: scaled(event.timestamp),
            });
        }
    }

    let mut swimlanes = Vec::with_capacity(per_thread_order.len());
    for tid in per_thread_order {
        let mut intervals = raw_intervals.remove(&tid).unwrap_or_default();
        if let Some((start, end)) = thread_span.get(&tid) {
            intervals.insert(
                0,
                RenderInterval {
                    lock_hash: None,
                    kind: IntervalKind::Alive,
                    x_start: scaled(*start),
                    x_end: scaled(*end),
                },
            );
        }
        intervals.sort_by_key(|i| (i.x_start, i.kind));
        swimlanes.push(Swimlane {
            tid,
            intervals: coalesce_zero_width(intervals),
        });
    }

    Timeline {
        swimlanes,
        pixels_per_second,
    }
}

/// Merges runs of zero-width intervals that share an x-coordinate into a
/// single rectangle. A flush happens as soon as the coordinate changes
/// (spec §4.D.3, scenario 6).
fn coalesce_zero_width(intervals: Vec<RenderInterval>) -> Vec<RenderInterval> {
    let mut out = Vec::with_capacity(intervals.len());
    let mut pending: Option<RenderInterval> = None;

    for interval in intervals {
        if interval.width() == 0 {
            match &pending {
                Some(p) if p.x_start == interval.x_start => {
                    // Already have a representative rectangle at this
                    // coordinate; drop this one.
                }
                _ => {
                    if let Some(p) = pending.take() {
                        out.push(p);
                    }
                    pending = Some(interval);
                }
            }
        } else {
            if let Some(p) = pending.take() {
                out.push(p);
            }
            out.push(interval);
        }
    }
    if let Some(p) = pending {
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use compact_str::CompactString;
    use lockprof_types::EMPTY_STACK_HASH;

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
    fn earliest_event_normalizes_to_zero() {
        let snap = snapshot(vec![acq(100, 50, 1, 0), rel(300, 1, 0)]);
        let timeline = build_timeline(&snap, DEFAULT_PIXELS_PER_SECOND);
        let lane = &timeline.swimlanes[0];
        assert_eq!(lane.intervals[0].x_start, 0);
    }

    #[test]
    fn produces_one_swimlane_per_thread_in_first_seen_order() {
        let snap = snapshot(vec![
            acq(0, 0, 2, 0),
            rel(10, 2, 0),
            acq(0, 0, 1, 0),
            rel(10, 1, 0),
        ]);
        let timeline = build_timeline(&snap, DEFAULT_PIXELS_PER_SECOND);
        assert_eq!(timeline.swimlanes.len(), 2);
        assert_eq!(timeline.swimlanes[0].tid, 2);
        assert_eq!(timeline.swimlanes[1].tid, 1);
    }

    #[test]
    fn scenario_6_zero_width_intervals_coalesce() {
        // At 100 px/s, 1ns maps to far less than a pixel, so several
        // adjacent sub-pixel intervals round to the same x-coordinate.
        let snap = snapshot(vec![
            acq(0, 0, 1, 0),
            rel(1, 1, 0),
            acq(1, 0, 1, 1),
            rel(2, 1, 1),
            acq(2, 0, 1, 2),
            rel(3, 1, 2),
            acq(1_000_000_000, 0, 1, 3),
            rel(1_000_000_001, 1, 3),
        ]);
        let timeline = build_timeline(&snap, DEFAULT_PIXELS_PER_SECOND);
        let lane = &timeline.swimlanes[0];
        // alive background + one coalesced rect for the first three + one
        // for the fourth, distinct coordinate.
        let held: Vec<_> = lane
            .intervals
            .iter()
            .filter(|i| i.kind == IntervalKind::Held)
            .collect();
        assert_eq!(held.len(), 2);
        assert_ne!(held[0].x_start, held[1].x_start);

        // Every acquire/release pair also produces a (possibly zero-width)
        // Waiting interval, per spec §4.D.3 — duration == 0 is a valid
        // boundary, not an excuse to drop the interval.
        let waiting: Vec<_> = lane
            .intervals
            .iter()
            .filter(|i| i.kind == IntervalKind::Waiting)
            .collect();
        assert_eq!(waiting.len(), 2);
        assert_ne!(waiting[0].x_start, waiting[1].x_start);
    }
}
