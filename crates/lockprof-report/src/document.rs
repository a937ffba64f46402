use std::collections::BTreeMap;

use compact_str::CompactString;
use facet::Facet;
use lockprof_aggregate::ReducedStats;

/// The `.pclprof` on-disk format (spec §6). A flat JSON document: one entry
/// per source file, each carrying the lines within it that touched a
/// registered lock.
///
/// Function boundaries aren't tracked anywhere upstream of this crate, so
/// every file gets a single synthetic `"Dummy"` function starting at line 1
/// — the format allows this explicitly ("functionName: <string or
/// 'Dummy'>").
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct PclProfDocument {
    #[facet(rename = "profiledFunctions")]
    pub profiled_functions: Vec<ProfiledFunction>,
    pub unit: f64,
}

#[derive(Facet, Debug, Clone, PartialEq)]
pub struct ProfiledFunction {
    pub file: CompactString,
    #[facet(rename = "lineNo")]
    pub line_no: u32,
    #[facet(rename = "functionName")]
    pub function_name: CompactString,
    #[facet(rename = "profiledLines")]
    pub profiled_lines: Vec<ProfiledLine>,
}

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfiledLine {
    #[facet(rename = "lineNo")]
    pub line_no: u32,
    pub hits: u64,
    pub time: i64,
}

/// Nanoseconds-to-seconds conversion factor carried in every document, per
/// spec §6.
pub const UNIT: f64 = 1e-9;

/// Builds a [`PclProfDocument`] from reduced per-(file, line, lock) stats.
/// `hits` and `time` at a given line are summed across every lock touched
/// there, per spec §6.
pub fn build_document(reduced: &ReducedStats) -> PclProfDocument {
    let mut by_file: BTreeMap<CompactString, BTreeMap<u32, (u64, i64)>> = BTreeMap::new();

    for (key, stats) in &reduced.line_stats {
        let lines = by_file.entry(key.file.clone()).or_default();
        let entry = lines.entry(key.line_no).or_insert((0, 0));
        entry.0 += stats.hits;
        entry.1 += stats.total_acquire_time;
    }

    let profiled_functions = by_file
        .into_iter()
        .map(|(file, lines)| {
            let profiled_lines = lines
                .into_iter()
                .map(|(line_no, (hits, time))| ProfiledLine {
                    line_no,
                    hits,
                    time,
                })
                .collect();
            ProfiledFunction {
                file,
                line_no: 1,
                function_name: CompactString::from("Dummy"),
                profiled_lines,
            }
        })
        .collect();

    PclProfDocument {
        profiled_functions,
        unit: UNIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockprof_types::LockHash;

    #[test]
    fn aggregates_hits_and_time_across_locks_at_the_same_line() {
        use lockprof_aggregate::LineKey;
        use lockprof_types::LockStats;

        let reduced = ReducedStats {
            lock_stats: Vec::new(),
            line_stats: vec![
                (
                    LineKey {
                        file: CompactString::from("user.rs"),
                        line_no: 40,
                        lock_hash: LockHash(0),
                    },
                    LockStats {
                        hits: 2,
                        acquires: 2,
                        total_acquire_time: 100,
                        ..Default::default()
                    },
                ),
                (
                    LineKey {
                        file: CompactString::from("user.rs"),
                        line_no: 40,
                        lock_hash: LockHash(1),
                    },
                    LockStats {
                        hits: 1,
                        acquires: 1,
                        total_acquire_time: 50,
                        ..Default::default()
                    },
                ),
            ],
            diagnostics: Default::default(),
        };

        let doc = build_document(&reduced);
        assert_eq!(doc.profiled_functions.len(), 1);
        let func = &doc.profiled_functions[0];
        assert_eq!(func.file, "user.rs");
        assert_eq!(func.profiled_lines.len(), 1);
        assert_eq!(func.profiled_lines[0].hits, 3);
        assert_eq!(func.profiled_lines[0].time, 150);
    }
}
