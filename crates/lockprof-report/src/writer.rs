use std::path::Path;

use lockprof_aggregate::ReducedStats;

use crate::document::build_document;
use crate::error::DumpError;

/// Reduces and serializes `reduced` as a `.pclprof` document at `path`.
pub fn write_report(path: impl AsRef<Path>, reduced: &ReducedStats) -> Result<(), DumpError> {
    let document = build_document(reduced);
    let json = facet_json::to_string(&document)
        .map_err(|err| DumpError::Serialize(err.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}
