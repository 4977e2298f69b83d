//! JSON-lines access traces and replay.
//!
//! Each non-empty line is one record:
//!
//! ```text
//! {"addr": 4096, "requestor_id": 8}
//! {"addr": 4160, "tag": "T1"}
//! {"addr": 4096, "op": "invalidate"}
//! ```
//!
//! Lines starting with `#` are comments.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::partition::classifier::RequestAttributes;
use crate::partition::PartitionId;
use crate::sim::cache::{AccessOutcome, CacheError, PartitionStats, SetAssocCache};

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed trace record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOp {
    #[default]
    Access,
    Invalidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub addr: u64,

    #[serde(default)]
    pub op: TraceOp,

    #[serde(flatten)]
    pub attrs: RequestAttributes,
}

/// Parse records from any buffered reader.
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| TraceError::Parse {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read a trace file.
pub fn read_trace(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let file = std::fs::File::open(path)?;
    parse_trace(std::io::BufReader::new(file))
}

/// Summary of a replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    pub invalidations: u64,
    pub valid_lines: usize,
    pub partitions: BTreeMap<PartitionId, PartitionStats>,
}

/// Feed every record through `cache`.
///
/// Stops at the first accounting error; anything else degrades into the
/// counters.
pub fn replay(cache: &mut SetAssocCache, records: &[TraceRecord]) -> Result<RunReport, CacheError> {
    let mut report = RunReport::default();

    for record in records {
        match record.op {
            TraceOp::Access => {
                report.accesses += 1;
                match cache.access(record.addr, &record.attrs)? {
                    AccessOutcome::Hit => report.hits += 1,
                    AccessOutcome::Fill { .. } => report.misses += 1,
                    AccessOutcome::Bypass => {
                        report.misses += 1;
                        report.bypasses += 1;
                    }
                }
            }
            TraceOp::Invalidate => {
                if cache.invalidate(record.addr)? {
                    report.invalidations += 1;
                }
            }
        }
    }

    report.valid_lines = cache.valid_lines();
    report.partitions = cache.stats().clone();

    info!(
        accesses = report.accesses,
        hits = report.hits,
        misses = report.misses,
        bypasses = report.bypasses,
        "Replay complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_and_comments() {
        let input = r#"
# warm-up
{"addr": 64, "requestor_id": 8}
{"addr": 128, "tag": "T1"}

{"addr": 64, "op": "invalidate"}
"#;
        let records = parse_trace(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].attrs.requestor_id, Some(8));
        assert_eq!(records[0].op, TraceOp::Access);
        assert_eq!(records[1].attrs.tag.as_deref(), Some("T1"));
        assert_eq!(records[2].op, TraceOp::Invalidate);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"addr\": 64}\nnot json\n";
        match parse_trace(input.as_bytes()) {
            Err(TraceError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
