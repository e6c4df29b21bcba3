//! Parser for whitespace-delimited stat tables.
//!
//! The report commands print one header line followed by one row per
//! resource:
//!
//! ```text
//! NAME   MESHED   SUCCESS   RPS      LATENCY_P50   LATENCY_P95   LATENCY_P99   TCP_CONN
//! web    1/1      100.00%   2.0rps   1ms           2ms           3ms           4
//! ```
//!
//! Some views add a leading STATUS column after NAME. Which layout applies
//! is decided up front from the caller's expected column count.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HarnessError, HarnessResult};

/// Column count of the layout without a status column.
pub const BASELINE_COLUMNS: usize = 8;

/// One parsed row of stat output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowStat {
    pub name: String,
    /// Only populated for the layout with a status column.
    pub status: Option<String>,
    pub meshed: String,
    pub success: String,
    pub rps: String,
    pub p50_latency: String,
    pub p95_latency: String,
    pub p99_latency: String,
    pub tcp_open_connections: String,
}

/// Field positions within a split row. The name is always field 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldOffsets {
    status: Option<usize>,
    meshed: usize,
    success: usize,
    rps: usize,
    p50: usize,
    p95: usize,
    p99: usize,
    tcp: usize,
}

const BASELINE_OFFSETS: FieldOffsets = FieldOffsets {
    status: None,
    meshed: 1,
    success: 2,
    rps: 3,
    p50: 4,
    p95: 5,
    p99: 6,
    tcp: 7,
};

const WITH_STATUS_OFFSETS: FieldOffsets = FieldOffsets {
    status: Some(1),
    meshed: 2,
    success: 3,
    rps: 4,
    p50: 5,
    p95: 6,
    p99: 7,
    tcp: 8,
};

/// Column arrangement of a stat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    /// NAME MESHED SUCCESS RPS P50 P95 P99 TCP
    Baseline,
    /// NAME STATUS MESHED SUCCESS RPS P50 P95 P99 TCP
    WithStatus,
}

impl ColumnLayout {
    /// Pick the layout for an expected column count (0 means the baseline count).
    ///
    /// Exactly one column more than the baseline selects the status layout;
    /// any other count at or above the baseline reads the baseline fields
    /// and ignores the rest.
    pub fn for_columns(columns: usize) -> HarnessResult<Self> {
        match columns {
            c if c == BASELINE_COLUMNS + 1 => Ok(Self::WithStatus),
            c if c >= BASELINE_COLUMNS => Ok(Self::Baseline),
            c => Err(HarnessError::UnsupportedLayout {
                columns: c,
                minimum: BASELINE_COLUMNS,
            }),
        }
    }

    fn offsets(self) -> &'static FieldOffsets {
        match self {
            Self::Baseline => &BASELINE_OFFSETS,
            Self::WithStatus => &WITH_STATUS_OFFSETS,
        }
    }

    fn row(self, fields: &[&str]) -> RowStat {
        let at = self.offsets();
        RowStat {
            name: fields[0].to_string(),
            status: at.status.map(|i| fields[i].to_string()),
            meshed: fields[at.meshed].to_string(),
            success: fields[at.success].to_string(),
            rps: fields[at.rps].to_string(),
            p50_latency: fields[at.p50].to_string(),
            p95_latency: fields[at.p95].to_string(),
            p99_latency: fields[at.p99].to_string(),
            tcp_open_connections: fields[at.tcp].to_string(),
        }
    }
}

/// Strip the header and check that exactly `expected_rows` data lines remain.
pub fn check_row_count(out: &str, expected_rows: usize) -> HarnessResult<Vec<&str>> {
    let out = out.strip_suffix('\n').unwrap_or(out);
    let lines: Vec<&str> = out.split('\n').collect();
    if lines.len() < 2 {
        return Err(HarnessError::MissingHeader {
            output: lines.join("\n"),
        });
    }

    let rows = lines[1..].to_vec();
    if rows.len() != expected_rows {
        return Err(HarnessError::RowCount {
            expected: expected_rows,
            actual: rows.len(),
            output: rows.join("\n"),
        });
    }
    Ok(rows)
}

/// Parse stat output into rows keyed by resource name.
///
/// `expected_columns == 0` means [`BASELINE_COLUMNS`]. Any row or column
/// count mismatch fails the whole parse. A repeated name replaces the
/// earlier row.
pub fn parse_rows(
    out: &str,
    expected_rows: usize,
    expected_columns: usize,
) -> HarnessResult<HashMap<String, RowStat>> {
    let expected_columns = if expected_columns == 0 {
        BASELINE_COLUMNS
    } else {
        expected_columns
    };
    let layout = ColumnLayout::for_columns(expected_columns)?;
    let rows = check_row_count(out, expected_rows)?;

    let mut stats = HashMap::with_capacity(rows.len());
    for row in rows {
        let fields: Vec<&str> = row.split_whitespace().collect();
        if fields.len() != expected_columns {
            return Err(HarnessError::ColumnCount {
                expected: expected_columns,
                actual: fields.len(),
                row: row.to_string(),
            });
        }

        let stat = layout.row(&fields);
        if let Some(previous) = stats.insert(stat.name.clone(), stat) {
            warn!(name = %previous.name, "duplicate resource name in stat output; keeping the later row");
        }
    }
    Ok(stats)
}
