//! Anomaly report output.
//!
//! The report is only written when at least one anomaly survived
//! aggregation; a clean batch leaves no artifact behind. Any report from a
//! previous run is removed before scanning starts so a clean batch cannot be
//! mistaken for a stale one.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use audit_core::formatting::format_value;
use audit_core::models::AnomalyCandidate;
use audit_core::{AuditError, Result};
use tracing::{debug, info};

/// Header of `anomaly_report.csv`.
pub const REPORT_COLUMNS: [&str; 5] = [
    "SubscriberId",
    "SessionId",
    "UploadBytes",
    "DownloadBytes",
    "Ratio",
];

/// Remove the report left by a previous run, if any.
pub fn discard_previous(path: &Path) -> Result<()> {
    if path.exists() {
        debug!("Removing previous report {}", path.display());
        std::fs::remove_file(path).map_err(|source| AuditError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Write the sorted anomaly rows to `path`, replacing any existing file.
pub fn write_report(path: &Path, rows: &[AnomalyCandidate]) -> Result<()> {
    let mut file = File::create(path).map_err(|source| AuditError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;

    let io = |source| AuditError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    writeln!(file, "{}", REPORT_COLUMNS.join(",")).map_err(io)?;
    for candidate in rows {
        writeln!(
            file,
            "{},{},{},{},{}",
            candidate.record.subscriber_id,
            candidate.record.session_id,
            format_value(candidate.record.up_bytes),
            format_value(candidate.record.down_bytes),
            format_value(candidate.ratio),
        )
        .map_err(io)?;
    }

    info!("Wrote {} anomalies to {}", rows.len(), path.display());
    Ok(())
}
