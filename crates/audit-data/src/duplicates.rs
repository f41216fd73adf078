//! Duplicate-session auditing.
//!
//! Flags subscribers that hold more than one session within a single
//! combined window file. The raw feeds carry no stable header for this pass,
//! so columns are addressed positionally: field 0 is the session id, field 2
//! the subscriber id, and rows shorter than four fields are skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use audit_core::{AuditError, Result};
use tracing::{info, warn};

use crate::reader::find_session_files;
use crate::table::split_fields;

const SESSION_FIELD: usize = 0;
const SUBSCRIBER_FIELD: usize = 2;
const MIN_FIELDS: usize = 4;

/// Subscribers with more than one distinct session in `path`, with their
/// session ids sorted.
pub fn find_duplicate_sessions(path: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    let file = File::open(path).map_err(|source| AuditError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut sessions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut saw_header = false;

    for line in reader.lines() {
        let line = line.map_err(|source| AuditError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        if !saw_header {
            saw_header = true;
            continue;
        }

        let fields = split_fields(&line, ',');
        if fields.len() < MIN_FIELDS {
            continue;
        }

        sessions
            .entry(fields[SUBSCRIBER_FIELD].trim().to_string())
            .or_default()
            .insert(fields[SESSION_FIELD].trim().to_string());
    }

    Ok(sessions
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(subscriber, ids)| (subscriber, ids.into_iter().collect()))
        .collect())
}

/// Audit every session file under `input_dir` and write a text report to
/// `report_path`. A file that cannot be read is recorded in the report and
/// the pass continues. Returns the number of subscribers flagged across all
/// files.
pub fn audit_directory(input_dir: &Path, report_path: &Path) -> Result<usize> {
    if !input_dir.exists() {
        return Err(AuditError::InputDirNotFound(input_dir.to_path_buf()));
    }

    let files = find_session_files(input_dir);

    let mut report = File::create(report_path).map_err(|source| AuditError::FileWrite {
        path: report_path.to_path_buf(),
        source,
    })?;
    let io = |source| AuditError::FileWrite {
        path: report_path.to_path_buf(),
        source,
    };

    writeln!(report, "DUPLICATE SESSIONS BY FILE").map_err(io)?;
    writeln!(report, "{}", "=".repeat(40)).map_err(io)?;

    let mut flagged = 0usize;
    for path in &files {
        writeln!(report).map_err(io)?;
        writeln!(report, "{}", path.display()).map_err(io)?;

        match find_duplicate_sessions(path) {
            Ok(duplicates) if duplicates.is_empty() => {
                writeln!(report, "  no duplicates").map_err(io)?;
            }
            Ok(duplicates) => {
                for (subscriber, sessions) in &duplicates {
                    writeln!(
                        report,
                        "  subscriber {}: sessions {}",
                        subscriber,
                        sessions.join(", "),
                    )
                    .map_err(io)?;
                }
                flagged += duplicates.len();
            }
            Err(e) => {
                warn!("Error auditing {}: {}", path.display(), e);
                writeln!(report, "  error: {}", e).map_err(io)?;
            }
        }
    }

    info!(
        "Duplicate audit: {} file(s) checked, {} subscriber(s) flagged",
        files.len(),
        flagged,
    );
    Ok(flagged)
}
