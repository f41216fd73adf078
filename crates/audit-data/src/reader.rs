//! Session-file discovery and per-file anomaly scanning.
//!
//! Reads the per-time-window `psx_*.csv` files produced by the combine pass
//! and derives [`AnomalyCandidate`]s for the aggregate. One bad file never
//! aborts a batch: every failure is folded into the returned [`FileOutcome`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use audit_core::models::{AnomalyCandidate, SessionRecord};
use audit_core::timestamps::{parse_session_end, parse_session_time};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::table::split_fields;

/// Columns every session file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "IdSession",
    "IdSubscriber",
    "StartSession",
    "EndSession",
    "UpTx",
    "DownTx",
];

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `psx_*.csv` files directly under `input_dir`, sorted by path.
pub fn find_session_files(input_dir: &Path) -> Vec<PathBuf> {
    if !input_dir.exists() {
        warn!("Input directory does not exist: {}", input_dir.display());
        return Vec::new();
    }

    // The naming convention is fixed by the upstream combiner.
    let pattern = Regex::new(r"^psx_.*\.csv$").expect("static pattern");

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(input_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| pattern.is_match(name))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

// ── FileOutcome ───────────────────────────────────────────────────────────────

/// The per-file result handed back to the coordinator.
///
/// A file-level failure is represented as an outcome with zero candidates and
/// `error` set, so the batch summary can account for it without the worker
/// propagating anything.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Anomalous sessions found in this file (possibly empty).
    pub candidates: Vec<AnomalyCandidate>,
    /// Data rows seen.
    pub rows_read: u64,
    /// Rows dropped for an unparsable start time or byte count.
    pub rows_dropped: u64,
    /// File-level failure detail, when the whole file was unusable.
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn has_anomalies(&self) -> bool {
        !self.candidates.is_empty()
    }

    fn errored(path: &Path, detail: String) -> Self {
        Self {
            path: path.to_path_buf(),
            candidates: Vec::new(),
            rows_read: 0,
            rows_dropped: 0,
            error: Some(detail),
        }
    }
}

// ── File processing ───────────────────────────────────────────────────────────

/// Scan one session file and return its anomaly candidates.
///
/// Row policy: a row whose start time fails every accepted format, or whose
/// byte counters are not numeric, is dropped and the scan continues. File
/// policy: an unreadable file or one missing a required column yields an
/// errored outcome with zero candidates.
pub fn process_file(path: &Path) -> FileOutcome {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Error processing file {}: {}", path.display(), e);
            return FileOutcome::errored(path, e.to_string());
        }
    };
    let reader = BufReader::new(file);

    let mut column_indices: Option<[usize; 6]> = None;
    let mut rows_read = 0u64;
    let mut rows_dropped = 0u64;
    let mut candidates: Vec<AnomalyCandidate> = Vec::new();

    for line_result in reader.lines() {
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                warn!("Error processing file {}: {}", path.display(), e);
                return FileOutcome::errored(path, e.to_string());
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(&line, ',');

        let indices = match column_indices {
            Some(indices) => indices,
            None => {
                // First non-blank line is the header.
                let header: Vec<String> =
                    fields.into_iter().map(|f| f.trim().to_string()).collect();
                match resolve_columns(&header) {
                    Ok(indices) => {
                        column_indices = Some(indices);
                        continue;
                    }
                    Err(missing) => {
                        let detail = format!("missing required column \"{}\"", missing);
                        warn!("Error processing file {}: {}", path.display(), detail);
                        return FileOutcome::errored(path, detail);
                    }
                }
            }
        };

        rows_read += 1;

        match parse_row(&fields, &indices) {
            Some(record) => {
                if let Some(candidate) = AnomalyCandidate::from_record(record) {
                    candidates.push(candidate);
                }
            }
            None => rows_dropped += 1,
        }
    }

    if rows_read == 0 {
        info!("File {} has no usable rows, skipping", path.display());
    } else if candidates.is_empty() {
        info!("No anomalies found in {}", path.display());
    } else {
        debug!(
            "File {}: {} rows read, {} dropped, {} anomalous",
            path.display(),
            rows_read,
            rows_dropped,
            candidates.len(),
        );
    }

    FileOutcome {
        path: path.to_path_buf(),
        candidates,
        rows_read,
        rows_dropped,
        error: None,
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Map [`REQUIRED_COLUMNS`] to their indices in `header`, or return the first
/// missing column name.
fn resolve_columns(header: &[String]) -> std::result::Result<[usize; 6], &'static str> {
    let mut indices = [0usize; 6];
    for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS.iter().copied()) {
        match header.iter().position(|c| c == name) {
            Some(idx) => *slot = idx,
            None => return Err(name),
        }
    }
    Ok(indices)
}

/// Build a [`SessionRecord`] from one data row, or `None` when the row must
/// be dropped.
fn parse_row(fields: &[String], indices: &[usize; 6]) -> Option<SessionRecord> {
    let cell = |i: usize| fields.get(indices[i]).map(String::as_str).unwrap_or("");

    let start = parse_session_time(cell(2))?;
    let up_bytes: f64 = cell(4).trim().parse().ok()?;
    let down_bytes: f64 = cell(5).trim().parse().ok()?;

    Some(SessionRecord {
        session_id: cell(0).trim().to_string(),
        subscriber_id: cell(1).trim().to_string(),
        start,
        end: parse_session_end(cell(3)),
        up_bytes,
        down_bytes,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::models::SessionEnd;
    use tempfile::TempDir;

    const HEADER: &str = "IdSession,IdPSX,IdSubscriber,StartSession,EndSession,UpTx,DownTx";

    fn write_session_file(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut content = String::from(HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    // ── find_session_files ───────────────────────────────────────────────────

    #[test]
    fn test_find_session_files_matches_naming_convention() {
        let dir = TempDir::new().unwrap();
        write_session_file(dir.path(), "psx_1200.csv", &[]);
        write_session_file(dir.path(), "psx_1300.csv", &[]);
        std::fs::write(dir.path().join("other.csv"), "x").unwrap();
        std::fs::write(dir.path().join("psx_1400.txt"), "x").unwrap();

        let files = find_session_files(dir.path());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_find_session_files_sorted() {
        let dir = TempDir::new().unwrap();
        write_session_file(dir.path(), "psx_c.csv", &[]);
        write_session_file(dir.path(), "psx_a.csv", &[]);
        write_session_file(dir.path(), "psx_b.csv", &[]);

        let files = find_session_files(dir.path());
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["psx_a.csv", "psx_b.csv", "psx_c.csv"]);
    }

    #[test]
    fn test_find_session_files_not_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir_all(&sub).unwrap();
        write_session_file(&sub, "psx_deep.csv", &[]);

        assert!(find_session_files(dir.path()).is_empty());
    }

    #[test]
    fn test_find_session_files_missing_dir() {
        assert!(find_session_files(Path::new("/tmp/psx-audit-does-not-exist")).is_empty());
    }

    // ── process_file ─────────────────────────────────────────────────────────

    #[test]
    fn test_process_file_keeps_only_anomalous_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_session_file(
            dir.path(),
            "psx_1200.csv",
            &[
                "s1,1,sub1,2024-01-01 09:00:00,2024-01-01 10:00:00,100,40",
                "s2,1,sub2,2024-01-01 09:00:00,2024-01-01 10:00:00,40,100",
                "s3,1,sub3,2024-01-01 09:00:00,2024-01-01 10:00:00,50,50",
            ],
        );

        let outcome = process_file(&path);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.rows_read, 3);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].subscriber_id(), "sub1");
        assert!((outcome.candidates[0].ratio - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_process_file_drops_unparsable_start() {
        let dir = TempDir::new().unwrap();
        let path = write_session_file(
            dir.path(),
            "psx_1200.csv",
            &[
                "s1,1,sub1,garbage,2024-01-01 10:00:00,100,40",
                "s2,1,sub2,,2024-01-01 10:00:00,100,40",
                "s3,1,sub3,15-01-2024 09:00:00,2024-01-01 10:00:00,100,40",
            ],
        );

        let outcome = process_file(&path);
        assert_eq!(outcome.rows_read, 3);
        assert_eq!(outcome.rows_dropped, 2);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].subscriber_id(), "sub3");
    }

    #[test]
    fn test_process_file_accepts_every_date_format() {
        let dir = TempDir::new().unwrap();
        let path = write_session_file(
            dir.path(),
            "psx_1200.csv",
            &[
                "s1,1,a,15-01-2024 09:00:00,,10,1",
                "s2,1,b,15/01/2024 09:00:00,,10,1",
                "s3,1,c,2024-01-15 09:00:00,,10,1",
                "s4,1,d,01/15/2024 09:00:00,,10,1",
            ],
        );

        let outcome = process_file(&path);
        assert_eq!(outcome.rows_dropped, 0);
        assert_eq!(outcome.candidates.len(), 4);
    }

    #[test]
    fn test_process_file_blank_end_is_open() {
        let dir = TempDir::new().unwrap();
        let path = write_session_file(
            dir.path(),
            "psx_1200.csv",
            &["s1,1,sub1,2024-01-01 09:00:00,,100,40"],
        );

        let outcome = process_file(&path);
        assert_eq!(outcome.candidates[0].record.end, SessionEnd::Open);
    }

    #[test]
    fn test_process_file_drops_non_numeric_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_session_file(
            dir.path(),
            "psx_1200.csv",
            &["s1,1,sub1,2024-01-01 09:00:00,,abc,40"],
        );

        let outcome = process_file(&path);
        assert_eq!(outcome.rows_dropped, 1);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_process_file_missing_column_is_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("psx_1200.csv");
        std::fs::write(&path, "IdSession,IdSubscriber\ns1,sub1\n").unwrap();

        let outcome = process_file(&path);
        assert!(outcome.error.is_some());
        assert!(outcome.error.unwrap().contains("StartSession"));
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_process_file_unreadable_is_file_error() {
        let outcome = process_file(Path::new("/tmp/psx-audit-missing/psx_x.csv"));
        assert!(outcome.error.is_some());
        assert!(!outcome.has_anomalies());
    }

    #[test]
    fn test_process_file_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_session_file(dir.path(), "psx_1200.csv", &[]);

        let outcome = process_file(&path);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.rows_read, 0);
        assert!(!outcome.has_anomalies());
    }
}
