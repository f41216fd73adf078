//! Raw PSX export combination.
//!
//! Each collection window produces one file per PSX node, named
//! `psx_<version>_<time>.csv` (comma separated) or `.txt` (pipe separated).
//! This pass merges every window's node files into a single `psx_<time>.csv`
//! in the scan input directory, tagging each row with the node version and
//! normalising the traffic counters on the way through.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use audit_core::formatting::format_value;
use audit_core::{AuditError, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::table::Table;

/// PSX node ids whose counters are exported in octets-of-bits and need the
/// byte conversion applied.
const BIT_COUNTER_NODES: std::ops::RangeInclusive<i64> = 3..=5;

/// Column added to every combined row naming the source node version.
const VERSION_COLUMN: &str = "PSX_Version";

/// One raw export file, keyed by collection window.
#[derive(Debug)]
struct RawExport {
    path: PathBuf,
    version: String,
    sep: char,
}

/// Merge the raw node exports under `raw_dir` into per-window session files
/// in `out_dir`. Returns the paths written, one per collection window.
pub fn combine_raw_exports(raw_dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    if !raw_dir.exists() {
        return Err(AuditError::InputDirNotFound(raw_dir.to_path_buf()));
    }

    let pattern = Regex::new(r"^psx_([^_]+)_(.+)\.(csv|txt)$").expect("static pattern");

    // BTreeMap keeps windows in a stable order for logging and the result.
    let mut windows: BTreeMap<String, Vec<RawExport>> = BTreeMap::new();

    for entry in walkdir::WalkDir::new(raw_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let (version, window, sep) = {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(captures) = pattern.captures(name) else {
                continue;
            };
            let sep = if &captures[3] == "txt" { '|' } else { ',' };
            (captures[1].to_string(), captures[2].to_string(), sep)
        };

        windows.entry(window).or_default().push(RawExport {
            path: entry.into_path(),
            version,
            sep,
        });
    }

    if windows.is_empty() {
        info!("No raw exports found in {}", raw_dir.display());
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(out_dir).map_err(|source| AuditError::FileWrite {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for (window, mut exports) in windows {
        exports.sort_by(|a, b| a.path.cmp(&b.path));
        let combined = combine_window(&exports)?;

        let out_path = out_dir.join(format!("psx_{}.csv", window));
        combined.write(&out_path)?;
        info!(
            "Window {}: combined {} export(s) into {}",
            window,
            exports.len(),
            out_path.display(),
        );
        written.push(out_path);
    }

    Ok(written)
}

/// Merge one window's node exports into a single table.
///
/// Columns are the union of the source columns in first-seen order, plus
/// `PSX_Version` at the end; cells missing from a source stay empty.
fn combine_window(exports: &[RawExport]) -> Result<Table> {
    let mut columns: Vec<String> = Vec::new();
    // (source column layout, version, rows) per export, resolved after the
    // full column union is known.
    let mut parts: Vec<(Vec<String>, String, Vec<Vec<String>>)> = Vec::new();

    for export in exports {
        let table = Table::read(&export.path, export.sep)?;
        for column in &table.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        parts.push((table.columns, export.version.clone(), table.rows));
    }

    let mut combined = Table {
        columns,
        rows: Vec::new(),
    };
    combined.columns.push(VERSION_COLUMN.to_string());
    let version_idx = combined.columns.len() - 1;

    for (source_columns, version, rows) in parts {
        let mapping: Vec<usize> = source_columns
            .iter()
            .map(|c| {
                combined
                    .columns
                    .iter()
                    .position(|u| u == c)
                    .unwrap_or(usize::MAX)
            })
            .collect();

        for row in rows {
            let mut out = vec![String::new(); combined.columns.len()];
            for (cell, &target) in row.into_iter().zip(&mapping) {
                if target != usize::MAX {
                    out[target] = cell;
                }
            }
            out[version_idx] = version.clone();
            combined.rows.push(out);
        }
    }

    normalise_traffic(&mut combined);
    Ok(combined)
}

/// Clamp negative traffic counters to zero and convert bit-counted nodes to
/// bytes (multiply by 8 where `IdPSX` falls in [`BIT_COUNTER_NODES`]).
fn normalise_traffic(table: &mut Table) {
    let traffic_columns: Vec<usize> = ["UpTx", "DownTx"]
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();
    if traffic_columns.is_empty() {
        return;
    }

    let node_column = table.column_index("IdPSX");
    if node_column.is_none() {
        warn!("No IdPSX column in combined window, skipping counter conversion");
    }

    let mut clamped = 0u64;
    for row in &mut table.rows {
        let scale = node_column
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.trim().parse::<i64>().ok())
            .map(|node| if BIT_COUNTER_NODES.contains(&node) { 8.0 } else { 1.0 })
            .unwrap_or(1.0);

        for &idx in &traffic_columns {
            let Some(cell) = row.get_mut(idx) else {
                continue;
            };
            let Ok(value) = cell.trim().parse::<f64>() else {
                continue;
            };
            let value = if value < 0.0 {
                clamped += 1;
                0.0
            } else {
                value
            };
            *cell = format_value(value * scale);
        }
    }

    if clamped > 0 {
        debug!("Clamped {} negative traffic counter(s) to zero", clamped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_combine_groups_by_window() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(dir.path(), "psx_v1_1200.csv", "IdSession,UpTx,DownTx\ns1,10,20\n");
        write_file(dir.path(), "psx_v2_1200.csv", "IdSession,UpTx,DownTx\ns2,30,40\n");
        write_file(dir.path(), "psx_v1_1300.csv", "IdSession,UpTx,DownTx\ns3,50,60\n");

        let written = combine_raw_exports(dir.path(), &out).unwrap();
        assert_eq!(written.len(), 2);
        assert!(out.join("psx_1200.csv").exists());
        assert!(out.join("psx_1300.csv").exists());

        let lines = read_lines(&out.join("psx_1200.csv"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_combine_tags_rows_with_version() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(dir.path(), "psx_v1_1200.csv", "IdSession,UpTx,DownTx\ns1,10,20\n");
        write_file(dir.path(), "psx_v2_1200.csv", "IdSession,UpTx,DownTx\ns2,30,40\n");

        combine_raw_exports(dir.path(), &out).unwrap();

        let lines = read_lines(&out.join("psx_1200.csv"));
        assert!(lines[0].ends_with(",PSX_Version"));
        assert!(lines.iter().any(|l| l == "s1,10,20,v1"));
        assert!(lines.iter().any(|l| l == "s2,30,40,v2"));
    }

    #[test]
    fn test_combine_reads_pipe_separated_txt() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(dir.path(), "psx_v3_1200.txt", "IdSession|UpTx|DownTx\ns1|10|20\n");

        combine_raw_exports(dir.path(), &out).unwrap();

        let lines = read_lines(&out.join("psx_1200.csv"));
        assert_eq!(lines[1], "s1,10,20,v3");
    }

    #[test]
    fn test_combine_clamps_negative_counters() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(dir.path(), "psx_v1_1200.csv", "IdSession,UpTx,DownTx\ns1,-5,30\n");

        combine_raw_exports(dir.path(), &out).unwrap();

        let lines = read_lines(&out.join("psx_1200.csv"));
        assert_eq!(lines[1], "s1,0,30,v1");
    }

    #[test]
    fn test_combine_scales_bit_counted_nodes() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(
            dir.path(),
            "psx_v1_1200.csv",
            "IdSession,IdPSX,UpTx,DownTx\ns1,3,10,20\ns2,5,1,2\ns3,6,10,20\n",
        );

        combine_raw_exports(dir.path(), &out).unwrap();

        let lines = read_lines(&out.join("psx_1200.csv"));
        assert_eq!(lines[1], "s1,3,80,160,v1");
        assert_eq!(lines[2], "s2,5,8,16,v1");
        assert_eq!(lines[3], "s3,6,10,20,v1");
    }

    #[test]
    fn test_combine_unions_differing_columns() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(dir.path(), "psx_v1_1200.csv", "IdSession,UpTx\ns1,10\n");
        write_file(dir.path(), "psx_v2_1200.csv", "IdSession,DownTx\ns2,40\n");

        combine_raw_exports(dir.path(), &out).unwrap();

        let lines = read_lines(&out.join("psx_1200.csv"));
        assert_eq!(lines[0], "IdSession,UpTx,DownTx,PSX_Version");
        assert!(lines.iter().any(|l| l == "s1,10,,v1"));
        assert!(lines.iter().any(|l| l == "s2,,40,v2"));
    }

    #[test]
    fn test_combine_ignores_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("splitted");
        write_file(dir.path(), "notes.csv", "A\n1\n");
        write_file(dir.path(), "psx_1200.csv", "A\n1\n");

        let written = combine_raw_exports(dir.path(), &out).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_combine_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(combine_raw_exports(&missing, &dir.path().join("out")).is_err());
    }
}
