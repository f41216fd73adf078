//! Scan coordination: file discovery, worker fan-out, aggregation, report.
//!
//! The coordinator partitions the discovered session files round-robin over
//! a fixed number of blocking workers, waits for every worker to finish, and
//! only then renders the report from the shared aggregate. A worker that
//! fails never takes the batch down with it.

use std::path::PathBuf;
use std::sync::Arc;

use audit_core::{AuditError, Result};
use audit_data::aggregator::AnomalyAggregate;
use audit_data::reader::{find_session_files, process_file};
use audit_data::report::{discard_previous, write_report};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// What one scan did, for the caller's summary line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_files: usize,
    pub files_with_anomalies: usize,
    pub files_without: usize,
    /// Subscribers carrying at least one anomaly.
    pub subscribers: usize,
    /// Whether `anomaly_report.csv` was produced.
    pub report_written: bool,
}

/// Drives one scan over a directory of session files.
pub struct ScanCoordinator {
    input_dir: PathBuf,
    report_path: PathBuf,
    workers: usize,
}

impl ScanCoordinator {
    pub fn new(input_dir: PathBuf, report_path: PathBuf, workers: usize) -> Self {
        Self {
            input_dir,
            report_path,
            workers: workers.max(1),
        }
    }

    /// Run the scan to completion and return its summary.
    pub async fn run(&self) -> Result<RunSummary> {
        if !self.input_dir.exists() {
            return Err(AuditError::InputDirNotFound(self.input_dir.clone()));
        }

        // A stale report must not outlive this run, whatever it finds.
        discard_previous(&self.report_path)?;

        let files = find_session_files(&self.input_dir);
        if files.is_empty() {
            info!("No session files found in {}", self.input_dir.display());
            return Ok(RunSummary::default());
        }

        let total_files = files.len();
        let workers = self.workers.min(total_files);
        info!(
            "Scanning {} file(s) with {} worker(s)",
            total_files, workers,
        );

        let aggregate = Arc::new(AnomalyAggregate::new());
        let mut tasks = JoinSet::new();

        for chunk in partition(files, workers) {
            let aggregate = Arc::clone(&aggregate);
            tasks.spawn_blocking(move || {
                let mut files_with = 0usize;
                for path in chunk {
                    let outcome = process_file(&path);
                    if outcome.has_anomalies() {
                        files_with += 1;
                    }
                    for candidate in outcome.candidates {
                        aggregate.merge(candidate);
                    }
                }
                files_with
            });
        }

        // Barrier: the report is rendered only after every worker is done.
        let mut files_with_anomalies = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(count) => files_with_anomalies += count,
                Err(e) => warn!("Worker failed: {}", e),
            }
        }

        let mut summary = RunSummary {
            total_files,
            files_with_anomalies,
            files_without: total_files - files_with_anomalies,
            subscribers: aggregate.len(),
            report_written: false,
        };

        if aggregate.is_empty() {
            info!("No anomalies in batch, no report written");
            return Ok(summary);
        }

        // Every worker has joined, so the Arc is normally unique here.
        let rows = match Arc::try_unwrap(aggregate) {
            Ok(aggregate) => aggregate.into_rows(),
            Err(shared) => shared.rows_snapshot(),
        };

        for candidate in rows.iter().take(5) {
            info!(
                "Anomaly: subscriber {} session {} ratio {}",
                candidate.subscriber_id(),
                candidate.record.session_id,
                candidate.ratio,
            );
        }

        write_report(&self.report_path, &rows)?;
        summary.report_written = true;
        info!(
            "Scan complete: {}/{} file(s) anomalous, {} subscriber(s) reported",
            summary.files_with_anomalies, summary.total_files, summary.subscribers,
        );
        Ok(summary)
    }
}

/// Deal `files` round-robin into `workers` non-empty chunks.
fn partition(files: Vec<PathBuf>, workers: usize) -> Vec<Vec<PathBuf>> {
    let mut chunks: Vec<Vec<PathBuf>> = vec![Vec::new(); workers.max(1)];
    let len = chunks.len();
    for (i, file) in files.into_iter().enumerate() {
        chunks[i % len].push(file);
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}
