mod bootstrap;

use anyhow::Result;
use audit_core::settings::Settings;
use audit_data::combine::combine_raw_exports;
use audit_data::duplicates::audit_directory;
use audit_data::enrich::enrich_report;
use audit_runtime::coordinator::ScanCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("PSX Audit v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Task: {}, Input: {}, Report: {}",
        settings.task,
        settings.input_dir.display(),
        settings.report.display()
    );

    match settings.task.as_str() {
        "scan" => {
            let coordinator = ScanCoordinator::new(
                settings.input_dir.clone(),
                settings.report.clone(),
                settings.effective_workers(),
            );

            let summary = coordinator.run().await?;
            if summary.report_written {
                tracing::info!(
                    "Anomaly report written: {} subscriber(s) from {} file(s)",
                    summary.subscribers,
                    summary.total_files
                );
            } else {
                tracing::info!(
                    "No anomalies across {} file(s), no report produced",
                    summary.total_files
                );
            }
        }

        "combine" => {
            let written = combine_raw_exports(&settings.raw_dir, &settings.input_dir)?;
            tracing::info!(
                "Combined raw exports into {} window file(s) under {}",
                written.len(),
                settings.input_dir.display()
            );
        }

        "audit" => {
            let flagged = audit_directory(&settings.input_dir, &settings.duplicates_report)?;
            tracing::info!(
                "Duplicate audit finished: {} subscriber(s) flagged, report at {}",
                flagged,
                settings.duplicates_report.display()
            );
        }

        "enrich" => {
            let rows = enrich_report(&settings.report, &settings.reference_dir, &settings.result)?;
            tracing::info!(
                "Enriched {} row(s) into {}",
                rows,
                settings.result.display()
            );
        }

        unknown => {
            eprintln!("Unknown task: {}", unknown);
        }
    }

    Ok(())
}
