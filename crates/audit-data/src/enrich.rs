//! Anomaly report enrichment.
//!
//! Joins the anomaly report against the billing reference tables to produce
//! the `result.csv` handed to the blocking system: `subscribers.csv` maps a
//! PSX subscriber to a client and plan, `company.csv` and `physical.csv`
//! classify the client. The `Id` column carries the subscriber id and `UID`
//! the client id. Missing reference rows leave their cells empty, the row
//! itself is always kept.

use std::collections::HashMap;
use std::path::Path;

use audit_core::formatting::format_value;
use audit_core::Result;
use tracing::{info, warn};

use crate::table::Table;

/// Header of the enriched `result.csv`.
pub const RESULT_COLUMNS: [&str; 7] =
    ["Id", "UID", "Type", "IdPlan", "TurnOn", "Hacked", "Traffic"];

#[derive(Debug, Clone)]
struct SubscriberInfo {
    client_id: String,
    plan_id: String,
    turn_on: String,
}

/// Enrich `report_path` against the reference tables in `reference_dir` and
/// write the result to `out_path`. Returns the number of rows written.
pub fn enrich_report(report_path: &Path, reference_dir: &Path, out_path: &Path) -> Result<usize> {
    let report = Table::read(report_path, ',')?;
    let subscriber_idx = report.require_column("SubscriberId", report_path)?;
    let up_idx = report.require_column("UploadBytes", report_path)?;
    let down_idx = report.require_column("DownloadBytes", report_path)?;

    let subscribers = load_subscribers(&reference_dir.join("subscribers.csv"))?;
    let client_kinds = load_client_kinds(reference_dir)?;

    let mut result = Table {
        columns: RESULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: Vec::new(),
    };

    let mut unmatched = 0usize;
    for row in &report.rows {
        let subscriber_id = row[subscriber_idx].trim();
        let traffic = traffic_for(row.get(up_idx), row.get(down_idx));

        let Some(subscriber) = subscribers.get(subscriber_id) else {
            unmatched += 1;
            result.rows.push(vec![
                subscriber_id.to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                "true".to_string(),
                traffic,
            ]);
            continue;
        };

        let kind = client_kinds
            .get(subscriber.client_id.as_str())
            .map(|k| k.to_string())
            .unwrap_or_default();

        result.rows.push(vec![
            subscriber_id.to_string(),
            subscriber.client_id.clone(),
            kind,
            subscriber.plan_id.clone(),
            map_turn_on(&subscriber.turn_on),
            "true".to_string(),
            traffic,
        ]);
    }

    if unmatched > 0 {
        warn!("{} anomaly row(s) had no matching subscriber", unmatched);
    }

    result.write(out_path)?;
    info!(
        "Wrote {} enriched row(s) to {}",
        result.rows.len(),
        out_path.display(),
    );
    Ok(result.rows.len())
}

/// `subscribers.csv`: IdOnPSX keyed map to client, plan and line status.
fn load_subscribers(path: &Path) -> Result<HashMap<String, SubscriberInfo>> {
    let table = Table::read(path, ',')?;
    let psx_idx = table.require_column("IdOnPSX", path)?;
    let client_idx = table.require_column("IdClient", path)?;
    let plan_idx = table.require_column("IdPlan", path)?;
    let turn_on_idx = table.require_column("TurnOn", path)?;

    Ok(table
        .rows
        .iter()
        .map(|row| {
            (
                row[psx_idx].trim().to_string(),
                SubscriberInfo {
                    client_id: row[client_idx].trim().to_string(),
                    plan_id: row[plan_idx].trim().to_string(),
                    turn_on: row[turn_on_idx].trim().to_string(),
                },
            )
        })
        .collect())
}

/// `company.csv` plus `physical.csv`, mapping client id to `C` or `P`. A
/// client id present in both keeps its company classification.
fn load_client_kinds(reference_dir: &Path) -> Result<HashMap<String, char>> {
    let mut kinds = HashMap::new();
    for (file, kind) in [("company.csv", 'C'), ("physical.csv", 'P')] {
        let path = reference_dir.join(file);
        let table = Table::read(&path, ',')?;
        let id_idx = table.require_column("Id", &path)?;

        for row in &table.rows {
            kinds.entry(row[id_idx].trim().to_string()).or_insert(kind);
        }
    }
    Ok(kinds)
}

fn traffic_for(up: Option<&String>, down: Option<&String>) -> String {
    let parse = |cell: Option<&String>| {
        cell.map(String::as_str)
            .unwrap_or("")
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0)
    };
    format_value(parse(up) - parse(down))
}

/// `ON`/`OFF` become booleans; any other status is passed through untouched.
fn map_turn_on(status: &str) -> String {
    match status {
        "ON" => "true".to_string(),
        "OFF" => "false".to_string(),
        other => other.to_string(),
    }
}
