//! Data layer for the PSX traffic audit.
//!
//! Responsible for discovering and parsing the per-window session CSV files,
//! deriving anomaly candidates, maintaining the shared per-subscriber
//! aggregate, and writing the report artifacts. Also carries the single-pass
//! collaborator passes around the core scan: raw-export combination,
//! duplicate-session auditing and downstream enrichment.

pub mod aggregator;
pub mod combine;
pub mod duplicates;
pub mod enrich;
pub mod reader;
pub mod report;
pub mod table;

pub use audit_core as core;
