//! Runtime layer for the PSX traffic audit.
//!
//! Owns the worker pool that fans the session files out over blocking
//! workers and funnels their anomalies into the shared aggregate.

pub mod coordinator;

pub use audit_core as core;
pub use audit_data as data;
