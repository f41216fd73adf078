//! Core domain types for the PSX traffic audit.
//!
//! Session records, anomaly candidates, timestamp parsing, numeric
//! formatting, the error taxonomy and CLI settings shared by every other
//! crate in the workspace.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod timestamps;

pub use error::{AuditError, Result};
