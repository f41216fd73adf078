use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the PSX audit crates.
#[derive(Error, Debug)]
pub enum AuditError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tabular file is missing a column the operation requires.
    #[error("File {path} is missing required column \"{column}\"")]
    MissingColumn { path: PathBuf, column: String },

    /// A tabular file has no header row at all.
    #[error("File {path} is empty or has no header row")]
    EmptyTable { path: PathBuf },

    /// The configured input directory does not exist.
    #[error("Input directory not found: {0}")]
    InputDirNotFound(PathBuf),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the audit crates.
pub type Result<T> = std::result::Result<T, AuditError>;
