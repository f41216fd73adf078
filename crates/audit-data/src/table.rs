//! Minimal delimited-table reading and writing.
//!
//! The PSX feeds are plain header-plus-rows files; comma for the combined
//! session files, pipe for some raw exports. Quoted fields are honoured on
//! read and emitted on write only when a field needs them.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use audit_core::{AuditError, Result};

/// Split one delimited line into fields, honouring double-quoted fields with
/// `""` escapes.
pub fn split_fields(line: &str, sep: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' && current.is_empty() {
            in_quotes = true;
        } else if c == sep {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

/// An in-memory delimited table: one header row plus data rows.
///
/// Rows are stored as strings; numeric interpretation is left to the caller.
/// Short rows are padded with empty cells so every row has one cell per
/// column.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a table from `path` using `sep` as the field delimiter.
    ///
    /// Blank lines are skipped. A file without a header row is an error.
    pub fn read(path: &Path, sep: char) -> Result<Table> {
        let file = File::open(path).map_err(|source| AuditError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|source| AuditError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let fields = split_fields(&line, sep);
            if columns.is_empty() {
                columns = fields.into_iter().map(|f| f.trim().to_string()).collect();
            } else {
                let mut row = fields;
                row.resize(columns.len(), String::new());
                rows.push(row);
            }
        }

        if columns.is_empty() {
            return Err(AuditError::EmptyTable {
                path: path.to_path_buf(),
            });
        }

        Ok(Table { columns, rows })
    }

    /// Index of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a named column, or a [`AuditError::MissingColumn`] naming the
    /// file that lacked it.
    pub fn require_column(&self, name: &str, path: &Path) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| AuditError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    }

    /// Append a column filled with `values` (one per row).
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Write the table to `path` as comma-separated values, replacing any
    /// existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path).map_err(|source| AuditError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;

        let io = |source| AuditError::FileWrite {
            path: path.to_path_buf(),
            source,
        };

        writeln!(file, "{}", join_fields(&self.columns)).map_err(io)?;
        for row in &self.rows {
            writeln!(file, "{}", join_fields(&row[..self.columns.len().min(row.len())]))
                .map_err(io)?;
        }
        Ok(())
    }
}

/// Join fields with commas, quoting any field that needs it.
fn join_fields(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
