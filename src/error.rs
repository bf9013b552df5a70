//! Error types for rust-dbdox

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{EntityKind, NaturalKey};
use crate::source::QueryKind;

/// Errors raised while reading one catalog source query or probe.
///
/// These are local to a single extraction step: the run coordinator records
/// them against the step and keeps going with the other steps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Catalog source unavailable for query '{query}': {message}")]
    Unavailable { query: String, message: String },

    #[error("Query '{query}' did not return required column '{column}'")]
    MissingColumn { query: String, column: String },

    #[error("Column '{column}' holds {found}, expected {expected}")]
    InvalidValue {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("Result set probe failed for routine {routine_id}: {message}")]
    Probe { routine_id: i64, message: String },

    #[error("Invalid {entity} row {natural_key}: {source}")]
    InvalidRow {
        entity: EntityKind,
        natural_key: NaturalKey,
        source: Box<SourceError>,
    },
}

impl SourceError {
    /// Tag an error with the key of the row it was raised for
    pub fn in_row(self, entity: EntityKind, natural_key: NaturalKey) -> Self {
        SourceError::InvalidRow {
            entity,
            natural_key,
            source: Box::new(self),
        }
    }
}

/// Errors that abort a whole extraction run
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Extraction run cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("No catalog source could be queried ({} steps failed)", .failed.len())]
    AllSourcesUnavailable { failed: Vec<QueryKind> },

    #[error("Strict integrity check rejected the run: {count} violation(s), first: {first}")]
    IntegrityViolation { count: usize, first: String },

    #[error("Failed to read query override file: {path}")]
    QueryOverrideRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Query override file does not name a known query: {path}")]
    UnknownQueryOverride { path: PathBuf },

    #[error("Invalid query override pattern: {message}")]
    QueryOverridePattern { message: String },
}
