//! Entity projection: raw catalog rows into canonical records
//!
//! One function per entity kind. Every function is pure: it reads the rows it
//! is given, appends unmapped-code warnings to the caller's list, and either
//! returns the projected records or the first malformed value it met.

mod database;
mod index;
mod object;
mod routine;
mod view;

pub use database::{project_databases, project_schemas};
pub use index::{project_index_columns, project_indexes};
pub use object::{project_columns, project_objects, project_tables};
pub use routine::{
    project_functions, project_procedures, project_result_columns, project_routine_parameters,
    ProjectedParameters,
};
pub use view::{project_view_columns, project_views};

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::model::{EntityKind, NaturalKey};
use crate::source::{QueryDefinition, RawRow};

/// Fail fast when a row lacks a column the query promises
pub fn check_required_columns(query: &QueryDefinition, rows: &[RawRow]) -> Result<(), SourceError> {
    for row in rows {
        if let Some(missing) = query
            .required_columns()
            .iter()
            .find(|col| !row.has_column(col))
        {
            return Err(SourceError::MissingColumn {
                query: query.name().to_string(),
                column: missing.to_string(),
            });
        }
    }
    Ok(())
}

/// Project every row, tagging a failure with the key of the row that raised it
pub(crate) fn project_rows<T>(
    rows: &[RawRow],
    entity: EntityKind,
    key_columns: &[&str],
    mut project: impl FnMut(&RawRow) -> Result<T, SourceError>,
) -> Result<Vec<T>, SourceError> {
    rows.iter()
        .map(|row| project(row).map_err(|e| e.in_row(entity, row.key(key_columns))))
        .collect()
}

/// Like [`project_rows`] for projections that fan rows out into several sets
pub(crate) fn for_each_row(
    rows: &[RawRow],
    entity: EntityKind,
    key_columns: &[&str],
    mut visit: impl FnMut(&RawRow) -> Result<(), SourceError>,
) -> Result<(), SourceError> {
    for row in rows {
        visit(row).map_err(|e| e.in_row(entity, row.key(key_columns)))?;
    }
    Ok(())
}

/// Record a code that fell through to the fallback variant
pub(crate) fn unmapped(
    warnings: &mut Vec<UnmappedCode>,
    entity: EntityKind,
    field: &str,
    code: impl ToString,
    natural_key: NaturalKey,
) {
    warnings.push(UnmappedCode {
        entity,
        field: field.to_string(),
        code: code.to_string(),
        natural_key,
    });
}
