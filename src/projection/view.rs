//! View projection

use crate::error::SourceError;
use crate::model::{EntityKind, ViewColumn, ViewInfo};
use crate::source::RawRow;

use super::project_rows;

pub fn project_views(rows: &[RawRow]) -> Result<Vec<ViewInfo>, SourceError> {
    project_rows(rows, EntityKind::View, &["object_id"], |row| {
        Ok(ViewInfo {
            object_id: row.int("object_id")?,
            is_indexed: row.flag("is_indexed")?,
            is_schema_bound: row.flag("is_schema_bound")?,
            with_check_option: row.flag("with_check_option")?,
        })
    })
}

/// Lineage fields stay NULL; resolving them needs the view body parsed.
pub fn project_view_columns(rows: &[RawRow]) -> Result<Vec<ViewColumn>, SourceError> {
    project_rows(rows, EntityKind::ViewColumn, &["view_id", "ordinal_position"], |row| {
        Ok(ViewColumn {
            view_id: row.int("view_id")?,
            ordinal_position: row.int("ordinal_position")?,
            column_name: row.text("column_name")?,
            data_type: row.text("data_type")?,
            source_expression: None,
            source_column_id: None,
        })
    })
}
