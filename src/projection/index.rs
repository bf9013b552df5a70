//! Index and index column projection

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::model::{
    EntityKind, IndexColumn, IndexIncludedColumn, IndexInfo, IndexType, NaturalKey,
    HEAP_INDEX_TYPE,
};
use crate::source::RawRow;

use super::{for_each_row, unmapped};

/// Project `sys.indexes` rows; heaps (index_id 0) are not indexes and are skipped
pub fn project_indexes(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<IndexInfo>, SourceError> {
    let mut indexes = Vec::with_capacity(rows.len());

    for_each_row(rows, EntityKind::Index, &["table_id", "index_id"], |row| {
        let table_id = row.int("table_id")?;
        let index_id = row.int("index_id")?;
        let type_code = row.int("type")?;
        if index_id == 0 || type_code == HEAP_INDEX_TYPE {
            return Ok(());
        }

        let index_type = IndexType::from_code(type_code).unwrap_or_else(|| {
            unmapped(
                warnings,
                EntityKind::Index,
                "index_type",
                type_code,
                NaturalKey::ids(&[table_id, index_id]),
            );
            IndexType::Other
        });

        indexes.push(IndexInfo {
            table_id,
            index_id,
            name: row.opt_text("name")?,
            index_type,
            is_primary_key: row.flag("is_primary_key")?,
            is_unique: row.flag("is_unique")?,
            is_filtered: row.flag("has_filter")?,
            filter_definition: row.opt_text("filter_definition")?,
            is_clustered: IndexType::code_is_clustered(type_code),
            is_column_store: IndexType::code_is_column_store(type_code),
            is_full_text: row.flag("is_full_text")?,
            file_group: row.opt_text("file_group")?,
            fill_factor: row.opt_int("fill_factor")?.filter(|f| *f != 0),
            compression: row.opt_text("data_compression")?,
        });
        Ok(())
    })?;

    Ok(indexes)
}

/// Split `sys.index_columns` rows into key columns and included columns.
///
/// Rows that are neither (partitioning columns, key_ordinal 0 and not
/// included) describe storage rather than the index shape.
pub fn project_index_columns(
    rows: &[RawRow],
) -> Result<(Vec<IndexColumn>, Vec<IndexIncludedColumn>), SourceError> {
    let mut keys = Vec::new();
    let mut included = Vec::new();

    let key_columns = ["table_id", "index_id", "column_id"];
    for_each_row(rows, EntityKind::IndexColumn, &key_columns, |row| {
        let table_id = row.int("table_id")?;
        let index_id = row.int("index_id")?;
        let column_id = row.int("column_id")?;
        let key_ordinal = row.opt_int("key_ordinal")?.unwrap_or(0);

        if row.flag("is_included_column")? {
            included.push(IndexIncludedColumn {
                table_id,
                index_id,
                column_id,
            });
        } else if key_ordinal > 0 {
            keys.push(IndexColumn {
                table_id,
                index_id,
                column_id,
                key_ordinal,
                is_descending: row.flag("is_descending_key")?,
            });
        }
        Ok(())
    })?;

    Ok((keys, included))
}
