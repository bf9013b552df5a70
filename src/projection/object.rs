//! Object, table and column projection

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::model::{ColumnInfo, EntityKind, NaturalKey, ObjectInfo, ObjectType, TableInfo};
use crate::source::RawRow;

use super::{project_rows, unmapped};

pub fn project_objects(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<ObjectInfo>, SourceError> {
    project_rows(rows, EntityKind::Object, &["object_id"], |row| {
        let object_id = row.int("object_id")?;
        let type_code = row.text("type")?.trim().to_string();
        let object_type = ObjectType::from_code(&type_code).unwrap_or_else(|| {
            unmapped(
                warnings,
                EntityKind::Object,
                "object_type",
                &type_code,
                NaturalKey::ids(&[object_id]),
            );
            ObjectType::Other
        });

        Ok(ObjectInfo {
            database_id: row.int("database_id")?,
            object_id,
            schema_id: row.int("schema_id")?,
            name: row.text("name")?,
            object_type,
            type_code,
            definition: row.opt_text("definition")?,
            created_at: row.timestamp("create_date")?,
            modified_at: row.timestamp("modify_date")?,
            is_system: row.flag("is_ms_shipped")?,
            is_enabled: row.flag_or("is_enabled", true)?,
        })
    })
}

pub fn project_tables(rows: &[RawRow]) -> Result<Vec<TableInfo>, SourceError> {
    project_rows(rows, EntityKind::Table, &["object_id"], |row| {
        Ok(TableInfo {
            object_id: row.int("object_id")?,
            table_type: row.opt_text("table_type")?,
            row_count: row.opt_int("row_count")?,
            is_system_versioned: row.flag("is_system_versioned")?,
            // sys.tables reports 0 rather than NULL on some versions
            history_table_id: row.opt_int("history_table_id")?.filter(|id| *id != 0),
            is_external: row.flag("is_external")?,
            file_group: row.opt_text("file_group")?,
            is_partitioned: row.flag("is_partitioned")?,
            partition_scheme: row.opt_text("partition_scheme")?,
            partition_function: row.opt_text("partition_function")?,
        })
    })
}

pub fn project_columns(rows: &[RawRow]) -> Result<Vec<ColumnInfo>, SourceError> {
    project_rows(rows, EntityKind::Column, &["table_id", "column_id"], |row| {
        let is_identity = row.flag("is_identity")?;
        Ok(ColumnInfo {
            table_id: row.int("table_id")?,
            column_id: row.int("column_id")?,
            name: row.text("name")?,
            ordinal_position: row.int("ordinal_position")?,
            data_type: row.text("data_type")?,
            max_length: row.opt_int("max_length")?,
            precision: row.opt_int("precision")?,
            scale: row.opt_int("scale")?,
            is_nullable: row.flag_or("is_nullable", true)?,
            default_definition: row.opt_text("default_definition")?,
            computed_definition: row.opt_text("computed_definition")?,
            is_identity,
            identity_seed: row.opt_int("identity_seed")?.filter(|_| is_identity),
            identity_increment: row.opt_int("identity_increment")?.filter(|_| is_identity),
            is_sparse: row.flag("is_sparse")?,
            is_hidden: row.flag("is_hidden")?,
            is_row_guid: row.flag("is_rowguidcol")?,
        })
    })
}
