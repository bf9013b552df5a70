//! Database and schema projection

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::model::{DatabaseInfo, EntityKind, NaturalKey, RecoveryModel, SchemaInfo};
use crate::source::RawRow;

use super::{project_rows, unmapped};

pub fn project_databases(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<DatabaseInfo>, SourceError> {
    project_rows(rows, EntityKind::Database, &["database_id"], |row| {
        let database_id = row.int("database_id")?;
        let recovery_model = match row.opt_int("recovery_model")? {
            None => None,
            Some(code) => Some(RecoveryModel::from_code(code).unwrap_or_else(|| {
                unmapped(
                    warnings,
                    EntityKind::Database,
                    "recovery_model",
                    code,
                    NaturalKey::ids(&[database_id]),
                );
                RecoveryModel::Other
            })),
        };

        Ok(DatabaseInfo {
            database_id,
            name: row.text("name")?,
            collation: row.opt_text("collation_name")?,
            compatibility_level: row.opt_int("compatibility_level")?,
            recovery_model,
            owner: row.opt_text("owner_name")?,
            created_at: row.timestamp("create_date")?,
            last_backup_at: row.timestamp("last_backup_date")?,
            default_file_group: row.opt_text("default_file_group")?,
            is_primary: row.flag("is_primary")?,
        })
    })
}

pub fn project_schemas(rows: &[RawRow]) -> Result<Vec<SchemaInfo>, SourceError> {
    project_rows(rows, EntityKind::Schema, &["database_id", "schema_id"], |row| {
        Ok(SchemaInfo {
            database_id: row.int("database_id")?,
            schema_id: row.int("schema_id")?,
            name: row.text("name")?,
            owner_name: row.opt_text("owner_name")?,
        })
    })
}
