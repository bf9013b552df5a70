//! Canonical catalog entity types
//!
//! All identifiers are engine-assigned integers scoped to one catalog snapshot.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{
    ConstraintType, FunctionType, IndexType, LevelType, ObjectType, ParameterMode,
    RecoveryModel, ReferentialAction,
};

pub type DatabaseId = i64;
pub type SchemaId = i64;
pub type ObjectId = i64;
pub type ColumnId = i64;
pub type ConstraintId = i64;
pub type IndexId = i64;

/// Canonical entity kinds of the documentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Database,
    Schema,
    Object,
    Table,
    Column,
    Constraint,
    ConstraintColumn,
    Index,
    IndexColumn,
    IndexIncludedColumn,
    ForeignKey,
    ForeignKeyColumn,
    View,
    ViewColumn,
    Procedure,
    Function,
    RoutineParameter,
    RoutineResultColumn,
    ExtendedProperty,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Database => "database",
            EntityKind::Schema => "schema",
            EntityKind::Object => "object",
            EntityKind::Table => "table",
            EntityKind::Column => "column",
            EntityKind::Constraint => "constraint",
            EntityKind::ConstraintColumn => "constraint_column",
            EntityKind::Index => "index",
            EntityKind::IndexColumn => "index_column",
            EntityKind::IndexIncludedColumn => "index_included_column",
            EntityKind::ForeignKey => "foreign_key",
            EntityKind::ForeignKeyColumn => "foreign_key_column",
            EntityKind::View => "view",
            EntityKind::ViewColumn => "view_column",
            EntityKind::Procedure => "procedure",
            EntityKind::Function => "function",
            EntityKind::RoutineParameter => "routine_parameter",
            EntityKind::RoutineResultColumn => "routine_result_column",
            EntityKind::ExtendedProperty => "extended_property",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Printable natural key of a row, e.g. `(900, 3)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn ids(ids: &[i64]) -> Self {
        Self::parts(ids.iter().map(|i| i.to_string()))
    }

    /// Parenthesized, comma separated key parts
    pub fn parts(parts: impl IntoIterator<Item = String>) -> Self {
        let parts: Vec<String> = parts.into_iter().collect();
        NaturalKey(format!("({})", parts.join(", ")))
    }

    /// Scope label, then ids, then a name; used for extended properties
    pub fn scoped(scope: &str, ids: &[Option<i64>], name: &str) -> Self {
        let mut parts = vec![scope.to_string()];
        parts.extend(
            ids.iter()
                .map(|i| i.map_or_else(|| "-".to_string(), |v| v.to_string())),
        );
        parts.push(format!("'{}'", name));
        NaturalKey(format!("({})", parts.join(", ")))
    }

    pub fn code(code: &str) -> Self {
        NaturalKey(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalogued database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub database_id: DatabaseId,
    pub name: String,
    pub collation: Option<String>,
    pub compatibility_level: Option<i64>,
    pub recovery_model: Option<RecoveryModel>,
    pub owner: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub last_backup_at: Option<NaiveDateTime>,
    pub default_file_group: Option<String>,
    /// The database the run executed against
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub database_id: DatabaseId,
    pub schema_id: SchemaId,
    pub name: String,
    pub owner_name: Option<String>,
}

/// Universal catalog entry; every table, view, routine etc. has exactly one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub database_id: DatabaseId,
    pub object_id: ObjectId,
    pub schema_id: SchemaId,
    pub name: String,
    pub object_type: ObjectType,
    /// The catalog type code the object type was derived from
    pub type_code: String,
    pub definition: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub modified_at: Option<NaiveDateTime>,
    pub is_system: bool,
    pub is_enabled: bool,
}

/// Table extension of [`ObjectInfo`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub object_id: ObjectId,
    /// Curated downstream (fact, dimension, ...); never derived here
    pub table_type: Option<String>,
    pub row_count: Option<i64>,
    pub is_system_versioned: bool,
    pub history_table_id: Option<ObjectId>,
    pub is_external: bool,
    pub file_group: Option<String>,
    pub is_partitioned: bool,
    pub partition_scheme: Option<String>,
    pub partition_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub table_id: ObjectId,
    pub column_id: ColumnId,
    pub name: String,
    pub ordinal_position: i64,
    pub data_type: String,
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub is_nullable: bool,
    pub default_definition: Option<String>,
    pub computed_definition: Option<String>,
    pub is_identity: bool,
    pub identity_seed: Option<i64>,
    pub identity_increment: Option<i64>,
    pub is_sparse: bool,
    pub is_hidden: bool,
    pub is_row_guid: bool,
}

/// One member of the unified constraint family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub constraint_id: ConstraintId,
    pub table_id: ObjectId,
    pub name: String,
    pub constraint_type: ConstraintType,
    pub definition: Option<String>,
    pub is_disabled: bool,
    /// Only CHECK and FOREIGN KEY constraints carry trust state
    pub is_not_trusted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintColumn {
    pub constraint_id: ConstraintId,
    pub column_id: ColumnId,
    pub ordinal_position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub table_id: ObjectId,
    pub index_id: IndexId,
    pub name: Option<String>,
    pub index_type: IndexType,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_filtered: bool,
    pub filter_definition: Option<String>,
    pub is_clustered: bool,
    pub is_column_store: bool,
    pub is_full_text: bool,
    pub file_group: Option<String>,
    pub fill_factor: Option<i64>,
    pub compression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub table_id: ObjectId,
    pub index_id: IndexId,
    pub column_id: ColumnId,
    pub key_ordinal: i64,
    pub is_descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexIncludedColumn {
    pub table_id: ObjectId,
    pub index_id: IndexId,
    pub column_id: ColumnId,
}

/// Foreign-key view of a FOREIGN_KEY [`ConstraintInfo`]; same id, same object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub foreign_key_id: ConstraintId,
    pub referenced_table_id: ObjectId,
    pub on_update_action: ReferentialAction,
    pub on_delete_action: ReferentialAction,
    pub is_disabled: bool,
    pub is_not_trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyColumn {
    pub foreign_key_id: ConstraintId,
    /// Column of the referencing table
    pub column_id: ColumnId,
    /// Column of the referenced table
    pub referenced_column_id: ColumnId,
    pub ordinal_position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub object_id: ObjectId,
    pub is_indexed: bool,
    pub is_schema_bound: bool,
    pub with_check_option: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewColumn {
    pub view_id: ObjectId,
    pub ordinal_position: i64,
    pub column_name: String,
    pub data_type: String,
    /// Lineage, filled by a later enrichment pass
    pub source_expression: Option<String>,
    pub source_column_id: Option<ColumnId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureInfo {
    pub object_id: ObjectId,
    pub is_encrypted: bool,
    pub execute_as: Option<String>,
    /// Whether the result-set probe succeeded for this procedure
    pub has_result_set: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub object_id: ObjectId,
    pub function_type: FunctionType,
    pub return_data_type: Option<String>,
    pub is_schema_bound: bool,
    pub is_deterministic: bool,
}

/// Parameter of a procedure or function; the return-value slot is never one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineParameter {
    pub routine_id: ObjectId,
    pub ordinal_position: i64,
    pub parameter_name: String,
    pub data_type: String,
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub parameter_mode: ParameterMode,
    pub has_default_value: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineResultColumn {
    pub routine_id: ObjectId,
    pub ordinal_position: i64,
    pub column_name: Option<String>,
    pub data_type: String,
    pub source_object_id: Option<ObjectId>,
}

/// Extended property; exactly the scope ids implied by `level_type` are set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProperty {
    pub database_id: DatabaseId,
    pub schema_id: Option<SchemaId>,
    pub object_id: Option<ObjectId>,
    pub column_id: Option<ColumnId>,
    pub property_name: String,
    pub level_type: LevelType,
    pub property_value: Option<String>,
}

impl ExtendedProperty {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::scoped(
            self.level_type.as_str(),
            &[
                Some(self.database_id),
                self.schema_id,
                self.object_id,
                self.column_id,
            ],
            &self.property_name,
        )
    }
}
