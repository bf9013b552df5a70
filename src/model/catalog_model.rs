//! The complete entity set produced by one extraction run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    ColumnInfo, ConstraintColumn, ConstraintInfo, DatabaseInfo, EntityKind, ExtendedProperty,
    ForeignKey, ForeignKeyColumn, FunctionInfo, IndexColumn, IndexIncludedColumn, IndexInfo,
    LevelType, ObjectId, ObjectInfo, ProcedureInfo, RoutineParameter, RoutineResultColumn,
    SchemaId, SchemaInfo, TableInfo, ViewColumn, ViewInfo,
};

/// Canonical entity sets, one vector per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub databases: Vec<DatabaseInfo>,
    pub schemas: Vec<SchemaInfo>,
    pub objects: Vec<ObjectInfo>,
    pub tables: Vec<TableInfo>,
    pub columns: Vec<ColumnInfo>,
    pub constraints: Vec<ConstraintInfo>,
    pub constraint_columns: Vec<ConstraintColumn>,
    pub indexes: Vec<IndexInfo>,
    pub index_columns: Vec<IndexColumn>,
    pub index_included_columns: Vec<IndexIncludedColumn>,
    pub foreign_keys: Vec<ForeignKey>,
    pub foreign_key_columns: Vec<ForeignKeyColumn>,
    pub views: Vec<ViewInfo>,
    pub view_columns: Vec<ViewColumn>,
    pub procedures: Vec<ProcedureInfo>,
    pub functions: Vec<FunctionInfo>,
    pub routine_parameters: Vec<RoutineParameter>,
    pub routine_result_columns: Vec<RoutineResultColumn>,
    pub extended_properties: Vec<ExtendedProperty>,
}

impl CatalogModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Database => self.databases.len(),
            EntityKind::Schema => self.schemas.len(),
            EntityKind::Object => self.objects.len(),
            EntityKind::Table => self.tables.len(),
            EntityKind::Column => self.columns.len(),
            EntityKind::Constraint => self.constraints.len(),
            EntityKind::ConstraintColumn => self.constraint_columns.len(),
            EntityKind::Index => self.indexes.len(),
            EntityKind::IndexColumn => self.index_columns.len(),
            EntityKind::IndexIncludedColumn => self.index_included_columns.len(),
            EntityKind::ForeignKey => self.foreign_keys.len(),
            EntityKind::ForeignKeyColumn => self.foreign_key_columns.len(),
            EntityKind::View => self.views.len(),
            EntityKind::ViewColumn => self.view_columns.len(),
            EntityKind::Procedure => self.procedures.len(),
            EntityKind::Function => self.functions.len(),
            EntityKind::RoutineParameter => self.routine_parameters.len(),
            EntityKind::RoutineResultColumn => self.routine_result_columns.len(),
            EntityKind::ExtendedProperty => self.extended_properties.len(),
        }
    }

    /// Row count for every entity kind
    pub fn row_counts(&self) -> BTreeMap<EntityKind, usize> {
        ALL_KINDS
            .iter()
            .map(|kind| (*kind, self.row_count(*kind)))
            .collect()
    }

    pub fn primary_database(&self) -> Option<&DatabaseInfo> {
        self.databases.iter().find(|d| d.is_primary)
    }

    pub fn object(&self, object_id: ObjectId) -> Option<&ObjectInfo> {
        self.objects.iter().find(|o| o.object_id == object_id)
    }

    pub fn columns_of(&self, table_id: ObjectId) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(move |c| c.table_id == table_id)
    }

    pub fn constraint(&self, constraint_id: i64) -> Option<&ConstraintInfo> {
        self.constraints
            .iter()
            .find(|c| c.constraint_id == constraint_id)
    }

    pub fn constraint_columns_of(
        &self,
        constraint_id: i64,
    ) -> impl Iterator<Item = &ConstraintColumn> {
        self.constraint_columns
            .iter()
            .filter(move |c| c.constraint_id == constraint_id)
    }

    pub fn foreign_key(&self, foreign_key_id: i64) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.foreign_key_id == foreign_key_id)
    }

    pub fn result_columns_of(
        &self,
        routine_id: ObjectId,
    ) -> impl Iterator<Item = &RoutineResultColumn> {
        self.routine_result_columns
            .iter()
            .filter(move |c| c.routine_id == routine_id)
    }

    pub fn procedure(&self, object_id: ObjectId) -> Option<&ProcedureInfo> {
        self.procedures.iter().find(|p| p.object_id == object_id)
    }

    /// Owning schema of an OBJECT or COLUMN scoped property, resolved through
    /// the object it hangs off; the property row itself keeps schema_id NULL
    pub fn property_schema_id(&self, property: &ExtendedProperty) -> Option<SchemaId> {
        match property.level_type {
            LevelType::Schema => property.schema_id,
            LevelType::Object | LevelType::Column => property
                .object_id
                .and_then(|id| self.object(id))
                .map(|o| o.schema_id),
            _ => None,
        }
    }
}

/// Every entity kind, in model order
pub const ALL_KINDS: [EntityKind; 19] = [
    EntityKind::Database,
    EntityKind::Schema,
    EntityKind::Object,
    EntityKind::Table,
    EntityKind::Column,
    EntityKind::Constraint,
    EntityKind::ConstraintColumn,
    EntityKind::Index,
    EntityKind::IndexColumn,
    EntityKind::IndexIncludedColumn,
    EntityKind::ForeignKey,
    EntityKind::ForeignKeyColumn,
    EntityKind::View,
    EntityKind::ViewColumn,
    EntityKind::Procedure,
    EntityKind::Function,
    EntityKind::RoutineParameter,
    EntityKind::RoutineResultColumn,
    EntityKind::ExtendedProperty,
];
