//! Identifier integrity resolver
//!
//! Runs after every entity set has been projected and unified. Each
//! cross-entity reference is looked up against the referenced set and each
//! declared key is checked for uniqueness. Violations become
//! [`IntegrityWarning`]s; rows are never dropped here.
//!
//! Checks that point into (or out of) an entity kind whose extraction step
//! failed are skipped, since that set is known to be incomplete.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{IntegrityRule, IntegrityWarning};
use crate::error::ExtractError;
use crate::model::{
    CatalogModel, ColumnId, ConstraintId, ConstraintInfo, ConstraintType, DatabaseId, EntityKind,
    IndexId, LevelType, NaturalKey, ObjectId, ObjectInfo, ObjectType, SchemaId,
};

/// How integrity violations affect the run outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityMode {
    /// Record warnings and keep every row
    #[default]
    Lenient,
    /// Fail the run on the first violation
    Strict,
}

/// Apply the integrity mode to the warnings a resolver pass produced
pub fn enforce(mode: IntegrityMode, warnings: &[IntegrityWarning]) -> Result<(), ExtractError> {
    match (mode, warnings.first()) {
        (IntegrityMode::Strict, Some(first)) => Err(ExtractError::IntegrityViolation {
            count: warnings.len(),
            first: first.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Validate every reference and declared key in `model`.
///
/// `incomplete` lists entity kinds whose source step failed.
pub fn resolve(model: &CatalogModel, incomplete: &BTreeSet<EntityKind>) -> Vec<IntegrityWarning> {
    let mut resolver = Resolver::new(model, incomplete);
    resolver.check_keys();
    resolver.check_catalog_scope();
    resolver.check_table_family();
    resolver.check_indexes();
    resolver.check_foreign_keys();
    resolver.check_views();
    resolver.check_routines();
    resolver.check_extended_properties();
    resolver.warnings
}

struct Resolver<'a> {
    model: &'a CatalogModel,
    incomplete: &'a BTreeSet<EntityKind>,
    databases: HashSet<DatabaseId>,
    schemas: HashSet<(DatabaseId, SchemaId)>,
    objects: HashMap<ObjectId, &'a ObjectInfo>,
    columns: HashSet<(ObjectId, ColumnId)>,
    constraints: HashMap<ConstraintId, &'a ConstraintInfo>,
    indexes: HashSet<(ObjectId, IndexId)>,
    foreign_keys: HashMap<ConstraintId, ObjectId>,
    views: HashSet<ObjectId>,
    routines: HashSet<ObjectId>,
    warnings: Vec<IntegrityWarning>,
}

impl<'a> Resolver<'a> {
    fn new(model: &'a CatalogModel, incomplete: &'a BTreeSet<EntityKind>) -> Self {
        Self {
            model,
            incomplete,
            databases: model.databases.iter().map(|d| d.database_id).collect(),
            schemas: model
                .schemas
                .iter()
                .map(|s| (s.database_id, s.schema_id))
                .collect(),
            objects: model.objects.iter().map(|o| (o.object_id, o)).collect(),
            columns: model
                .columns
                .iter()
                .map(|c| (c.table_id, c.column_id))
                .collect(),
            constraints: model
                .constraints
                .iter()
                .map(|c| (c.constraint_id, c))
                .collect(),
            indexes: model
                .indexes
                .iter()
                .map(|i| (i.table_id, i.index_id))
                .collect(),
            foreign_keys: model
                .foreign_keys
                .iter()
                .map(|fk| (fk.foreign_key_id, fk.referenced_table_id))
                .collect(),
            views: model.views.iter().map(|v| v.object_id).collect(),
            routines: model
                .procedures
                .iter()
                .map(|p| p.object_id)
                .chain(model.functions.iter().map(|f| f.object_id))
                .collect(),
            warnings: Vec::new(),
        }
    }

    fn checked(&self, entity: EntityKind, target: EntityKind) -> bool {
        !self.incomplete.contains(&entity) && !self.incomplete.contains(&target)
    }

    fn warn(
        &mut self,
        entity: EntityKind,
        natural_key: NaturalKey,
        rule: IntegrityRule,
        target: EntityKind,
        detail: String,
    ) {
        self.warnings.push(IntegrityWarning {
            entity,
            natural_key,
            rule,
            target,
            detail,
        });
    }

    fn require(
        &mut self,
        found: bool,
        entity: EntityKind,
        natural_key: impl FnOnce() -> NaturalKey,
        target: EntityKind,
        detail: impl FnOnce() -> String,
    ) {
        if !found && self.checked(entity, target) {
            self.warn(
                entity,
                natural_key(),
                IntegrityRule::DanglingReference,
                target,
                detail(),
            );
        }
    }

    /// The object must exist and be one of `allowed`
    fn require_object(
        &mut self,
        entity: EntityKind,
        natural_key: NaturalKey,
        object_id: ObjectId,
        allowed: &[ObjectType],
    ) {
        if !self.checked(entity, EntityKind::Object) {
            return;
        }
        match self.objects.get(&object_id).copied() {
            None => self.warn(
                entity,
                natural_key,
                IntegrityRule::DanglingReference,
                EntityKind::Object,
                format!("object {} does not exist", object_id),
            ),
            Some(object) if !allowed.contains(&object.object_type) => {
                let detail = format!(
                    "object {} is {}, expected {}",
                    object_id,
                    object.object_type.as_str(),
                    allowed
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(" or ")
                );
                self.warn(
                    entity,
                    natural_key,
                    IntegrityRule::WrongTargetType,
                    EntityKind::Object,
                    detail,
                );
            }
            Some(_) => {}
        }
    }

    fn is_table(&self, object_id: ObjectId) -> bool {
        self.objects
            .get(&object_id)
            .is_some_and(|o| o.object_type == ObjectType::Table)
    }

    fn check_keys(&mut self) {
        let model = self.model;
        let mut found = Vec::new();

        found.extend(duplicates(EntityKind::Database, &model.databases, |d| {
            NaturalKey::ids(&[d.database_id])
        }));
        found.extend(duplicates(EntityKind::Schema, &model.schemas, |s| {
            NaturalKey::ids(&[s.database_id, s.schema_id])
        }));
        found.extend(duplicates(EntityKind::Object, &model.objects, |o| {
            NaturalKey::ids(&[o.database_id, o.object_id])
        }));
        found.extend(duplicates(EntityKind::Table, &model.tables, |t| {
            NaturalKey::ids(&[t.object_id])
        }));
        found.extend(duplicates(EntityKind::Column, &model.columns, |c| {
            NaturalKey::ids(&[c.table_id, c.column_id])
        }));
        found.extend(duplicates(
            EntityKind::ConstraintColumn,
            &model.constraint_columns,
            |c| NaturalKey::ids(&[c.constraint_id, c.column_id]),
        ));
        found.extend(duplicates(EntityKind::Index, &model.indexes, |i| {
            NaturalKey::ids(&[i.table_id, i.index_id])
        }));
        found.extend(duplicates(EntityKind::IndexColumn, &model.index_columns, |c| {
            NaturalKey::ids(&[c.table_id, c.index_id, c.column_id])
        }));
        found.extend(duplicates(
            EntityKind::IndexIncludedColumn,
            &model.index_included_columns,
            |c| NaturalKey::ids(&[c.table_id, c.index_id, c.column_id]),
        ));
        found.extend(duplicates(
            EntityKind::ForeignKeyColumn,
            &model.foreign_key_columns,
            |c| NaturalKey::ids(&[c.foreign_key_id, c.column_id]),
        ));
        found.extend(duplicates(EntityKind::View, &model.views, |v| {
            NaturalKey::ids(&[v.object_id])
        }));
        found.extend(duplicates(EntityKind::ViewColumn, &model.view_columns, |c| {
            NaturalKey::ids(&[c.view_id, c.ordinal_position])
        }));
        found.extend(duplicates(EntityKind::Procedure, &model.procedures, |p| {
            NaturalKey::ids(&[p.object_id])
        }));
        found.extend(duplicates(EntityKind::Function, &model.functions, |f| {
            NaturalKey::ids(&[f.object_id])
        }));
        found.extend(duplicates(
            EntityKind::RoutineParameter,
            &model.routine_parameters,
            |p| NaturalKey::ids(&[p.routine_id, p.ordinal_position]),
        ));
        found.extend(duplicates(
            EntityKind::RoutineResultColumn,
            &model.routine_result_columns,
            |c| NaturalKey::ids(&[c.routine_id, c.ordinal_position]),
        ));
        // Passthrough scopes carry no scope ids, so their keys cannot be unique
        let scoped_properties: Vec<_> = model
            .extended_properties
            .iter()
            .filter(|p| !matches!(p.level_type, LevelType::Other(_)))
            .collect();
        found.extend(duplicates(
            EntityKind::ExtendedProperty,
            &scoped_properties,
            |p| p.natural_key(),
        ));

        // Constraint and foreign key ids are made unique by the arena
        self.warnings.extend(found);
    }

    fn check_catalog_scope(&mut self) {
        let model = self.model;

        for schema in &model.schemas {
            let found = self.databases.contains(&schema.database_id);
            self.require(
                found,
                EntityKind::Schema,
                || NaturalKey::ids(&[schema.database_id, schema.schema_id]),
                EntityKind::Database,
                || format!("database {} does not exist", schema.database_id),
            );
        }

        for object in &model.objects {
            let found = self.schemas.contains(&(object.database_id, object.schema_id));
            self.require(
                found,
                EntityKind::Object,
                || NaturalKey::ids(&[object.database_id, object.object_id]),
                EntityKind::Schema,
                || format!("schema {} does not exist", object.schema_id),
            );
        }
    }

    fn check_table_family(&mut self) {
        let model = self.model;

        for table in &model.tables {
            self.require_object(
                EntityKind::Table,
                NaturalKey::ids(&[table.object_id]),
                table.object_id,
                &[ObjectType::Table],
            );
            if let Some(history_id) = table.history_table_id {
                self.require_object(
                    EntityKind::Table,
                    NaturalKey::ids(&[table.object_id]),
                    history_id,
                    &[ObjectType::Table],
                );
            }
        }

        for column in &model.columns {
            self.require_object(
                EntityKind::Column,
                NaturalKey::ids(&[column.table_id, column.column_id]),
                column.table_id,
                &[ObjectType::Table],
            );
        }

        for constraint in &model.constraints {
            self.require_object(
                EntityKind::Constraint,
                NaturalKey::ids(&[constraint.constraint_id]),
                constraint.table_id,
                &[ObjectType::Table],
            );
        }

        for member in &model.constraint_columns {
            let key = || NaturalKey::ids(&[member.constraint_id, member.column_id]);
            match self.constraints.get(&member.constraint_id).map(|c| c.table_id) {
                None => self.require(
                    false,
                    EntityKind::ConstraintColumn,
                    key,
                    EntityKind::Constraint,
                    || format!("constraint {} does not exist", member.constraint_id),
                ),
                Some(table_id) => {
                    let found = self.columns.contains(&(table_id, member.column_id));
                    self.require(
                        found,
                        EntityKind::ConstraintColumn,
                        key,
                        EntityKind::Column,
                        || {
                            format!(
                                "column {} is not a column of table {}",
                                member.column_id, table_id
                            )
                        },
                    );
                }
            }
        }
    }

    fn check_indexes(&mut self) {
        let model = self.model;

        for index in &model.indexes {
            self.require_object(
                EntityKind::Index,
                NaturalKey::ids(&[index.table_id, index.index_id]),
                index.table_id,
                &[ObjectType::Table, ObjectType::View],
            );
        }

        let members = model
            .index_columns
            .iter()
            .map(|c| (EntityKind::IndexColumn, c.table_id, c.index_id, c.column_id))
            .chain(model.index_included_columns.iter().map(|c| {
                (EntityKind::IndexIncludedColumn, c.table_id, c.index_id, c.column_id)
            }));
        for (entity, table_id, index_id, column_id) in members {
            let key = || NaturalKey::ids(&[table_id, index_id, column_id]);
            let found = self.indexes.contains(&(table_id, index_id));
            self.require(found, entity, key, EntityKind::Index, || {
                format!("index {} on {} does not exist", index_id, table_id)
            });
            // View columns are keyed by position, not column id
            if self.is_table(table_id) {
                let found = self.columns.contains(&(table_id, column_id));
                self.require(found, entity, key, EntityKind::Column, || {
                    format!("column {} is not a column of table {}", column_id, table_id)
                });
            }
        }
    }

    fn check_foreign_keys(&mut self) {
        let model = self.model;

        for fk in &model.foreign_keys {
            let key = NaturalKey::ids(&[fk.foreign_key_id]);
            match self.constraints.get(&fk.foreign_key_id).copied() {
                None => self.require(
                    false,
                    EntityKind::ForeignKey,
                    || key.clone(),
                    EntityKind::Constraint,
                    || format!("constraint {} does not exist", fk.foreign_key_id),
                ),
                Some(c) if c.constraint_type != ConstraintType::ForeignKey => {
                    let detail = format!(
                        "constraint {} is {:?}, expected ForeignKey",
                        fk.foreign_key_id, c.constraint_type
                    );
                    if self.checked(EntityKind::ForeignKey, EntityKind::Constraint) {
                        self.warn(
                            EntityKind::ForeignKey,
                            key.clone(),
                            IntegrityRule::WrongTargetType,
                            EntityKind::Constraint,
                            detail,
                        );
                    }
                }
                Some(_) => {}
            }
            self.require_object(
                EntityKind::ForeignKey,
                key,
                fk.referenced_table_id,
                &[ObjectType::Table],
            );
        }

        for member in &model.foreign_key_columns {
            let key = || NaturalKey::ids(&[member.foreign_key_id, member.column_id]);
            let Some(&referenced_table_id) = self.foreign_keys.get(&member.foreign_key_id) else {
                self.require(
                    false,
                    EntityKind::ForeignKeyColumn,
                    key,
                    EntityKind::ForeignKey,
                    || format!("foreign key {} does not exist", member.foreign_key_id),
                );
                continue;
            };

            let parent_id = self
                .constraints
                .get(&member.foreign_key_id)
                .map(|c| c.table_id);
            if let Some(parent_id) = parent_id {
                let found = self.columns.contains(&(parent_id, member.column_id));
                self.require(found, EntityKind::ForeignKeyColumn, key, EntityKind::Column, || {
                    format!("column {} is not a column of table {}", member.column_id, parent_id)
                });
            }

            let found = self
                .columns
                .contains(&(referenced_table_id, member.referenced_column_id));
            self.require(found, EntityKind::ForeignKeyColumn, key, EntityKind::Column, || {
                format!(
                    "referenced column {} is not a column of table {}",
                    member.referenced_column_id, referenced_table_id
                )
            });
        }
    }

    fn check_views(&mut self) {
        let model = self.model;

        for view in &model.views {
            self.require_object(
                EntityKind::View,
                NaturalKey::ids(&[view.object_id]),
                view.object_id,
                &[ObjectType::View],
            );
        }

        for column in &model.view_columns {
            let found = self.views.contains(&column.view_id);
            self.require(
                found,
                EntityKind::ViewColumn,
                || NaturalKey::ids(&[column.view_id, column.ordinal_position]),
                EntityKind::View,
                || format!("view {} does not exist", column.view_id),
            );
        }
    }

    fn check_routines(&mut self) {
        let model = self.model;

        for procedure in &model.procedures {
            self.require_object(
                EntityKind::Procedure,
                NaturalKey::ids(&[procedure.object_id]),
                procedure.object_id,
                &[ObjectType::Procedure],
            );
        }
        for function in &model.functions {
            self.require_object(
                EntityKind::Function,
                NaturalKey::ids(&[function.object_id]),
                function.object_id,
                &[ObjectType::Function],
            );
        }

        // Both routine sets must be complete to call a routine missing
        if self.incomplete.contains(&EntityKind::Procedure)
            || self.incomplete.contains(&EntityKind::Function)
        {
            return;
        }

        let routine_rows = model
            .routine_parameters
            .iter()
            .map(|p| (EntityKind::RoutineParameter, p.routine_id, p.ordinal_position))
            .chain(model.routine_result_columns.iter().map(|c| {
                (EntityKind::RoutineResultColumn, c.routine_id, c.ordinal_position)
            }));
        for (entity, routine_id, ordinal) in routine_rows {
            let found = self.routines.contains(&routine_id);
            self.require(
                found,
                entity,
                || NaturalKey::ids(&[routine_id, ordinal]),
                EntityKind::Procedure,
                || format!("routine {} is neither a procedure nor a function", routine_id),
            );
        }
    }

    fn check_extended_properties(&mut self) {
        let model = self.model;

        for property in &model.extended_properties {
            let key = || property.natural_key();
            match &property.level_type {
                LevelType::Database => {
                    let found = self.databases.contains(&property.database_id);
                    self.require(
                        found,
                        EntityKind::ExtendedProperty,
                        key,
                        EntityKind::Database,
                        || format!("database {} does not exist", property.database_id),
                    );
                }
                LevelType::Schema => {
                    let schema_id = property.schema_id.unwrap_or_default();
                    let found = self.schemas.contains(&(property.database_id, schema_id));
                    self.require(
                        found,
                        EntityKind::ExtendedProperty,
                        key,
                        EntityKind::Schema,
                        || format!("schema {} does not exist", schema_id),
                    );
                }
                LevelType::Object | LevelType::Column => {
                    let object_id = property.object_id.unwrap_or_default();
                    let found = self.objects.contains_key(&object_id);
                    self.require(
                        found,
                        EntityKind::ExtendedProperty,
                        key,
                        EntityKind::Object,
                        || format!("object {} does not exist", object_id),
                    );
                    let on_table = self.is_table(object_id);
                    if let (Some(column_id), true) = (property.column_id, on_table) {
                        let found = self.columns.contains(&(object_id, column_id));
                        self.require(
                            found,
                            EntityKind::ExtendedProperty,
                            key,
                            EntityKind::Column,
                            || {
                                format!(
                                    "column {} is not a column of table {}",
                                    column_id, object_id
                                )
                            },
                        );
                    }
                }
                LevelType::Other(_) => {}
            }
        }
    }
}

/// One DuplicateKey warning per row whose key was already seen
fn duplicates<T>(
    entity: EntityKind,
    rows: &[T],
    key: impl Fn(&T) -> NaturalKey,
) -> Vec<IntegrityWarning> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .map(key)
        .filter(|natural_key| !seen.insert(natural_key.clone()))
        .map(|natural_key| IntegrityWarning {
            entity,
            detail: format!("{} key {} appears more than once", entity, natural_key),
            natural_key,
            rule: IntegrityRule::DuplicateKey,
            target: entity,
        })
        .collect()
}
