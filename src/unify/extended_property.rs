//! Extended property scope resolution
//!
//! `sys.extended_properties` reports every property through one `class`
//! discriminant plus a `major_id`/`minor_id` pair whose meaning depends on
//! the class. [`resolve_scope`] is the single place that interprets them.

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::model::{
    ColumnId, EntityKind, ExtendedProperty, LevelType, NaturalKey, ObjectId, SchemaId,
};
use crate::projection::{project_rows, unmapped};
use crate::source::RawRow;

const CLASS_DATABASE: i64 = 0;
const CLASS_OBJECT_OR_COLUMN: i64 = 1;
const CLASS_SCHEMA: i64 = 3;

/// Where an extended property is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyScope {
    Database,
    Schema(SchemaId),
    Object(ObjectId),
    Column(ObjectId, ColumnId),
    /// Scope kind that is not modelled; carries the raw class label
    Other(String),
}

impl PropertyScope {
    pub fn level_type(&self) -> LevelType {
        match self {
            PropertyScope::Database => LevelType::Database,
            PropertyScope::Schema(_) => LevelType::Schema,
            PropertyScope::Object(_) => LevelType::Object,
            PropertyScope::Column(_, _) => LevelType::Column,
            PropertyScope::Other(raw) => LevelType::Other(raw.clone()),
        }
    }

    /// (schema_id, object_id, column_id) for this scope
    pub fn scope_ids(&self) -> (Option<SchemaId>, Option<ObjectId>, Option<ColumnId>) {
        match self {
            PropertyScope::Database | PropertyScope::Other(_) => (None, None, None),
            PropertyScope::Schema(schema_id) => (Some(*schema_id), None, None),
            PropertyScope::Object(object_id) => (None, Some(*object_id), None),
            PropertyScope::Column(object_id, column_id) => {
                (None, Some(*object_id), Some(*column_id))
            }
        }
    }
}

/// Dispatch on the class discriminant.
///
/// Class 1 is split into OBJECT and COLUMN by whether the minor id is zero.
/// Unknown classes keep `class_desc` (or the numeric class when that is
/// absent) as their level label.
pub fn resolve_scope(
    class: i64,
    class_desc: Option<&str>,
    major_id: i64,
    minor_id: i64,
) -> PropertyScope {
    match class {
        CLASS_DATABASE => PropertyScope::Database,
        CLASS_SCHEMA => PropertyScope::Schema(major_id),
        CLASS_OBJECT_OR_COLUMN if minor_id == 0 => PropertyScope::Object(major_id),
        CLASS_OBJECT_OR_COLUMN => PropertyScope::Column(major_id, minor_id),
        _ => PropertyScope::Other(
            class_desc
                .map(str::trim)
                .filter(|desc| !desc.is_empty())
                .map(str::to_ascii_uppercase)
                .unwrap_or_else(|| class.to_string()),
        ),
    }
}

/// Source columns that identify a property row
const ROW_KEY: &[&str] = &["class", "major_id", "minor_id", "name"];

pub fn project_extended_properties(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<ExtendedProperty>, SourceError> {
    project_rows(rows, EntityKind::ExtendedProperty, ROW_KEY, |row| {
        let class = row.int("class")?;
        let class_desc = row.opt_text("class_desc")?;
        let scope = resolve_scope(
            class,
            class_desc.as_deref(),
            row.opt_int("major_id")?.unwrap_or(0),
            row.opt_int("minor_id")?.unwrap_or(0),
        );
        let (schema_id, object_id, column_id) = scope.scope_ids();

        let property = ExtendedProperty {
            database_id: row.int("database_id")?,
            schema_id,
            object_id,
            column_id,
            property_name: row.text("name")?,
            level_type: scope.level_type(),
            property_value: row.opt_text("value")?,
        };

        if let PropertyScope::Other(_) = scope {
            unmapped(
                warnings,
                EntityKind::ExtendedProperty,
                "class",
                class,
                property.natural_key(),
            );
        }
        Ok(property)
    })
}
