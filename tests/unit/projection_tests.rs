//! Unit tests for entity projection
//!
//! These tests drive the public projection functions with raw catalog rows
//! and check the canonical records they produce.

use pretty_assertions::assert_eq;

use rust_dbdox::diagnostics::UnmappedCode;
use rust_dbdox::model::{IndexType, ObjectType, ParameterMode, RecoveryModel};
use rust_dbdox::projection;
use rust_dbdox::source::{QueryCatalog, QueryKind, RawRow};
use rust_dbdox::SourceError;

use crate::common::*;

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_projection_is_idempotent() {
    let project_all = || {
        let mut warnings: Vec<UnmappedCode> = Vec::new();
        let objects = projection::project_objects(&object_rows(), &mut warnings).unwrap();
        let columns = projection::project_columns(&column_rows()).unwrap();
        let indexes = projection::project_indexes(&index_rows(), &mut warnings).unwrap();
        let params = projection::project_routine_parameters(&routine_parameter_rows()).unwrap();
        serde_json::to_string(&(objects, columns, indexes, params.parameters)).unwrap()
    };

    let first = project_all();
    let second = project_all();
    assert_eq!(first, second);
}

#[test]
fn test_reprojecting_serialized_rows_gives_same_output() {
    let rows = column_rows();
    let json = serde_json::to_string(&rows).unwrap();
    let reread: Vec<RawRow> = serde_json::from_str(&json).unwrap();

    assert_eq!(
        projection::project_columns(&rows).unwrap(),
        projection::project_columns(&reread).unwrap()
    );
}

// ============================================================================
// Objects, tables, columns
// ============================================================================

#[test]
fn test_unrecognized_object_type_is_kept_as_other() {
    let mut rows = object_rows();
    rows.push(object_row(44, SALES, "mystery", "ZZ"));
    let mut warnings = Vec::new();

    let objects = projection::project_objects(&rows, &mut warnings).unwrap();

    let mystery = objects.iter().find(|o| o.object_id == 44).unwrap();
    assert_eq!(mystery.object_type, ObjectType::Other);
    assert_eq!(mystery.type_code, "ZZ");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, "ZZ");
    assert_eq!(warnings[0].natural_key.as_str(), "(44)");
}

#[test]
fn test_known_undocumented_object_types_do_not_warn() {
    let rows = vec![
        object_row(1, DBO, "PK_X", "PK"),
        object_row(2, DBO, "DF_X", "D"),
        object_row(3, DBO, "queue_messages", "IT"),
    ];
    let mut warnings = Vec::new();

    let objects = projection::project_objects(&rows, &mut warnings).unwrap();
    assert!(objects.iter().all(|o| o.object_type == ObjectType::Other));
    assert!(warnings.is_empty());
}

#[test]
fn test_object_type_mapping() {
    let mut warnings = Vec::new();
    let objects = projection::project_objects(&object_rows(), &mut warnings).unwrap();
    let types: Vec<ObjectType> = objects.iter().map(|o| o.object_type).collect();

    assert_eq!(
        types,
        vec![
            ObjectType::Table,
            ObjectType::Table,
            ObjectType::View,
            ObjectType::Procedure,
            ObjectType::Procedure,
            ObjectType::Function,
            ObjectType::Function,
        ]
    );
    assert!(objects.iter().all(|o| o.is_enabled));
    assert!(objects[0].created_at.is_some());
}

#[test]
fn test_identity_fields_only_on_identity_columns() {
    let columns = projection::project_columns(&column_rows()).unwrap();

    let id = &columns[0];
    assert!(id.is_identity);
    assert_eq!(id.identity_seed, Some(1));
    assert_eq!(id.identity_increment, Some(1));

    let name = &columns[1];
    assert!(!name.is_identity);
    assert_eq!(name.identity_seed, None);
}

#[test]
fn test_table_projection_defaults() {
    let tables = projection::project_tables(&table_rows()).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].row_count, Some(42));
    assert_eq!(tables[0].history_table_id, None);
    assert_eq!(tables[0].table_type, None);
}

// ============================================================================
// Databases
// ============================================================================

#[test]
fn test_database_projection() {
    let mut warnings = Vec::new();
    let databases = projection::project_databases(&database_rows(), &mut warnings).unwrap();

    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].recovery_model, Some(RecoveryModel::Full));
    assert!(databases[0].is_primary);
    assert_eq!(databases[0].last_backup_at, None);
    assert!(warnings.is_empty());
}

// ============================================================================
// Indexes
// ============================================================================

#[test]
fn test_heap_is_not_an_index() {
    let mut rows = index_rows();
    rows.push(index_row(CUSTOMER_VIEW, 0, "", 0).with("name", None::<String>));
    let mut warnings = Vec::new();

    let indexes = projection::project_indexes(&rows, &mut warnings).unwrap();
    assert_eq!(indexes.len(), 4);
    assert!(indexes.iter().all(|i| i.index_id != 0));
}

#[test]
fn test_index_flags_follow_type() {
    let mut warnings = Vec::new();
    let indexes = projection::project_indexes(&index_rows(), &mut warnings).unwrap();

    let pk = &indexes[0];
    assert_eq!(pk.index_type, IndexType::Clustered);
    assert!(pk.is_clustered);
    assert!(!pk.is_column_store);
    assert_eq!(pk.fill_factor, None);

    let ix = &indexes[3];
    assert_eq!(ix.index_type, IndexType::Nonclustered);
    assert_eq!(ix.fill_factor, Some(90));
}

#[test]
fn test_index_columns_split_key_and_included() {
    let (keys, included) = projection::project_index_columns(&index_column_rows()).unwrap();
    assert_eq!(keys.len(), 4);
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].column_id, 3);
}

// ============================================================================
// Routines
// ============================================================================

#[test]
fn test_return_value_slot_is_not_a_parameter() {
    let projected = projection::project_routine_parameters(&routine_parameter_rows()).unwrap();

    assert_eq!(projected.parameters.len(), 3);
    assert!(projected.parameters.iter().all(|p| p.ordinal_position > 0));
    assert_eq!(
        projected.return_types.get(&TOTAL_FN).map(String::as_str),
        Some("decimal(18,2)")
    );

    let top = &projected.parameters[0];
    assert_eq!(top.parameter_mode, ParameterMode::In);
    assert_eq!(top.default_value.as_deref(), Some("100"));
}

// ============================================================================
// Required columns
// ============================================================================

#[test]
fn test_missing_required_column_fails_fast() {
    let catalog = QueryCatalog::builtin();
    let query = catalog.get(QueryKind::Columns);
    let mut rows = column_rows();
    rows.push(RawRow::new().with("table_id", CUSTOMER).with("column_id", 9i64));

    let err = projection::check_required_columns(query, &rows).unwrap_err();
    assert_eq!(
        err,
        SourceError::MissingColumn {
            query: "columns".to_string(),
            column: "name".to_string(),
        }
    );
}

#[test]
fn test_extra_columns_are_ignored() {
    let catalog = QueryCatalog::builtin();
    let query = catalog.get(QueryKind::Views);
    let rows: Vec<RawRow> = view_rows()
        .into_iter()
        .map(|r| r.with("uses_ansi_nulls", true))
        .collect();

    assert!(projection::check_required_columns(query, &rows).is_ok());
    assert_eq!(projection::project_views(&rows).unwrap().len(), 1);
}
