//! Unit tests for the extraction run coordinator
//!
//! Whole runs over the sample snapshot, with one fault injected per test.

use std::time::Duration;

use pretty_assertions::assert_eq;

use rust_dbdox::diagnostics::IntegrityRule;
use rust_dbdox::model::{EntityKind, ObjectType};
use rust_dbdox::run::{RunStatus, StepStatus};
use rust_dbdox::source::{CatalogSnapshot, QueryKind, RawRow, RawValue, SnapshotSource};
use rust_dbdox::{
    run_extraction, CancellationToken, ExtractError, IntegrityMode, NoopObserver, QueryCatalog,
    RunOptions,
};

use crate::common::*;

fn strict() -> RunOptions {
    RunOptions {
        integrity_mode: IntegrityMode::Strict,
        ..sequential_options()
    }
}

// ============================================================================
// Clean run
// ============================================================================

#[test]
fn test_sample_catalog_extracts_cleanly() {
    let run = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();

    assert!(run.diagnostics.is_clean(), "{:#?}", run.diagnostics);
    assert_eq!(run.audit.status, RunStatus::Success);
    assert_eq!(run.model.objects.len(), 7);
    assert_eq!(run.model.constraints.len(), 7);
    assert_eq!(run.model.constraint_columns.len(), 6);
    assert_eq!(run.model.foreign_keys.len(), 1);
    assert_eq!(run.model.routine_result_columns.len(), 5);
    assert_eq!(run.model.extended_properties.len(), 4);
    assert_eq!(run.diagnostics.row_counts[&EntityKind::Column], 7);
}

#[test]
fn test_strict_mode_accepts_clean_run() {
    let run = run_snapshot(sample_snapshot(), &strict()).unwrap();
    assert!(run.diagnostics.is_clean());
}

#[test]
fn test_function_return_type_comes_from_parameter_slot_zero() {
    let run = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();

    let total = run
        .model
        .functions
        .iter()
        .find(|f| f.object_id == TOTAL_FN)
        .unwrap();
    assert_eq!(total.return_data_type.as_deref(), Some("decimal(18,2)"));
    assert!(run
        .model
        .routine_parameters
        .iter()
        .all(|p| p.ordinal_position > 0));
}

#[test]
fn test_object_schema_resolves_through_object() {
    let run = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();
    let object_prop = run
        .model
        .extended_properties
        .iter()
        .find(|p| p.object_id == Some(CUSTOMER) && p.column_id.is_none())
        .unwrap();

    assert_eq!(object_prop.schema_id, None);
    assert_eq!(run.model.property_schema_id(object_prop), Some(SALES));
}

// ============================================================================
// Best-effort introspection
// ============================================================================

#[test]
fn test_failed_probe_for_77_does_not_affect_78() {
    let snapshot = sample_snapshot().with_probe_error(
        STAGING_PROC,
        "Could not determine metadata because statement uses a temp table.",
    );
    let run = run_snapshot(snapshot, &sequential_options()).unwrap();

    assert_eq!(run.model.result_columns_of(STAGING_PROC).count(), 0);
    assert_eq!(run.model.result_columns_of(GET_CUSTOMERS_PROC).count(), 2);
    assert!(!run.model.procedure(STAGING_PROC).unwrap().has_result_set);
    assert!(run.model.procedure(GET_CUSTOMERS_PROC).unwrap().has_result_set);

    assert_eq!(run.diagnostics.introspection_failures.len(), 1);
    assert_eq!(run.diagnostics.introspection_failures[0].routine_id, STAGING_PROC);
    assert!(run.diagnostics.step_failures.is_empty());
    assert_eq!(run.audit.status, RunStatus::Partial);
}

#[test]
fn test_probe_with_no_columns_still_has_result_set() {
    let snapshot = sample_snapshot().with_result_set(STAGING_PROC, vec![]);
    let run = run_snapshot(snapshot, &sequential_options()).unwrap();

    assert!(run.model.procedure(STAGING_PROC).unwrap().has_result_set);
    assert_eq!(run.model.result_columns_of(STAGING_PROC).count(), 0);
    assert!(run.diagnostics.is_clean());
}

// ============================================================================
// Unmapped codes
// ============================================================================

#[test]
fn test_unrecognized_object_type_zz() {
    let mut objects = object_rows();
    objects.push(object_row(44, SALES, "odd_thing", "ZZ"));
    let snapshot = sample_snapshot().with_rows(QueryKind::Objects, objects);

    let run = run_snapshot(snapshot, &sequential_options()).unwrap();

    let odd = run.model.object(44).unwrap();
    assert_eq!(odd.object_type, ObjectType::Other);
    assert_eq!(run.diagnostics.unmapped_codes.len(), 1);
    assert_eq!(run.diagnostics.unmapped_codes[0].code, "ZZ");
    assert!(run.diagnostics.integrity_warnings.is_empty());
}

// ============================================================================
// Integrity
// ============================================================================

fn snapshot_with_orphan_column() -> CatalogSnapshot {
    let mut columns = column_rows();
    columns.push(column_row(900, 3, "Ghost", "int"));
    sample_snapshot().with_rows(QueryKind::Columns, columns)
}

#[test]
fn test_orphan_column_is_retained_in_lenient_mode() {
    let run = run_snapshot(snapshot_with_orphan_column(), &sequential_options()).unwrap();

    assert_eq!(run.diagnostics.integrity_warnings.len(), 1);
    let warning = &run.diagnostics.integrity_warnings[0];
    assert_eq!(warning.entity, EntityKind::Column);
    assert_eq!(warning.natural_key.as_str(), "(900, 3)");
    assert_eq!(warning.rule, IntegrityRule::DanglingReference);
    assert!(run.model.columns.iter().any(|c| c.table_id == 900));
    assert_eq!(run.audit.status, RunStatus::Partial);
}

#[test]
fn test_orphan_column_fails_strict_mode() {
    let err = run_snapshot(snapshot_with_orphan_column(), &strict()).unwrap_err();

    match err {
        ExtractError::IntegrityViolation { count, first } => {
            assert_eq!(count, 1);
            assert!(first.contains("(900, 3)"), "{}", first);
        }
        other => panic!("expected integrity violation, got {other}"),
    }
}

#[test]
fn test_object_property_on_missing_object() {
    let mut props = extended_property_rows();
    props.push(extended_property_row(1, "OBJECT_OR_COLUMN", 12345, 0));
    let snapshot = sample_snapshot().with_rows(QueryKind::ExtendedProperties, props);

    let run = run_snapshot(snapshot, &sequential_options()).unwrap();
    assert_eq!(run.diagnostics.integrity_warnings.len(), 1);
    assert_eq!(
        run.diagnostics.integrity_warnings[0].entity,
        EntityKind::ExtendedProperty
    );
}

fn snapshot_with_index_properties() -> CatalogSnapshot {
    let mut props = extended_property_rows();
    props.push(extended_property_row(7, "INDEX", CUSTOMER, 1));
    props.push(extended_property_row(7, "INDEX", CUSTOMER, 2));
    sample_snapshot().with_rows(QueryKind::ExtendedProperties, props)
}

#[test]
fn test_passthrough_properties_do_not_collide_with_database_scope() {
    let run = run_snapshot(snapshot_with_index_properties(), &sequential_options()).unwrap();

    assert!(
        run.diagnostics.integrity_warnings.is_empty(),
        "{:#?}",
        run.diagnostics.integrity_warnings
    );
    assert_eq!(run.diagnostics.unmapped_codes.len(), 2);
    assert_eq!(run.model.extended_properties.len(), 6);
}

#[test]
fn test_passthrough_properties_pass_strict_mode() {
    let run = run_snapshot(snapshot_with_index_properties(), &strict()).unwrap();
    assert_eq!(run.audit.status, RunStatus::Partial);
}

#[test]
fn test_repeated_column_property_is_a_duplicate_key() {
    let mut props = extended_property_rows();
    props.push(extended_property_row(1, "OBJECT_OR_COLUMN", CUSTOMER, 2));
    let snapshot = sample_snapshot().with_rows(QueryKind::ExtendedProperties, props);

    let run = run_snapshot(snapshot, &sequential_options()).unwrap();
    assert_eq!(run.diagnostics.integrity_warnings.len(), 1);
    let warning = &run.diagnostics.integrity_warnings[0];
    assert_eq!(warning.rule, IntegrityRule::DuplicateKey);
    assert_eq!(
        warning.natural_key.as_str(),
        "(COLUMN, 5, -, 100, 2, 'MS_Description')"
    );
}

// ============================================================================
// Step failures
// ============================================================================

#[test]
fn test_unavailable_source_fails_only_its_step() {
    let mut snapshot = sample_snapshot();
    snapshot.queries.remove(QueryKind::Indexes.name());

    let run = run_snapshot(snapshot, &sequential_options()).unwrap();

    assert_eq!(run.diagnostics.step_failures.len(), 1);
    assert_eq!(run.diagnostics.step_failures[0].query, QueryKind::Indexes);
    assert!(run.model.indexes.is_empty());
    assert_eq!(run.model.columns.len(), 7);
    // Index columns cannot be checked against missing indexes
    assert!(run.diagnostics.integrity_warnings.is_empty());

    let step = run
        .audit
        .steps
        .iter()
        .find(|s| s.step_key == "extract.sys.indexes")
        .unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert!(step.error_message.is_some());
}

#[test]
fn test_missing_required_column_fails_its_step() {
    // A customised query that forgot to select data_type
    let rows = vec![RawRow::new()
        .with("view_id", CUSTOMER_VIEW)
        .with("ordinal_position", 1i64)
        .with("column_name", "Id")];
    let snapshot = sample_snapshot().with_rows(QueryKind::ViewColumns, rows);

    let run = run_snapshot(snapshot, &sequential_options()).unwrap();
    assert_eq!(run.diagnostics.step_failures.len(), 1);
    assert!(run.diagnostics.step_failures[0].error.contains("data_type"));
    assert!(run.model.view_columns.is_empty());
}

#[test]
fn test_malformed_row_names_its_key() {
    let mut rows = object_rows();
    rows.push(object_row(4242, SALES, "Broken", "U").with("name", RawValue::Null));
    let snapshot = sample_snapshot().with_rows(QueryKind::Objects, rows);

    let run = run_snapshot(snapshot, &sequential_options()).unwrap();

    let failure = run
        .diagnostics
        .step_failures
        .iter()
        .find(|f| f.query == QueryKind::Objects)
        .unwrap();
    assert!(failure.error.contains("object row (4242)"), "{}", failure.error);
    assert!(failure.error.contains("name"), "{}", failure.error);
}

#[test]
fn test_every_step_failing_aborts_the_run() {
    let err = run_snapshot(CatalogSnapshot::new(), &sequential_options()).unwrap_err();
    match err {
        ExtractError::AllSourcesUnavailable { failed } => {
            assert_eq!(failed, QueryKind::ALL.to_vec());
        }
        other => panic!("expected every source to be unavailable, got {other}"),
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancelled_run_returns_nothing() {
    let source = SnapshotSource::new(sample_snapshot());
    let token = CancellationToken::new();
    token.cancel();

    let err = run_extraction(
        &source,
        &QueryCatalog::builtin(),
        &sequential_options(),
        &NoopObserver,
        &token,
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::Cancelled { .. }));
}

#[test]
fn test_expired_deadline_cancels_the_run() {
    let options = RunOptions {
        timeout: Some(Duration::ZERO),
        ..sequential_options()
    };

    let err = run_snapshot(sample_snapshot(), &options).unwrap_err();
    match err {
        ExtractError::Cancelled { reason } => assert!(reason.starts_with("timed out")),
        other => panic!("expected cancellation, got {other}"),
    }
}

// ============================================================================
// Determinism and reporting
// ============================================================================

#[test]
fn test_repeated_runs_produce_identical_models() {
    let first = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();
    let second = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();

    assert_eq!(
        serde_json::to_string(&first.model).unwrap(),
        serde_json::to_string(&second.model).unwrap()
    );
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_ne!(first.audit.run_guid, second.audit.run_guid);
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let sequential = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();
    let parallel = run_snapshot(sample_snapshot(), &RunOptions::default()).unwrap();

    assert_eq!(sequential.model, parallel.model);
    assert_eq!(sequential.diagnostics, parallel.diagnostics);
}

#[test]
fn test_observer_sees_every_step() {
    let observer = RecordingObserver::default();
    let snapshot = sample_snapshot().with_probe_error(STAGING_PROC, "dynamic SQL");
    run_with_observer(snapshot, &sequential_options(), &observer).unwrap();
    let events = observer.events();

    assert_eq!(events.iter().filter(|e| e.starts_with("started ")).count(), 17);
    assert_eq!(events.iter().filter(|e| e.starts_with("completed ")).count(), 17);
    assert!(events.contains(&"completed extract.sys.columns rows=7".to_string()));
    assert!(events
        .iter()
        .any(|e| e.starts_with("warning result set of routine 77")));
    assert_eq!(events.last().map(String::as_str), Some("finished Partial"));
}

#[test]
fn test_audit_rolls_up_rows() {
    let run = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();

    assert_eq!(run.audit.steps.len(), 17);
    assert!(run.audit.steps.iter().all(|s| s.status == StepStatus::Success));
    let read: usize = run.audit.steps.iter().map(|s| s.rows_read).sum();
    assert_eq!(run.audit.total_rows_read, read);
    assert_eq!(run.audit.error_count, 0);
    assert!(run.audit.end_time_utc.is_some());
}
