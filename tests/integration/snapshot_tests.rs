//! Integration tests for extracting snapshot documents from disk

use pretty_assertions::assert_eq;

use rust_dbdox::model::LevelType;
use rust_dbdox::run::RunStatus;
use rust_dbdox::source::{CatalogSnapshot, ProbeEntry, SnapshotSource};
use rust_dbdox::{extract_snapshot, ExtractOptions, ExtractionRun};

use crate::common::*;

fn options_for(ctx: &TestContext) -> ExtractOptions {
    ExtractOptions {
        snapshot_path: ctx.snapshot_path(),
        query_dir: None,
        run: sequential_options(),
    }
}

#[test]
fn test_extract_snapshot_file() {
    let ctx = TestContext::with_snapshot(&sample_snapshot());

    let run = extract_snapshot(&options_for(&ctx)).unwrap();
    assert_eq!(run.audit.status, RunStatus::Success);
    assert_eq!(run.model.tables.len(), 2);
    assert_eq!(run.model.primary_database().map(|d| d.name.as_str()), Some("Sales"));
}

#[test]
fn test_snapshot_document_round_trips() {
    let snapshot = sample_snapshot().with_probe_error(STAGING_PROC, "temp table");
    let ctx = TestContext::with_snapshot(&snapshot);

    let source = SnapshotSource::from_path(&ctx.snapshot_path()).unwrap();
    assert_eq!(source.snapshot(), &snapshot);
    assert!(matches!(
        source.snapshot().result_sets.get(&STAGING_PROC),
        Some(ProbeEntry::Error { .. })
    ));
}

#[test]
fn test_hand_written_snapshot_document() {
    // Bits as 0/1, ids as numbers, probe errors as objects
    let json = r#"{
        "queries": {
            "schemas": [
                {"database_id": 5, "schema_id": 1, "name": "dbo", "owner_name": "dbo"}
            ],
            "extended_properties": [
                {"database_id": 5, "class": 3, "class_desc": "SCHEMA", "major_id": 1,
                 "minor_id": 0, "name": "Owner", "value": "Data team"},
                {"database_id": 5, "class": 27, "class_desc": "PLAN_GUIDE", "major_id": 9,
                 "minor_id": 0, "name": "Note", "value": null}
            ]
        },
        "result_sets": {
            "77": {"error": "dynamic SQL"}
        }
    }"#;
    let ctx = TestContext::with_snapshot(&CatalogSnapshot::new());
    let path = ctx.write_file("hand.json", json);

    let run = extract_snapshot(&ExtractOptions {
        snapshot_path: path,
        query_dir: None,
        run: sequential_options(),
    })
    .unwrap();

    assert_eq!(run.model.schemas.len(), 1);
    let levels: Vec<LevelType> = run
        .model
        .extended_properties
        .iter()
        .map(|p| p.level_type.clone())
        .collect();
    assert_eq!(
        levels,
        vec![LevelType::Schema, LevelType::Other("PLAN_GUIDE".to_string())]
    );
    assert_eq!(run.diagnostics.unmapped_codes.len(), 1);
    // Every other query is missing from the document
    assert_eq!(run.diagnostics.step_failures.len(), 15);
    assert_eq!(run.audit.status, RunStatus::Partial);
}

#[test]
fn test_run_output_round_trips_through_json() {
    let run = run_snapshot(sample_snapshot(), &sequential_options()).unwrap();

    let json = serde_json::to_string(&run).unwrap();
    let reread: ExtractionRun = serde_json::from_str(&json).unwrap();
    assert_eq!(reread, run);
}

#[test]
fn test_malformed_snapshot_is_reported() {
    let ctx = TestContext::with_snapshot(&CatalogSnapshot::new());
    let path = ctx.write_file("broken.json", "{ \"queries\": [ }");

    let err = extract_snapshot(&ExtractOptions {
        snapshot_path: path,
        query_dir: None,
        run: sequential_options(),
    })
    .unwrap_err();
    assert!(err.to_string().contains("Invalid catalog snapshot document"));
}
