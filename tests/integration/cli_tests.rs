//! Integration tests for the rust-dbdox binary

use std::path::Path;
use std::process::{Command, Output};

use rust_dbdox::ExtractionRun;

use crate::common::*;

fn dbdox(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rust-dbdox"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env("DBDOX_LOG__LEVEL", "error")
        .output()
        .expect("Failed to run rust-dbdox")
}

#[test]
fn test_extract_writes_run_json() {
    let ctx = TestContext::with_snapshot(&sample_snapshot());
    let output = dbdox(
        &["extract", "--snapshot", "snapshot.json", "--output", "run.json", "--sequential"],
        &ctx.dir,
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = std::fs::read_to_string(ctx.dir.join("run.json")).unwrap();
    let run: ExtractionRun = serde_json::from_str(&json).unwrap();
    assert_eq!(run.model.objects.len(), 7);
    assert!(String::from_utf8_lossy(&output.stderr).contains("finished with status Success"));
}

#[test]
fn test_extract_prints_to_stdout_without_output() {
    let ctx = TestContext::with_snapshot(&sample_snapshot());
    let output = dbdox(&["extract", "--snapshot", "snapshot.json"], &ctx.dir);

    assert!(output.status.success());
    let run: ExtractionRun = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(run.model.columns.len(), 7);
}

#[test]
fn test_strict_rejection_exits_non_zero() {
    let mut columns = column_rows();
    columns.push(column_row(900, 3, "Ghost", "int"));
    let snapshot = sample_snapshot().with_rows(rust_dbdox::source::QueryKind::Columns, columns);
    let ctx = TestContext::with_snapshot(&snapshot);

    let lenient = dbdox(
        &["extract", "--snapshot", "snapshot.json", "--output", "run.json"],
        &ctx.dir,
    );
    assert!(lenient.status.success());
    assert!(String::from_utf8_lossy(&lenient.stderr).contains("1 integrity warning(s)"));

    let strict = dbdox(&["extract", "--snapshot", "snapshot.json", "--strict"], &ctx.dir);
    assert!(!strict.status.success());
    assert!(String::from_utf8_lossy(&strict.stderr).contains("(900, 3)"));
}

#[test]
fn test_settings_file_enables_strict_mode() {
    let mut columns = column_rows();
    columns.push(column_row(900, 3, "Ghost", "int"));
    let snapshot = sample_snapshot().with_rows(rust_dbdox::source::QueryKind::Columns, columns);
    let ctx = TestContext::with_snapshot(&snapshot);
    ctx.write_file("dbdox.toml", "[run]\nstrict = true\n");

    let output = dbdox(
        &["--config", "dbdox.toml", "extract", "--snapshot", "snapshot.json"],
        &ctx.dir,
    );
    assert!(!output.status.success());
}

#[test]
fn test_queries_lists_every_query() {
    let ctx = TestContext::with_snapshot(&sample_snapshot());
    let output = dbdox(&["queries"], &ctx.dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 17);
    assert!(stdout.lines().next().unwrap().starts_with("01_databases.sql"));
    assert!(stdout.contains("17_extended_properties.sql"));
}
