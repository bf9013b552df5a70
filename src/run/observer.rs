//! Progress reporting for extraction runs
//!
//! The engine only reports structured facts through [`ExtractionObserver`];
//! formatting and sinks belong to the implementation.

use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::diagnostics::{IntegrityWarning, IntrospectionFailure, UnmappedCode};
use crate::error::SourceError;
use crate::source::QueryKind;

use super::audit::{RunAudit, RunStatus};

/// A non-fatal finding reported while a run progresses
#[derive(Debug, Clone, Copy)]
pub enum RunWarning<'a> {
    Unmapped(&'a UnmappedCode),
    Introspection(&'a IntrospectionFailure),
    Integrity(&'a IntegrityWarning),
}

impl fmt::Display for RunWarning<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::Unmapped(u) => write!(
                f,
                "unmapped {} code '{}' on {} {}",
                u.field, u.code, u.entity, u.natural_key
            ),
            RunWarning::Introspection(i) => {
                write!(f, "result set of routine {} not described: {}", i.routine_id, i.reason)
            }
            RunWarning::Integrity(w) => write!(f, "{:?}: {}", w.rule, w),
        }
    }
}

/// Receives extraction progress. Called from worker threads.
pub trait ExtractionObserver: Send + Sync {
    fn step_started(&self, _step: QueryKind) {}

    fn step_completed(&self, _step: QueryKind, _rows: usize, _elapsed: Duration) {}

    fn step_failed(&self, _step: QueryKind, _error: &SourceError) {}

    fn warning(&self, _warning: RunWarning<'_>) {}

    fn run_finished(&self, _audit: &RunAudit) {}
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExtractionObserver for NoopObserver {}

/// Emits `tracing` events; run correlation comes from the enclosing span
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExtractionObserver for TracingObserver {
    fn step_started(&self, step: QueryKind) {
        info!(step = %step.step_key(), phase = "extract", "Starting ETL step");
    }

    fn step_completed(&self, step: QueryKind, rows: usize, elapsed: Duration) {
        info!(
            step = %step.step_key(),
            phase = "extract",
            rows,
            elapsed_ms = (elapsed.as_millis() as u64),
            "Completed ETL step in {:.2}s",
            elapsed.as_secs_f64()
        );
    }

    fn step_failed(&self, step: QueryKind, err: &SourceError) {
        error!(step = %step.step_key(), phase = "extract", error = %err, "ETL step failed");
    }

    fn warning(&self, warning: RunWarning<'_>) {
        warn!(phase = "normalize", "{warning}");
    }

    fn run_finished(&self, audit: &RunAudit) {
        let elapsed_ms = audit
            .end_time_utc
            .map(|end| (end - audit.start_time_utc).num_milliseconds())
            .unwrap_or_default();
        match audit.status {
            RunStatus::Failed => error!(
                run_guid = %audit.run_guid,
                status = ?audit.status,
                errors = audit.error_count,
                elapsed_ms,
                "Extraction run failed"
            ),
            _ => info!(
                run_guid = %audit.run_guid,
                status = ?audit.status,
                rows_read = audit.total_rows_read,
                rows_written = audit.total_rows_written,
                errors = audit.error_count,
                elapsed_ms,
                "Extraction run finished"
            ),
        }
    }
}
