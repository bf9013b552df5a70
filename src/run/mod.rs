//! Extraction run coordinator
//!
//! Fans out one step per catalog query, waits for every step at a barrier,
//! then assembles the canonical model, unifies constraints, attaches
//! function return types and runs the integrity resolver. Nothing crosses
//! between entity sets before the barrier.

mod audit;
mod cancel;
mod observer;
mod step;

pub use audit::{Environment, RunAudit, RunStatus, StepAudit, StepStatus, TriggerType};
pub use cancel::CancellationToken;
pub use observer::{ExtractionObserver, NoopObserver, RunWarning, TracingObserver};

use std::collections::BTreeSet;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info_span;

use crate::diagnostics::{Diagnostics, StepFailure};
use crate::error::ExtractError;
use crate::integrity::{self, IntegrityMode};
use crate::model::{CatalogModel, EntityKind};
use crate::source::{CatalogSource, QueryCatalog, QueryKind};
use crate::unify::ConstraintArena;

use cancel::CancelCheck;
use step::{execute_step, StepOutput, StepResult};

/// Job name recorded when none is configured
pub const DEFAULT_JOB_NAME: &str = "db_dox_etl";

/// Options for one extraction run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub integrity_mode: IntegrityMode,
    /// Deadline for reaching the barrier
    pub timeout: Option<Duration>,
    /// Run steps (and result-set probes) on the rayon pool
    pub parallel: bool,
    pub job_name: String,
    pub environment: Environment,
    pub trigger_type: TriggerType,
    pub trigger_user: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            integrity_mode: IntegrityMode::Lenient,
            timeout: None,
            parallel: true,
            job_name: DEFAULT_JOB_NAME.to_string(),
            environment: Environment::Dev,
            trigger_type: TriggerType::Manual,
            trigger_user: None,
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub model: CatalogModel,
    pub diagnostics: Diagnostics,
    pub audit: RunAudit,
}

/// Run every catalog query against `source` and build the canonical model.
///
/// Per-step failures are recorded in the diagnostics and the run carries
/// on. The run itself fails only when it is cancelled before the barrier,
/// when every step failed, or when strict integrity mode rejects it.
pub fn run_extraction(
    source: &dyn CatalogSource,
    queries: &QueryCatalog,
    options: &RunOptions,
    observer: &dyn ExtractionObserver,
    token: &CancellationToken,
) -> Result<ExtractionRun, ExtractError> {
    let mut audit = RunAudit::start(
        &options.job_name,
        options.environment,
        options.trigger_type,
        options.trigger_user.clone(),
    );
    let span = info_span!(
        "extraction_run",
        run_guid = %audit.run_guid,
        job = %audit.job_name,
        environment = %audit.environment
    );
    let _enter = span.enter();

    let cancel = CancelCheck::new(token, options.timeout);
    let run_step = |kind: &QueryKind| {
        let _enter = span.enter();
        execute_step(source, queries.get(*kind), options.parallel, observer, &cancel)
    };

    let results: Vec<StepResult> = if options.parallel {
        QueryKind::ALL.par_iter().map(run_step).collect()
    } else {
        QueryKind::ALL.iter().map(run_step).collect()
    };

    // Barrier: every step has reported. Partial sets never leave this point.
    if let Some(reason) = cancel.reason() {
        audit.steps = results.into_iter().map(|r| r.audit).collect();
        audit.finish(RunStatus::Failed, audit.failed_steps());
        observer.run_finished(&audit);
        return Err(ExtractError::Cancelled { reason });
    }

    let mut diagnostics = Diagnostics::new();
    let mut outputs = Vec::with_capacity(results.len());
    for result in results {
        audit.steps.push(result.audit);
        match result.outcome {
            Some(Ok((output, unmapped))) => {
                diagnostics.unmapped_codes.extend(unmapped);
                outputs.push(output);
            }
            Some(Err(e)) => diagnostics.step_failures.push(StepFailure {
                query: result.query,
                entity_kinds: result.query.produces().to_vec(),
                error: e.to_string(),
            }),
            // Only cancellation skips a step, and that was handled above
            None => {}
        }
    }

    if outputs.is_empty() {
        let failed: Vec<QueryKind> = diagnostics.failed_queries().collect();
        audit.finish(RunStatus::Failed, failed.len());
        observer.run_finished(&audit);
        return Err(ExtractError::AllSourcesUnavailable { failed });
    }

    let model = assemble(outputs, &mut diagnostics);

    let incomplete: BTreeSet<EntityKind> = diagnostics
        .step_failures
        .iter()
        .flat_map(|f| f.entity_kinds.iter().copied())
        .collect();
    diagnostics
        .integrity_warnings
        .extend(integrity::resolve(&model, &incomplete));
    diagnostics.row_counts = model.row_counts();

    report_warnings(&diagnostics, observer);

    if let Err(e) = integrity::enforce(options.integrity_mode, &diagnostics.integrity_warnings) {
        audit.finish(RunStatus::Failed, diagnostics.issue_count());
        observer.run_finished(&audit);
        return Err(e);
    }

    let status = if diagnostics.is_clean() {
        RunStatus::Success
    } else {
        RunStatus::Partial
    };
    audit.finish(status, diagnostics.issue_count());
    observer.run_finished(&audit);

    Ok(ExtractionRun {
        model,
        diagnostics,
        audit,
    })
}

/// Fold step outputs into one model. Runs after the barrier.
fn assemble(outputs: Vec<StepOutput>, diagnostics: &mut Diagnostics) -> CatalogModel {
    let mut model = CatalogModel::new();
    let mut arena = ConstraintArena::new();
    let mut return_types = None;

    for output in outputs {
        match output {
            StepOutput::Databases(rows) => model.databases = rows,
            StepOutput::Schemas(rows) => model.schemas = rows,
            StepOutput::Objects(rows) => model.objects = rows,
            StepOutput::Tables(rows) => model.tables = rows,
            StepOutput::Columns(rows) => model.columns = rows,
            StepOutput::Constraints(fragments) => arena.absorb(fragments),
            StepOutput::Indexes(rows) => model.indexes = rows,
            StepOutput::IndexColumns(keys, included) => {
                model.index_columns = keys;
                model.index_included_columns = included;
            }
            StepOutput::Views(rows) => model.views = rows,
            StepOutput::ViewColumns(rows) => model.view_columns = rows,
            StepOutput::Procedures(rows, probes) => {
                model.procedures = rows;
                let (columns, failures) = probes.into_parts();
                model.routine_result_columns.extend(columns);
                diagnostics.introspection_failures.extend(failures);
            }
            StepOutput::Functions(rows, probes) => {
                model.functions = rows;
                let (columns, failures) = probes.into_parts();
                model.routine_result_columns.extend(columns);
                diagnostics.introspection_failures.extend(failures);
            }
            StepOutput::RoutineParameters(projected) => {
                model.routine_parameters = projected.parameters;
                return_types = Some(projected.return_types);
            }
            StepOutput::ExtendedProperties(rows) => model.extended_properties = rows,
        }
    }

    if let Some(return_types) = return_types {
        for function in &mut model.functions {
            function.return_data_type = return_types.get(&function.object_id).cloned();
        }
    }

    model
        .routine_result_columns
        .sort_by_key(|c| (c.routine_id, c.ordinal_position));
    diagnostics
        .introspection_failures
        .sort_by_key(|f| f.routine_id);

    let unified = arena.finish();
    model.constraints = unified.constraints;
    model.constraint_columns = unified.constraint_columns;
    model.foreign_keys = unified.foreign_keys;
    model.foreign_key_columns = unified.foreign_key_columns;
    diagnostics.integrity_warnings.extend(unified.conflicts);

    model
}

fn report_warnings(diagnostics: &Diagnostics, observer: &dyn ExtractionObserver) {
    for unmapped in &diagnostics.unmapped_codes {
        observer.warning(RunWarning::Unmapped(unmapped));
    }
    for failure in &diagnostics.introspection_failures {
        observer.warning(RunWarning::Introspection(failure));
    }
    for warning in &diagnostics.integrity_warnings {
        observer.warning(RunWarning::Integrity(warning));
    }
}
