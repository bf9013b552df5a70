//! One extraction step: fetch a query, validate its shape, project it
//!
//! Steps are independent of each other. Whatever a step needs (including
//! the result-set probes for the routines it lists) it derives from its own
//! rows.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::introspect::ProbeBatch;
use crate::model::{
    ColumnInfo, DatabaseInfo, ExtendedProperty, FunctionInfo, IndexColumn, IndexIncludedColumn,
    IndexInfo, ObjectInfo, ProcedureInfo, SchemaInfo, TableInfo, ViewColumn, ViewInfo,
};
use crate::projection::{self, ProjectedParameters};
use crate::source::{CatalogSource, QueryDefinition, QueryKind, RawRow};
use crate::unify::{self, ConstraintFragment};

use super::audit::{StepAudit, StepStatus};
use super::cancel::CancelCheck;
use super::observer::ExtractionObserver;

/// Projected output of one step
#[derive(Debug, Clone)]
pub(crate) enum StepOutput {
    Databases(Vec<DatabaseInfo>),
    Schemas(Vec<SchemaInfo>),
    Objects(Vec<ObjectInfo>),
    Tables(Vec<TableInfo>),
    Columns(Vec<ColumnInfo>),
    Constraints(Vec<ConstraintFragment>),
    Indexes(Vec<IndexInfo>),
    IndexColumns(Vec<IndexColumn>, Vec<IndexIncludedColumn>),
    Views(Vec<ViewInfo>),
    ViewColumns(Vec<ViewColumn>),
    Procedures(Vec<ProcedureInfo>, ProbeBatch),
    Functions(Vec<FunctionInfo>, ProbeBatch),
    RoutineParameters(ProjectedParameters),
    ExtendedProperties(Vec<ExtendedProperty>),
}

impl StepOutput {
    /// Canonical rows this step produced
    pub(crate) fn rows_written(&self) -> usize {
        match self {
            StepOutput::Databases(v) => v.len(),
            StepOutput::Schemas(v) => v.len(),
            StepOutput::Objects(v) => v.len(),
            StepOutput::Tables(v) => v.len(),
            StepOutput::Columns(v) => v.len(),
            StepOutput::Constraints(v) => v.len(),
            StepOutput::Indexes(v) => v.len(),
            StepOutput::IndexColumns(keys, included) => keys.len() + included.len(),
            StepOutput::Views(v) => v.len(),
            StepOutput::ViewColumns(v) => v.len(),
            StepOutput::Procedures(v, _) => v.len(),
            StepOutput::Functions(v, _) => v.len(),
            StepOutput::RoutineParameters(p) => p.parameters.len(),
            StepOutput::ExtendedProperties(v) => v.len(),
        }
    }
}

/// What a step hands back to the coordinator
#[derive(Debug)]
pub(crate) struct StepResult {
    pub(crate) query: QueryKind,
    pub(crate) audit: StepAudit,
    /// `None` when the step was skipped by cancellation
    pub(crate) outcome: Option<Result<(StepOutput, Vec<UnmappedCode>), SourceError>>,
}

pub(crate) fn execute_step(
    source: &dyn CatalogSource,
    query: &QueryDefinition,
    parallel_probes: bool,
    observer: &dyn ExtractionObserver,
    cancel: &CancelCheck,
) -> StepResult {
    let mut audit = StepAudit::new(query.kind, Utc::now());

    if cancel.reason().is_some() {
        return StepResult {
            query: query.kind,
            audit,
            outcome: None,
        };
    }

    observer.step_started(query.kind);
    let started = Instant::now();
    let mut rows_read = 0;
    let outcome = source.fetch(query).and_then(|rows| {
        rows_read = rows.len();
        projection::check_required_columns(query, &rows)?;
        project_step(source, query.kind, &rows, parallel_probes)
    });
    let elapsed: Duration = started.elapsed();

    audit.rows_read = rows_read;
    audit.end_time_utc = Utc::now();
    match &outcome {
        Ok((output, _)) => {
            audit.rows_written = output.rows_written();
            audit.status = StepStatus::Success;
            observer.step_completed(query.kind, audit.rows_written, elapsed);
        }
        Err(e) => {
            audit.status = StepStatus::Failed;
            audit.error_message = Some(e.to_string());
            observer.step_failed(query.kind, e);
        }
    }

    StepResult {
        query: query.kind,
        audit,
        outcome: Some(outcome),
    }
}

fn project_step(
    source: &dyn CatalogSource,
    kind: QueryKind,
    rows: &[RawRow],
    parallel_probes: bool,
) -> Result<(StepOutput, Vec<UnmappedCode>), SourceError> {
    let mut warnings = Vec::new();

    let output = match kind {
        QueryKind::Databases => {
            StepOutput::Databases(projection::project_databases(rows, &mut warnings)?)
        }
        QueryKind::Schemas => StepOutput::Schemas(projection::project_schemas(rows)?),
        QueryKind::Objects => {
            StepOutput::Objects(projection::project_objects(rows, &mut warnings)?)
        }
        QueryKind::Tables => StepOutput::Tables(projection::project_tables(rows)?),
        QueryKind::Columns => StepOutput::Columns(projection::project_columns(rows)?),
        QueryKind::KeyConstraints => {
            StepOutput::Constraints(unify::project_key_constraints(rows, &mut warnings)?)
        }
        QueryKind::CheckConstraints => {
            StepOutput::Constraints(unify::project_check_constraints(rows)?)
        }
        QueryKind::DefaultConstraints => {
            StepOutput::Constraints(unify::project_default_constraints(rows)?)
        }
        QueryKind::ForeignKeys => {
            StepOutput::Constraints(unify::project_foreign_keys(rows, &mut warnings)?)
        }
        QueryKind::Indexes => {
            StepOutput::Indexes(projection::project_indexes(rows, &mut warnings)?)
        }
        QueryKind::IndexColumns => {
            let (keys, included) = projection::project_index_columns(rows)?;
            StepOutput::IndexColumns(keys, included)
        }
        QueryKind::Views => StepOutput::Views(projection::project_views(rows)?),
        QueryKind::ViewColumns => StepOutput::ViewColumns(projection::project_view_columns(rows)?),
        QueryKind::Procedures => {
            let ids = rows
                .iter()
                .map(|row| row.int("object_id"))
                .collect::<Result<Vec<_>, _>>()?;
            let probes = ProbeBatch::run(source, &ids, parallel_probes);
            let procedures = projection::project_procedures(rows, &probes)?;
            StepOutput::Procedures(procedures, probes)
        }
        QueryKind::Functions => {
            let functions = projection::project_functions(rows, &mut warnings)?;
            // Only table-valued functions have a result set to describe
            let ids: Vec<_> = functions
                .iter()
                .filter(|f| f.function_type.is_table_valued())
                .map(|f| f.object_id)
                .collect();
            let probes = ProbeBatch::run(source, &ids, parallel_probes);
            StepOutput::Functions(functions, probes)
        }
        QueryKind::RoutineParameters => {
            StepOutput::RoutineParameters(projection::project_routine_parameters(rows)?)
        }
        QueryKind::ExtendedProperties => StepOutput::ExtendedProperties(
            unify::project_extended_properties(rows, &mut warnings)?,
        ),
    };

    Ok((output, warnings))
}
