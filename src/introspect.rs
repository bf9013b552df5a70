//! Best-effort result-set introspection for routines
//!
//! Each routine is probed on its own. A failing probe yields a
//! [`ProbeOutcome::Failed`] for that routine and nothing else; it is never
//! turned into an error for the step or the run.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::diagnostics::IntrospectionFailure;
use crate::model::{ObjectId, RoutineResultColumn};
use crate::projection::project_result_columns;
use crate::source::CatalogSource;

/// Below this many routines the probes run sequentially
const PARALLEL_PROBE_THRESHOLD: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Described(Vec<RoutineResultColumn>),
    Failed { reason: String },
}

/// Probe outcomes keyed by routine id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeBatch {
    outcomes: BTreeMap<ObjectId, ProbeOutcome>,
}

impl ProbeBatch {
    /// Probe every routine in `routine_ids`
    pub fn run(source: &dyn CatalogSource, routine_ids: &[ObjectId], parallel: bool) -> Self {
        let probe = |id: &ObjectId| (*id, probe_one(source, *id));

        let outcomes = if parallel && routine_ids.len() >= PARALLEL_PROBE_THRESHOLD {
            routine_ids.par_iter().map(probe).collect()
        } else {
            routine_ids.iter().map(probe).collect()
        };

        Self { outcomes }
    }

    pub fn from_outcomes(outcomes: impl IntoIterator<Item = (ObjectId, ProbeOutcome)>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    /// Whether the probe for `routine_id` ran and succeeded
    pub fn succeeded(&self, routine_id: ObjectId) -> bool {
        matches!(
            self.outcomes.get(&routine_id),
            Some(ProbeOutcome::Described(_))
        )
    }

    pub fn outcome(&self, routine_id: ObjectId) -> Option<&ProbeOutcome> {
        self.outcomes.get(&routine_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Result columns of every described routine and one failure per failed probe
    pub fn into_parts(self) -> (Vec<RoutineResultColumn>, Vec<IntrospectionFailure>) {
        let mut columns = Vec::new();
        let mut failures = Vec::new();

        for (routine_id, outcome) in self.outcomes {
            match outcome {
                ProbeOutcome::Described(mut rows) => {
                    rows.sort_by_key(|c| c.ordinal_position);
                    columns.extend(rows);
                }
                ProbeOutcome::Failed { reason } => {
                    failures.push(IntrospectionFailure { routine_id, reason });
                }
            }
        }

        (columns, failures)
    }
}

fn probe_one(source: &dyn CatalogSource, routine_id: ObjectId) -> ProbeOutcome {
    let described = source
        .describe_result_set(routine_id)
        .and_then(|rows| project_result_columns(routine_id, &rows));

    match described {
        Ok(columns) => ProbeOutcome::Described(columns),
        Err(e) => ProbeOutcome::Failed {
            reason: e.to_string(),
        },
    }
}
