//! Per-run diagnostics record
//!
//! Nothing in here is fatal on its own. A run is clean only when every list
//! is empty; row counts are informational.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{EntityKind, NaturalKey, ObjectId};
use crate::source::QueryKind;

/// A discriminant value outside its closed enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedCode {
    pub entity: EntityKind,
    /// Which discriminant, e.g. `object_type`
    pub field: String,
    pub code: String,
    /// Natural key of the row that carried the code
    pub natural_key: NaturalKey,
}

/// Best-effort result-set discovery failed for one routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionFailure {
    pub routine_id: ObjectId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityRule {
    /// A referenced row does not exist
    DanglingReference,
    /// The referenced row exists but is of the wrong kind
    WrongTargetType,
    /// Two rows share a declared key
    DuplicateKey,
}

/// A cross-entity reference or key uniqueness check that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub entity: EntityKind,
    pub natural_key: NaturalKey,
    pub rule: IntegrityRule,
    /// Entity kind the broken reference points into
    pub target: EntityKind,
    pub detail: String,
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {}: {}",
            self.entity, self.natural_key, self.target, self.detail
        )
    }
}

/// A step whose source could not be read or projected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub query: QueryKind,
    pub entity_kinds: Vec<EntityKind>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub step_failures: Vec<StepFailure>,
    pub unmapped_codes: Vec<UnmappedCode>,
    pub introspection_failures: Vec<IntrospectionFailure>,
    pub integrity_warnings: Vec<IntegrityWarning>,
    pub row_counts: BTreeMap<EntityKind, usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.step_failures.is_empty()
            && self.unmapped_codes.is_empty()
            && self.introspection_failures.is_empty()
            && self.integrity_warnings.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.step_failures.len()
            + self.unmapped_codes.len()
            + self.introspection_failures.len()
            + self.integrity_warnings.len()
    }

    pub fn failed_queries(&self) -> impl Iterator<Item = QueryKind> + '_ {
        self.step_failures.iter().map(|f| f.query)
    }
}
