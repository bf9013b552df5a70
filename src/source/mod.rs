//! Catalog source adapter
//!
//! The engine never talks to a server itself. A [`CatalogSource`] executes
//! the named extraction queries and the per-routine result-set probe and
//! hands back raw rows.

mod queries;
mod row;
mod snapshot;

pub use queries::{QueryCatalog, QueryDefinition, QueryKind};
pub use row::{RawRow, RawValue};
pub use snapshot::{CatalogSnapshot, ProbeEntry, SnapshotSource};

use crate::error::SourceError;
use crate::model::ObjectId;

/// Supplies raw catalog rows for one database snapshot
pub trait CatalogSource: Send + Sync {
    /// Run one extraction query
    fn fetch(&self, query: &QueryDefinition) -> Result<Vec<RawRow>, SourceError>;

    /// Describe the first result set of a routine.
    ///
    /// Expected to fail for some routines (dynamic SQL, temp tables); the
    /// caller treats a failure as a normal outcome for that routine only.
    fn describe_result_set(&self, routine_id: ObjectId) -> Result<Vec<RawRow>, SourceError>;
}

impl<T: CatalogSource + ?Sized> CatalogSource for &T {
    fn fetch(&self, query: &QueryDefinition) -> Result<Vec<RawRow>, SourceError> {
        (**self).fetch(query)
    }

    fn describe_result_set(&self, routine_id: ObjectId) -> Result<Vec<RawRow>, SourceError> {
        (**self).describe_result_set(routine_id)
    }
}
