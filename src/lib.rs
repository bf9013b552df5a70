//! rust-dbdox: SQL Server catalog metadata extraction and normalization
//!
//! This library reads the system catalog of a SQL Server database through a
//! [`source::CatalogSource`], projects every catalog query into canonical
//! entity sets, unifies the constraint and extended-property families and
//! checks identifier integrity across the result.

pub mod diagnostics;
pub mod error;
pub mod integrity;
pub mod introspect;
pub mod logging;
pub mod model;
pub mod projection;
pub mod run;
pub mod settings;
pub mod source;
pub mod unify;
mod util;

use std::path::{Path, PathBuf};

use anyhow::Result;

pub use diagnostics::Diagnostics;
pub use error::{ExtractError, SourceError};
pub use integrity::IntegrityMode;
pub use model::CatalogModel;
pub use run::{
    run_extraction, CancellationToken, ExtractionObserver, ExtractionRun, NoopObserver,
    RunOptions, TracingObserver,
};
pub use source::{CatalogSource, QueryCatalog, SnapshotSource};

/// Options for extracting a catalog snapshot file
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Path to the snapshot JSON document
    pub snapshot_path: PathBuf,
    /// Directory of query override files
    pub query_dir: Option<PathBuf>,
    pub run: RunOptions,
}

/// Extract the canonical model from a catalog snapshot file
pub fn extract_snapshot(options: &ExtractOptions) -> Result<ExtractionRun> {
    let source = SnapshotSource::from_path(&options.snapshot_path)?;
    let queries = load_queries(options.query_dir.as_deref())?;

    let run = run_extraction(
        &source,
        &queries,
        &options.run,
        &TracingObserver,
        &CancellationToken::new(),
    )?;
    Ok(run)
}

/// Built-in queries, with overrides from `query_dir` when given
pub fn load_queries(query_dir: Option<&Path>) -> Result<QueryCatalog> {
    Ok(match query_dir {
        Some(dir) => QueryCatalog::with_overrides(dir)?,
        None => QueryCatalog::builtin(),
    })
}
