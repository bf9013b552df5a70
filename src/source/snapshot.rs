//! A catalog source backed by a captured JSON snapshot

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::model::ObjectId;

use super::{CatalogSource, QueryDefinition, QueryKind, RawRow};

/// Captured outcome of one result-set probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbeEntry {
    Rows(Vec<RawRow>),
    Error { error: String },
}

/// Raw rows per query name plus captured probe outcomes per routine id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub queries: BTreeMap<String, Vec<RawRow>>,
    #[serde(default)]
    pub result_sets: BTreeMap<ObjectId, ProbeEntry>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, kind: QueryKind, rows: Vec<RawRow>) -> Self {
        self.queries.insert(kind.name().to_string(), rows);
        self
    }

    pub fn with_result_set(mut self, routine_id: ObjectId, rows: Vec<RawRow>) -> Self {
        self.result_sets.insert(routine_id, ProbeEntry::Rows(rows));
        self
    }

    pub fn with_probe_error(mut self, routine_id: ObjectId, error: &str) -> Self {
        self.result_sets.insert(
            routine_id,
            ProbeEntry::Error {
                error: error.to_string(),
            },
        );
        self
    }
}

/// [`CatalogSource`] over a [`CatalogSnapshot`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    snapshot: CatalogSnapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: CatalogSnapshot =
            serde_json::from_str(json).context("Invalid catalog snapshot document")?;
        Ok(Self::new(snapshot))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot: {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }
}

impl CatalogSource for SnapshotSource {
    fn fetch(&self, query: &QueryDefinition) -> Result<Vec<RawRow>, SourceError> {
        self.snapshot
            .queries
            .get(query.name())
            .cloned()
            .ok_or_else(|| SourceError::Unavailable {
                query: query.name().to_string(),
                message: "query not present in snapshot".to_string(),
            })
    }

    fn describe_result_set(&self, routine_id: ObjectId) -> Result<Vec<RawRow>, SourceError> {
        match self.snapshot.result_sets.get(&routine_id) {
            Some(ProbeEntry::Rows(rows)) => Ok(rows.clone()),
            Some(ProbeEntry::Error { error }) => Err(SourceError::Probe {
                routine_id,
                message: error.clone(),
            }),
            None => Err(SourceError::Probe {
                routine_id,
                message: "no result set captured".to_string(),
            }),
        }
    }
}
