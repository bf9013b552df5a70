//! Run and step audit records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::source::QueryKind;

/// Name recorded as the source system of every step
pub const SOURCE_SYSTEM: &str = "mssql";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    #[default]
    Dev,
    Test,
    Qa,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    /// Accepts both the short codes and the long names used in settings files
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "test" | "testing" => Ok(Environment::Test),
            "qa" => Ok(Environment::Qa),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Dev => "DEV",
            Environment::Test => "TEST",
            Environment::Qa => "QA",
            Environment::Prod => "PROD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerType {
    Scheduled,
    #[default]
    Manual,
    Api,
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(TriggerType::Scheduled),
            "MANUAL" => Ok(TriggerType::Manual),
            "API" => Ok(TriggerType::Api),
            other => Err(format!("unknown trigger type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Started,
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Audit record of one extraction step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAudit {
    pub step_key: String,
    pub step_order: usize,
    pub source_system: String,
    /// Catalog object the step reads, e.g. `sys.tables`
    pub source_object: String,
    /// Entity kinds the step feeds
    pub target_object: String,
    pub rows_read: usize,
    pub rows_written: usize,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: DateTime<Utc>,
    pub status: StepStatus,
    pub error_message: Option<String>,
}

impl StepAudit {
    pub fn new(query: QueryKind, start_time_utc: DateTime<Utc>) -> Self {
        let step_order = QueryKind::ALL
            .iter()
            .position(|k| *k == query)
            .map_or(0, |i| i + 1);
        Self {
            step_key: query.step_key(),
            step_order,
            source_system: SOURCE_SYSTEM.to_string(),
            source_object: format!("sys.{}", query.name()),
            target_object: query
                .produces()
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(","),
            rows_read: 0,
            rows_written: 0,
            start_time_utc,
            end_time_utc: start_time_utc,
            status: StepStatus::Skipped,
            error_message: None,
        }
    }
}

/// Audit record of one extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAudit {
    pub run_guid: Uuid,
    pub job_name: String,
    pub environment: Environment,
    pub trigger_type: TriggerType,
    pub trigger_user: Option<String>,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub total_rows_read: usize,
    pub total_rows_written: usize,
    pub error_count: usize,
    pub steps: Vec<StepAudit>,
}

impl RunAudit {
    pub fn start(
        job_name: &str,
        environment: Environment,
        trigger_type: TriggerType,
        trigger_user: Option<String>,
    ) -> Self {
        Self {
            run_guid: Uuid::new_v4(),
            job_name: job_name.to_string(),
            environment,
            trigger_type,
            trigger_user,
            start_time_utc: Utc::now(),
            end_time_utc: None,
            status: RunStatus::Started,
            total_rows_read: 0,
            total_rows_written: 0,
            error_count: 0,
            steps: Vec::new(),
        }
    }

    /// Close the run, rolling step totals up
    pub fn finish(&mut self, status: RunStatus, error_count: usize) {
        self.total_rows_read = self.steps.iter().map(|s| s.rows_read).sum();
        self.total_rows_written = self.steps.iter().map(|s| s.rows_written).sum();
        self.error_count = error_count;
        self.status = status;
        self.end_time_utc = Some(Utc::now());
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }
}
