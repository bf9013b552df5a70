//! Application settings
//!
//! Loaded from an optional TOML file, then from `DBDOX_*` environment
//! variables (`__` separates nested keys, e.g. `DBDOX_LOG__LEVEL=debug`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use config::{Config, ConfigError, Environment as EnvSource, File, FileFormat};
use serde::Deserialize;

use crate::integrity::IntegrityMode;
use crate::run::{RunOptions, DEFAULT_JOB_NAME};

pub const ENV_PREFIX: &str = "DBDOX";

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct AppSettings {
    pub app_name: String,
    pub environment: String,
    pub log: LogSettings,
    pub run: RunSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_JOB_NAME.to_string(),
            environment: "development".to_string(),
            log: LogSettings::default(),
            run: RunSettings::default(),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct RunSettings {
    pub strict: bool,
    pub timeout_secs: Option<u64>,
    pub parallel: bool,
    /// Falls back to `app_name`
    pub job_name: Option<String>,
    pub trigger_type: String,
    pub trigger_user: Option<String>,
    /// Directory of `NN_name.sql` files replacing built-in queries
    pub query_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            strict: false,
            timeout_secs: None,
            parallel: true,
            job_name: None,
            trigger_type: "MANUAL".to_string(),
            trigger_user: None,
            query_dir: None,
        }
    }
}

impl AppSettings {
    /// Settings file (if any) overlaid with the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings file: {}", path.display()))?,
            ),
            None => None,
        };
        load_settings(file.as_deref(), None).context("Failed to load settings")
    }

    pub fn run_options(&self) -> Result<RunOptions> {
        Ok(RunOptions {
            integrity_mode: if self.run.strict {
                IntegrityMode::Strict
            } else {
                IntegrityMode::Lenient
            },
            timeout: self.run.timeout_secs.map(Duration::from_secs),
            parallel: self.run.parallel,
            job_name: self
                .run
                .job_name
                .clone()
                .unwrap_or_else(|| self.app_name.clone()),
            environment: self.environment.parse().map_err(|e: String| anyhow!(e))?,
            trigger_type: self.run.trigger_type.parse().map_err(|e: String| anyhow!(e))?,
            trigger_user: self.run.trigger_user.clone(),
        })
    }
}

/// Build settings from TOML text and an environment map.
///
/// `env` replaces the process environment when given.
pub fn load_settings(
    toml: Option<&str>,
    env: Option<HashMap<String, String>>,
) -> Result<AppSettings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(toml) = toml {
        builder = builder.add_source(File::from_str(toml, FileFormat::Toml));
    }
    builder = builder.add_source(
        EnvSource::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    builder.build()?.try_deserialize()
}
