// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration Module
//!
//! Holds the unified configuration object read by the source builder, the
//! pipeline provider, the auditor and the origin-specific tailers.
//!
//! ## Configuration Priority
//!
//! Configuration sources are applied in the following order (later sources override earlier):
//!
//! 1. **Defaults** - Hard-coded defaults in the code
//! 2. **YAML file** - Configuration from `datadog.yaml` (if present)
//! 3. **Environment variables** - DD_* environment variables (highest priority)
//!
//! ## Edge Cases and Behaviors
//!
//! - **`logs_enabled` / `log_enabled`**: either one enables log collection; the
//!   second is the legacy spelling and is still honored.
//! - **`tcp_forward_port`**: `-1` disables the TCP forwarding source. Any other
//!   value produces a source, which is marked invalid when out of range.
//! - **`pipelines = 0`**: falls back to the default pool size.
//! - **`stop_grace_period = 0`**: disables the per-tailer shutdown bound.
//! - **`sources`**: YAML only; environment variables cannot describe lists of
//!   sources.

pub mod env;
pub mod log_level;
pub mod logs_source;
pub mod yaml;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_aux::prelude::deserialize_bool_from_anything;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::{
    env::EnvConfigSource, log_level::LogLevel, logs_source::LogsSourceDefinition,
    yaml::YamlConfigSource,
};

/// Sentinel value of `logs_config.tcp_forward_port` meaning "no TCP forwarding".
pub const TCP_FORWARD_PORT_DISABLED: i64 = -1;

pub const DEFAULT_PIPELINES: usize = 4;
pub const DEFAULT_PIPELINE_BUFFER_SIZE: usize = 100;
pub const DEFAULT_RUN_PATH: &str = "/opt/datadog-agent/run";
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(30);
pub const DEFAULT_OPEN_FILES_LIMIT: usize = 100;
pub const DEFAULT_FRAME_SIZE: usize = 9000;

/// Helper macro to merge Option<String> fields to String fields
///
/// Providing one field argument will merge the value from the source config field into the config
/// field.
///
/// Providing two field arguments will merge the value from the source config field into the config
/// field under a different name.
#[macro_export]
macro_rules! merge_string {
    ($config:expr, $config_field:ident, $source:expr, $source_field:ident) => {
        if let Some(value) = &$source.$source_field {
            $config.$config_field.clone_from(value);
        }
    };
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = &$source.$field {
            $config.$field.clone_from(value);
        }
    };
}

/// Helper macro to merge Option<T> fields to T fields when Option<T> is Some
#[macro_export]
macro_rules! merge_option_to_value {
    ($config:expr, $config_field:ident, $source:expr, $source_field:ident) => {
        if let Some(value) = &$source.$source_field {
            $config.$config_field = value.clone();
        }
    };
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = &$source.$field {
            $config.$field = value.clone();
        }
    };
}

/// Helper macro to merge `Vec` fields when `Vec` is not empty
#[macro_export]
macro_rules! merge_vec {
    ($config:expr, $config_field:ident, $source:expr, $source_field:ident) => {
        if !$source.$source_field.is_empty() {
            $config.$config_field.clone_from(&$source.$source_field);
        }
    };
    ($config:expr, $source:expr, $field:ident) => {
        if !$source.$field.is_empty() {
            $config.$field.clone_from(&$source.$field);
        }
    };
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),
}

#[allow(clippy::module_name_repetitions)]
pub trait ConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError>;
}

#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config: Config,
}

#[allow(clippy::module_name_repetitions)]
impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(&mut self) -> Config {
        let mut failed_sources = 0;
        for source in &self.sources {
            match source.load(&mut self.config) {
                Ok(()) => (),
                Err(e) => {
                    error!("Failed to load config: {}", e);
                    failed_sources += 1;
                }
            }
        }

        if !self.sources.is_empty() && failed_sources == self.sources.len() {
            debug!("All sources failed to load config, using default config.");
        }

        if self.config.logs_config_pipelines == 0 {
            debug!(
                "logs_config.pipelines must be at least 1, using default of {}",
                DEFAULT_PIPELINES
            );
            self.config.logs_config_pipelines = DEFAULT_PIPELINES;
        }

        if self.config.logs_config_pipeline_buffer_size == 0 {
            self.config.logs_config_pipeline_buffer_size = DEFAULT_PIPELINE_BUFFER_SIZE;
        }

        if self.config.logs_config_run_path.as_os_str().is_empty() {
            self.config.logs_config_run_path = PathBuf::from(DEFAULT_RUN_PATH);
        }

        if self.config.logs_config_frame_size == 0 {
            self.config.logs_config_frame_size = DEFAULT_FRAME_SIZE;
        }

        if self.config.logs_config_open_files_limit == 0 {
            debug!(
                "logs_config.open_files_limit must be at least 1, using default of {}",
                DEFAULT_OPEN_FILES_LIMIT
            );
            self.config.logs_config_open_files_limit = DEFAULT_OPEN_FILES_LIMIT;
        }

        self.config.clone()
    }
}

#[derive(Debug, PartialEq, Clone)]
#[allow(clippy::module_name_repetitions)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    pub log_level: LogLevel,

    // Global switch
    pub logs_enabled: bool,
    pub log_enabled: bool,

    // Source rules
    pub logs_config_container_collect_all: bool,
    pub logs_config_tcp_forward_port: i64,
    pub logs_config_sources: Vec<LogsSourceDefinition>,

    // Intake and transport, read by the downstream pipeline
    pub logs_config_dd_url: String,
    pub logs_config_dd_port: u16,
    pub logs_config_dev_mode_no_ssl: bool,
    pub logs_config_dev_mode_use_proto: bool,

    // Tailers
    pub logs_config_open_files_limit: usize,
    pub logs_config_frame_size: usize,

    // Checkpoints
    pub logs_config_run_path: PathBuf,

    // Pipelines
    pub logs_config_pipelines: usize,
    pub logs_config_pipeline_buffer_size: usize,

    /// Upper bound on the time a single tailer may take to stop.
    ///
    /// `None` waits for every tailer unconditionally.
    pub logs_config_stop_grace_period: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),

            logs_enabled: false,
            log_enabled: false,

            logs_config_container_collect_all: false,
            logs_config_tcp_forward_port: TCP_FORWARD_PORT_DISABLED,
            logs_config_sources: Vec::new(),

            logs_config_dd_url: "agent-intake.logs.datadoghq.com".to_string(),
            logs_config_dd_port: 10516,
            logs_config_dev_mode_no_ssl: false,
            logs_config_dev_mode_use_proto: true,

            logs_config_open_files_limit: DEFAULT_OPEN_FILES_LIMIT,
            logs_config_frame_size: DEFAULT_FRAME_SIZE,

            logs_config_run_path: PathBuf::from(DEFAULT_RUN_PATH),

            logs_config_pipelines: DEFAULT_PIPELINES,
            logs_config_pipeline_buffer_size: DEFAULT_PIPELINE_BUFFER_SIZE,
            logs_config_stop_grace_period: Some(DEFAULT_STOP_GRACE_PERIOD),
        }
    }
}

impl Config {
    /// Whether log collection is switched on, through either spelling of the flag.
    #[must_use]
    pub fn logs_collection_enabled(&self) -> bool {
        self.logs_enabled || self.log_enabled
    }

    /// Location of the durable checkpoint registry.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.logs_config_run_path.join("registry.json")
    }
}

/// Load configuration from `datadog.yaml` in `config_directory` and the environment.
#[allow(clippy::module_name_repetitions)]
#[inline]
#[must_use]
pub fn get_config(config_directory: &Path) -> Config {
    let path: PathBuf = config_directory.join("datadog.yaml");
    ConfigBuilder::default()
        .add_source(Box::new(YamlConfigSource { path }))
        .add_source(Box::new(EnvConfigSource))
        .build()
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => {
            error!(
                "Failed to parse value, expected a string, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}

pub fn deserialize_optional_bool_from_anything<'de, D>(
    deserializer: D,
) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    // First try to deserialize as Option<_> to handle null/missing values
    let opt: Option<serde_json::Value> = Option::deserialize(deserializer)?;

    match opt {
        None => Ok(None),
        Some(value) => match deserialize_bool_from_anything(value) {
            Ok(bool_result) => Ok(Some(bool_result)),
            Err(e) => {
                error!("Failed to parse bool value: {}, ignoring", e);
                Ok(None)
            }
        },
    }
}

pub fn deserialize_option_lossless<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Option::<T>::deserialize(deserializer) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("Failed to deserialize optional value: {}, ignoring", e);
            Ok(None)
        }
    }
}

pub fn deserialize_optional_duration_from_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    let value: Option<Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(secs) = n.as_u64() {
                Ok(Some(Duration::from_secs(secs)))
            } else if let Some(secs) = n.as_f64().filter(|s| *s >= 0f64) {
                Ok(Some(Duration::from_secs_f64(secs)))
            } else {
                error!("Failed to parse duration: negative durations are not allowed, ignoring");
                Ok(None)
            }
        }
        Some(other) => {
            error!(
                "Failed to parse duration, expected a number of seconds, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}

/// Zero disables the bound, anything else becomes the new bound.
pub(crate) fn merge_stop_grace_period(config: &mut Config, value: Option<Duration>) {
    if let Some(grace) = value {
        config.logs_config_stop_grace_period = if grace.is_zero() { None } else { Some(grace) };
    }
}
