// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! YAML file-based configuration.
//!
//! # Example Configuration
//!
//! ```yaml
//! log_level: info
//! logs_enabled: true
//! logs_config:
//!   container_collect_all: true
//!   tcp_forward_port: 10514
//!   run_path: /opt/datadog-agent/run
//!   pipelines: 4
//!   sources:
//!     - type: journald
//! ```

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::Deserialize;

use crate::{
    config::{
        deserialize_option_lossless, deserialize_optional_bool_from_anything,
        deserialize_optional_duration_from_seconds, deserialize_optional_string,
        log_level::LogLevel, logs_source::LogsSourceDefinition, merge_stop_grace_period, Config,
        ConfigError, ConfigSource,
    },
    merge_option_to_value, merge_string, merge_vec,
};

/// `YamlConfig` represents the fields of `datadog.yaml` the logs agent reads.
#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
#[allow(clippy::module_name_repetitions)]
pub struct YamlConfig {
    pub log_level: Option<LogLevel>,

    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub logs_enabled: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub log_enabled: Option<bool>,

    pub logs_config: LogsConfig,
}

/// Logs specific config
#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
#[allow(clippy::module_name_repetitions)]
pub struct LogsConfig {
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub container_collect_all: Option<bool>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub tcp_forward_port: Option<i64>,
    pub sources: Vec<LogsSourceDefinition>,

    #[serde(deserialize_with = "deserialize_optional_string")]
    pub dd_url: Option<String>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub dd_port: Option<u16>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub dev_mode_no_ssl: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub dev_mode_use_proto: Option<bool>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub open_files_limit: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub frame_size: Option<usize>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub run_path: Option<PathBuf>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub pipelines: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub pipeline_buffer_size: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_duration_from_seconds")]
    pub stop_grace_period: Option<Duration>,
}

fn merge_config(config: &mut Config, yaml_config: &YamlConfig) {
    merge_option_to_value!(config, yaml_config, log_level);
    merge_option_to_value!(config, yaml_config, logs_enabled);
    merge_option_to_value!(config, yaml_config, log_enabled);

    let logs = &yaml_config.logs_config;
    merge_option_to_value!(
        config,
        logs_config_container_collect_all,
        logs,
        container_collect_all
    );
    merge_option_to_value!(config, logs_config_tcp_forward_port, logs, tcp_forward_port);
    merge_vec!(config, logs_config_sources, logs, sources);

    merge_string!(config, logs_config_dd_url, logs, dd_url);
    merge_option_to_value!(config, logs_config_dd_port, logs, dd_port);
    merge_option_to_value!(config, logs_config_dev_mode_no_ssl, logs, dev_mode_no_ssl);
    merge_option_to_value!(
        config,
        logs_config_dev_mode_use_proto,
        logs,
        dev_mode_use_proto
    );

    merge_option_to_value!(config, logs_config_open_files_limit, logs, open_files_limit);
    merge_option_to_value!(config, logs_config_frame_size, logs, frame_size);
    merge_option_to_value!(config, logs_config_run_path, logs, run_path);
    merge_option_to_value!(config, logs_config_pipelines, logs, pipelines);
    merge_option_to_value!(
        config,
        logs_config_pipeline_buffer_size,
        logs,
        pipeline_buffer_size
    );
    merge_stop_grace_period(config, logs.stop_grace_period);
}

#[derive(Debug, PartialEq, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct YamlConfigSource {
    pub path: PathBuf,
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Yaml::file(self.path.clone()));

        match figment.extract::<YamlConfig>() {
            Ok(yaml_config) => merge_config(config, &yaml_config),
            Err(e) => {
                return Err(ConfigError::ParseError(format!(
                    "Failed to parse config from yaml file: {e}, using default config."
                )));
            }
        }

        Ok(())
    }
}
