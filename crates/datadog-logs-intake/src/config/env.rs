// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment variable configuration (`DD_*`).
//!
//! Nested YAML keys are flattened with underscores, so `logs_config.tcp_forward_port`
//! becomes `DD_LOGS_CONFIG_TCP_FORWARD_PORT`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{providers::Env, Figment};
use serde::Deserialize;

use crate::{
    config::{
        deserialize_option_lossless, deserialize_optional_bool_from_anything,
        deserialize_optional_duration_from_seconds, deserialize_optional_string,
        log_level::LogLevel, merge_stop_grace_period, Config, ConfigError, ConfigSource,
    },
    merge_option_to_value, merge_string,
};

#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
#[allow(clippy::module_name_repetitions)]
pub struct EnvConfig {
    pub log_level: Option<LogLevel>,

    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub logs_enabled: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub log_enabled: Option<bool>,

    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub logs_config_container_collect_all: Option<bool>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_tcp_forward_port: Option<i64>,

    #[serde(deserialize_with = "deserialize_optional_string")]
    pub logs_config_dd_url: Option<String>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_dd_port: Option<u16>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub logs_config_dev_mode_no_ssl: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub logs_config_dev_mode_use_proto: Option<bool>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_open_files_limit: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_frame_size: Option<usize>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_run_path: Option<PathBuf>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_pipelines: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub logs_config_pipeline_buffer_size: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_duration_from_seconds")]
    pub logs_config_stop_grace_period: Option<Duration>,
}

fn merge_config(config: &mut Config, env_config: &EnvConfig) {
    merge_option_to_value!(config, env_config, log_level);
    merge_option_to_value!(config, env_config, logs_enabled);
    merge_option_to_value!(config, env_config, log_enabled);

    merge_option_to_value!(config, env_config, logs_config_container_collect_all);
    merge_option_to_value!(config, env_config, logs_config_tcp_forward_port);

    merge_string!(config, env_config, logs_config_dd_url);
    merge_option_to_value!(config, env_config, logs_config_dd_port);
    merge_option_to_value!(config, env_config, logs_config_dev_mode_no_ssl);
    merge_option_to_value!(config, env_config, logs_config_dev_mode_use_proto);

    merge_option_to_value!(config, env_config, logs_config_open_files_limit);
    merge_option_to_value!(config, env_config, logs_config_frame_size);
    merge_option_to_value!(config, env_config, logs_config_run_path);
    merge_option_to_value!(config, env_config, logs_config_pipelines);
    merge_option_to_value!(config, env_config, logs_config_pipeline_buffer_size);
    merge_stop_grace_period(config, env_config.logs_config_stop_grace_period);
}

#[derive(Debug, PartialEq, Clone, Copy)]
#[allow(clippy::module_name_repetitions)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Env::prefixed("DD_"));

        match figment.extract::<EnvConfig>() {
            Ok(env_config) => merge_config(config, &env_config),
            Err(e) => {
                return Err(ConfigError::ParseError(format!(
                    "Failed to parse config from environment variables: {e}, using default config."
                )));
            }
        }

        Ok(())
    }
}
