// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use crate::config::{deserialize_option_lossless, deserialize_optional_string};

/// An explicitly configured log source, as written under `logs_config.sources`.
///
/// Only the fields relevant to `type` are read; the source builder turns this
/// loose shape into a typed [`crate::sources::SourceConfig`].
///
/// ```yaml
/// logs_config:
///   sources:
///     - type: file
///       path: /var/log/app.log
///       service: app
///       source: python
///     - type: journald
///       path: /var/log/journal
/// ```
#[derive(Debug, PartialEq, Eq, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LogsSourceDefinition {
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub name: Option<String>,
    #[serde(rename = "type", deserialize_with = "deserialize_optional_string")]
    pub source_type: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub path: Option<String>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub port: Option<i64>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub service: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub source: Option<String>,
}
