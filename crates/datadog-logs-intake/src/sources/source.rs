// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

/// Lowest and highest port a TCP source may listen on.
const MIN_TCP_PORT: i64 = 1;
const MAX_TCP_PORT: i64 = 65535;

/// Origin type of a log source; decides which launcher claims it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Docker,
    Tcp,
    Journald,
    File,
}

impl SourceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Docker => "docker",
            SourceType::Tcp => "tcp",
            SourceType::Journald => "journald",
            SourceType::File => "file",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(SourceType::Docker),
            "tcp" => Ok(SourceType::Tcp),
            "journald" => Ok(SourceType::Journald),
            "file" => Ok(SourceType::File),
            other => Err(format!(
                "unknown source type '{other}', expected one of: docker, tcp, journald, file"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
    pub service: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Kept signed so that out-of-range configuration survives until validation.
    pub port: Option<i64>,
    pub service: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournaldConfig {
    /// Journal directory; `None` reads the system journal.
    pub path: Option<String>,
    pub service: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub path: String,
    pub service: Option<String>,
    pub source: Option<String>,
}

/// Type-specific parameters of a source. The variant is the source's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Docker(DockerConfig),
    Tcp(TcpConfig),
    Journald(JournaldConfig),
    File(FileConfig),
}

impl SourceConfig {
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceConfig::Docker(_) => SourceType::Docker,
            SourceConfig::Tcp(_) => SourceType::Tcp,
            SourceConfig::Journald(_) => SourceType::Journald,
            SourceConfig::File(_) => SourceType::File,
        }
    }

    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            SourceConfig::Docker(c) => Some(c.service.as_str()),
            SourceConfig::Tcp(c) => c.service.as_deref(),
            SourceConfig::Journald(c) => c.service.as_deref(),
            SourceConfig::File(c) => c.service.as_deref(),
        }
    }

    /// The `source` tag attached to every line read from this origin.
    #[must_use]
    pub fn source_tag(&self) -> Option<&str> {
        match self {
            SourceConfig::Docker(c) => Some(c.source.as_str()),
            SourceConfig::Tcp(c) => c.source.as_deref(),
            SourceConfig::Journald(c) => c.source.as_deref(),
            SourceConfig::File(c) => c.source.as_deref(),
        }
    }

    /// Checks the internal consistency of the parameters.
    ///
    /// # Errors
    ///
    /// Returns the reason the configuration cannot be tailed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SourceConfig::Docker(_) => Ok(()),
            SourceConfig::Tcp(TcpConfig { port: None, .. }) => {
                Err("tcp source requires a port".to_string())
            }
            SourceConfig::Tcp(TcpConfig {
                port: Some(port), ..
            }) => {
                if (MIN_TCP_PORT..=MAX_TCP_PORT).contains(port) {
                    Ok(())
                } else {
                    Err(format!(
                        "invalid port {port}, must be between {MIN_TCP_PORT} and {MAX_TCP_PORT}"
                    ))
                }
            }
            SourceConfig::Journald(JournaldConfig {
                path: Some(path), ..
            }) if path.trim().is_empty() => Err("journald path cannot be empty".to_string()),
            SourceConfig::Journald(_) => Ok(()),
            SourceConfig::File(FileConfig { path, .. }) if path.trim().is_empty() => {
                Err("file source requires a path".to_string())
            }
            SourceConfig::File(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Valid,
    Invalid(String),
}

impl SourceStatus {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, SourceStatus::Valid)
    }
}

/// One discovered log origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    /// Name of the rule or configuration entry that produced this source.
    pub name: String,
    pub config: SourceConfig,
    pub status: SourceStatus,
}

impl LogSource {
    /// Creates a source that has not been validated yet.
    #[must_use]
    pub fn new(name: impl Into<String>, config: SourceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            status: SourceStatus::Valid,
        }
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.config.source_type()
    }

    /// Runs [`SourceConfig::validate`] and records the outcome in `status`.
    pub fn validate(&mut self) -> &SourceStatus {
        self.status = match self.config.validate() {
            Ok(()) => SourceStatus::Valid,
            Err(reason) => SourceStatus::Invalid(reason),
        };
        &self.status
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }
}
