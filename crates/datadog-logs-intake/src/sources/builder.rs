// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns the agent configuration into an ordered registry of log sources.
//!
//! Rules are evaluated in a fixed order and each contributes at most one
//! source:
//!
//! 1. `logs_config.container_collect_all` → `container_collect_all` (Docker)
//! 2. `logs_config.tcp_forward_port` other than `-1` → `tcp_forward` (TCP)
//! 3. every entry of `logs_config.sources`, in configured order
//!
//! Validation runs after all rules. Invalid sources stay in the registry with
//! their reason so that "why isn't my source tailed" has an answer, but the
//! valid views hide them.

use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::{logs_source::LogsSourceDefinition, Config, TCP_FORWARD_PORT_DISABLED};
use crate::sources::registry::LogSources;
use crate::sources::source::{
    DockerConfig, FileConfig, JournaldConfig, LogSource, SourceConfig, SourceStatus, SourceType,
    TcpConfig,
};

pub const CONTAINER_COLLECT_ALL_SOURCE_NAME: &str = "container_collect_all";
pub const TCP_FORWARD_SOURCE_NAME: &str = "tcp_forward";

const DOCKER_DEFAULT_SERVICE: &str = "docker";
const DOCKER_DEFAULT_SOURCE: &str = "docker";

type Rule = fn(&Config) -> Option<LogSource>;

const RULES: [Rule; 2] = [container_collect_all_rule, tcp_forward_rule];

/// Builds every log source described by `config`.
///
/// An empty registry is a legitimate outcome: no rule matched, or log
/// collection is switched off altogether.
#[must_use]
pub fn build(config: &Config) -> LogSources {
    if !config.logs_collection_enabled() {
        info!("LOGS_AGENT | Logs collection is disabled, no source will be built");
        return LogSources::default();
    }

    let mut sources: Vec<LogSource> = RULES.iter().filter_map(|rule| rule(config)).collect();
    sources.extend(
        config
            .logs_config_sources
            .iter()
            .enumerate()
            .filter_map(|(index, definition)| configured_source(index, definition)),
    );

    for source in &mut sources {
        source.validate();
        if let SourceStatus::Invalid(reason) = &source.status {
            warn!(
                "LOGS_AGENT | Invalid {} source '{}': {}",
                source.source_type(),
                source.name,
                reason
            );
        }
    }

    debug!("LOGS_AGENT | Built {} log source(s)", sources.len());
    LogSources::new(sources)
}

fn container_collect_all_rule(config: &Config) -> Option<LogSource> {
    if !config.logs_config_container_collect_all {
        return None;
    }
    Some(LogSource::new(
        CONTAINER_COLLECT_ALL_SOURCE_NAME,
        SourceConfig::Docker(DockerConfig {
            service: DOCKER_DEFAULT_SERVICE.to_string(),
            source: DOCKER_DEFAULT_SOURCE.to_string(),
        }),
    ))
}

fn tcp_forward_rule(config: &Config) -> Option<LogSource> {
    let port = config.logs_config_tcp_forward_port;
    if port == TCP_FORWARD_PORT_DISABLED {
        return None;
    }
    Some(LogSource::new(
        TCP_FORWARD_SOURCE_NAME,
        SourceConfig::Tcp(TcpConfig {
            port: Some(port),
            service: None,
            source: None,
        }),
    ))
}

/// Types a `logs_config.sources` entry. Entries whose type is missing or
/// unknown cannot be typed at all and are skipped with a warning.
fn configured_source(index: usize, definition: &LogsSourceDefinition) -> Option<LogSource> {
    let name = definition
        .name
        .clone()
        .unwrap_or_else(|| format!("logs_config.sources[{index}]"));

    let source_type = match definition.source_type.as_deref().map(SourceType::from_str) {
        Some(Ok(source_type)) => source_type,
        Some(Err(e)) => {
            warn!("LOGS_AGENT | Skipping log source '{}': {}", name, e);
            return None;
        }
        None => {
            warn!("LOGS_AGENT | Skipping log source '{}': missing type", name);
            return None;
        }
    };

    let service = definition.service.clone();
    let source = definition.source.clone();
    let config = match source_type {
        SourceType::Docker => SourceConfig::Docker(DockerConfig {
            service: service.unwrap_or_else(|| DOCKER_DEFAULT_SERVICE.to_string()),
            source: source.unwrap_or_else(|| DOCKER_DEFAULT_SOURCE.to_string()),
        }),
        SourceType::Tcp => SourceConfig::Tcp(TcpConfig {
            port: definition.port,
            service,
            source,
        }),
        SourceType::Journald => SourceConfig::Journald(JournaldConfig {
            path: definition.path.clone(),
            service,
            source,
        }),
        SourceType::File => SourceConfig::File(FileConfig {
            path: definition.path.clone().unwrap_or_default(),
            service,
            source,
        }),
    };

    Some(LogSource::new(name, config))
}
