// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::sources::source::{LogSource, SourceType};

/// Immutable, ordered snapshot of every source produced by one build.
///
/// Shared between launchers behind an `Arc`; it is never mutated after
/// construction, so reads need no locking. A configuration reload produces a
/// new registry rather than editing this one.
#[derive(Debug, Clone, Default)]
pub struct LogSources {
    sources: Vec<Arc<LogSource>>,
}

impl LogSources {
    #[must_use]
    pub fn new(sources: Vec<LogSource>) -> Self {
        Self {
            sources: sources.into_iter().map(Arc::new).collect(),
        }
    }

    /// Every source in build order, including invalid ones.
    #[must_use]
    pub fn get_sources(&self) -> &[Arc<LogSource>] {
        &self.sources
    }

    #[must_use]
    pub fn get_valid_sources(&self) -> Vec<Arc<LogSource>> {
        self.sources
            .iter()
            .filter(|source| source.is_valid())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get_valid_sources_with_type(&self, source_type: SourceType) -> Vec<Arc<LogSource>> {
        self.sources
            .iter()
            .filter(|source| source.is_valid() && source.source_type() == source_type)
            .cloned()
            .collect()
    }

    /// Sources kept for diagnostics only.
    #[must_use]
    pub fn get_invalid_sources(&self) -> Vec<Arc<LogSource>> {
        self.sources
            .iter()
            .filter(|source| !source.is_valid())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::source::{FileConfig, SourceConfig, SourceStatus, TcpConfig};

    fn file(name: &str, path: &str) -> LogSource {
        LogSource::new(
            name,
            SourceConfig::File(FileConfig {
                path: path.to_string(),
                service: None,
                source: None,
            }),
        )
    }

    fn tcp(name: &str, port: i64) -> LogSource {
        LogSource::new(
            name,
            SourceConfig::Tcp(TcpConfig {
                port: Some(port),
                service: None,
                source: None,
            }),
        )
    }

    fn names(sources: &[Arc<LogSource>]) -> Vec<&str> {
        sources.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_valid_views_preserve_insertion_order() {
        let mut broken = tcp("broken", 0);
        broken.validate();

        let sources = LogSources::new(vec![
            file("a", "/var/log/a.log"),
            tcp("b", 10514),
            broken,
            file("c", "/var/log/c.log"),
        ]);

        assert_eq!(sources.len(), 4);
        assert_eq!(names(&sources.get_valid_sources()), vec!["a", "b", "c"]);
        assert_eq!(
            names(&sources.get_valid_sources_with_type(SourceType::File)),
            vec!["a", "c"]
        );
        assert_eq!(
            names(&sources.get_valid_sources_with_type(SourceType::Tcp)),
            vec!["b"]
        );
        assert!(sources
            .get_valid_sources_with_type(SourceType::Docker)
            .is_empty());

        let invalid = sources.get_invalid_sources();
        assert_eq!(names(&invalid), vec!["broken"]);
        assert!(matches!(invalid[0].status, SourceStatus::Invalid(_)));
    }

    #[test]
    fn test_empty_registry() {
        let sources = LogSources::default();
        assert!(sources.is_empty());
        assert!(sources.get_valid_sources().is_empty());
    }

    #[test]
    fn test_views_share_the_same_sources() {
        let sources = LogSources::new(vec![file("a", "/var/log/a.log")]);
        let first = sources.get_valid_sources();
        let second = sources.get_valid_sources_with_type(SourceType::File);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }
}
