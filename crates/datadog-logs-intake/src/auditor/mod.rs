// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Checkpoint storage for tailers.
//!
//! The auditor maps a tailer identifier to the last offset the downstream
//! pipeline confirmed it processed. Launchers only read from it, once per
//! tailer start; commits come from the pipeline side.
//!
//! - [`InMemoryAuditor`]: volatile store, seedable for tests
//! - [`Auditor`]: durable JSON registry under the agent's run path

mod memory;
mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use memory::InMemoryAuditor;
pub use registry::{Auditor, DEFAULT_FLUSH_INTERVAL, REGISTRY_VERSION};

/// Opaque, origin-defined position token (byte offset, journal cursor, ...).
///
/// The empty token means "start from the beginning of the origin".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Offset(String);

impl Offset {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn beginning() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_beginning(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_beginning() {
            f.write_str("<beginning>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<u64> for Offset {
    fn from(position: u64) -> Self {
        Self(position.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditorError {
    #[error("checkpoint registry is unreadable: {0}")]
    Unreadable(String),
    #[error("checkpoint registry lock poisoned")]
    Poisoned,
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("checkpoint registry flush task failed: {0}")]
    FlushTask(String),
}

/// Read/commit contract between launchers, tailers and the downstream pipeline.
pub trait CheckpointStore: Send + Sync {
    /// Returns the last committed offset for `identifier`, or
    /// [`Offset::beginning`] when nothing was ever committed for it.
    ///
    /// # Errors
    ///
    /// Fails when the store itself cannot be trusted; callers must not fall
    /// back to the beginning in that case.
    fn get_last_committed_offset(&self, identifier: &str) -> Result<Offset, AuditorError>;

    /// Records `offset` as fully processed for `identifier`.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot record the offset.
    fn commit(&self, identifier: &str, offset: Offset) -> Result<(), AuditorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_beginning() {
        assert!(Offset::beginning().is_beginning());
        assert!(!Offset::from(0).is_beginning());
        assert_eq!(Offset::from(42).as_str(), "42");
        assert_eq!(Offset::beginning().to_string(), "<beginning>");
    }

    #[test]
    fn test_offset_serializes_as_plain_string() {
        let json = serde_json::to_string(&Offset::new("s=abc;i=1")).expect("serializes");
        assert_eq!(json, "\"s=abc;i=1\"");
    }
}
