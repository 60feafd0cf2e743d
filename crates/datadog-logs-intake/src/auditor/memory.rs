// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::RwLock;

use crate::auditor::{AuditorError, CheckpointStore, Offset};

/// Volatile checkpoint store. Offsets are lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryAuditor {
    offsets: RwLock<HashMap<String, Offset>>,
}

impl InMemoryAuditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `offsets`.
    #[must_use]
    pub fn with_offsets<I, K>(offsets: I) -> Self
    where
        I: IntoIterator<Item = (K, Offset)>,
        K: Into<String>,
    {
        Self {
            offsets: RwLock::new(
                offsets
                    .into_iter()
                    .map(|(identifier, offset)| (identifier.into(), offset))
                    .collect(),
            ),
        }
    }
}

impl CheckpointStore for InMemoryAuditor {
    fn get_last_committed_offset(&self, identifier: &str) -> Result<Offset, AuditorError> {
        let offsets = self.offsets.read().map_err(|_| AuditorError::Poisoned)?;
        Ok(offsets.get(identifier).cloned().unwrap_or_default())
    }

    fn commit(&self, identifier: &str, offset: Offset) -> Result<(), AuditorError> {
        let mut offsets = self.offsets.write().map_err(|_| AuditorError::Poisoned)?;
        offsets.insert(identifier.to_string(), offset);
        Ok(())
    }
}
