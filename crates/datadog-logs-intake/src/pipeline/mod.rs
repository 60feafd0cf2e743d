// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion side of the processing pipelines.
//!
//! Tailers push [`Message`]s into one of a fixed pool of bounded channels
//! handed out by the [`Provider`]. What happens after the channel is the
//! downstream pipeline's business; it is expected to commit
//! [`Origin::offset`] to the checkpoint store once a message is accepted.

mod provider;

use std::time::SystemTime;

use crate::auditor::Offset;

pub use provider::Provider;

/// Where a message was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Tailer identity, also the checkpoint key.
    pub identifier: String,
    pub source_name: String,
    /// Position to commit once this message has been processed.
    pub offset: Offset,
}

/// A raw log line as read from its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub origin: Origin,
    pub content: Vec<u8>,
    pub timestamp: SystemTime,
}

impl Message {
    #[must_use]
    pub fn new(origin: Origin, content: Vec<u8>) -> Self {
        Self {
            origin,
            content,
            timestamp: SystemTime::now(),
        }
    }
}
