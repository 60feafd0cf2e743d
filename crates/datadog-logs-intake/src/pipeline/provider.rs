// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

use crate::config::{DEFAULT_PIPELINES, DEFAULT_PIPELINE_BUFFER_SIZE};
use crate::pipeline::Message;

/// Hands out pipeline channels round-robin.
///
/// A tailer keeps the sender it was given for its whole lifetime, so a
/// saturated pipeline only slows down the origins assigned to it.
#[derive(Debug)]
pub struct Provider {
    senders: Vec<Sender<Message>>,
    next: AtomicUsize,
}

impl Provider {
    /// Creates `pipelines` bounded channels of `buffer_size` messages each and
    /// returns the receiving ends, one per pipeline. Zero values fall back to
    /// the defaults.
    #[must_use]
    pub fn new(pipelines: usize, buffer_size: usize) -> (Self, Vec<Receiver<Message>>) {
        let pipelines = if pipelines == 0 {
            DEFAULT_PIPELINES
        } else {
            pipelines
        };
        let buffer_size = if buffer_size == 0 {
            DEFAULT_PIPELINE_BUFFER_SIZE
        } else {
            buffer_size
        };

        let (senders, receivers): (Vec<Sender<Message>>, Vec<Receiver<Message>>) =
            (0..pipelines).map(|_| mpsc::channel(buffer_size)).unzip();
        debug!(
            "LOGS_AGENT | Created {} pipeline(s) with a buffer of {} message(s)",
            pipelines, buffer_size
        );

        (
            Self {
                senders,
                next: AtomicUsize::new(0),
            },
            receivers,
        )
    }

    /// Returns the next pipeline channel.
    #[must_use]
    pub fn next_pipeline_chan(&self) -> Sender<Message> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[index].clone()
    }

    #[must_use]
    pub fn pipelines(&self) -> usize {
        self.senders.len()
    }
}
