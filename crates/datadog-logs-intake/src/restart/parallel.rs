// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::restart::Stoppable;

/// Stops every registered resource concurrently and waits for all of them.
///
/// Total shutdown time is bounded by the slowest resource, not the sum. With
/// a timeout set, a resource that does not stop in time is logged and
/// abandoned so one wedged origin cannot hold the whole shutdown.
#[derive(Default)]
pub struct ParallelStopper {
    resources: Vec<Box<dyn Stoppable>>,
    timeout: Option<Duration>,
}

impl ParallelStopper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each resource's stop to `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            resources: Vec::new(),
            timeout,
        }
    }

    pub fn add<S>(&mut self, resource: S)
    where
        S: Stoppable + 'static,
    {
        self.resources.push(Box::new(resource));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Stops all registered resources and returns once each one has stopped
    /// or, when a timeout is set, been abandoned.
    pub async fn stop(self) {
        let count = self.resources.len();
        let timeout = self.timeout;
        let mut joinset = JoinSet::new();

        for mut resource in self.resources {
            joinset.spawn(async move {
                match timeout {
                    Some(timeout) => tokio::time::timeout(timeout, resource.stop())
                        .await
                        .is_ok(),
                    None => {
                        resource.stop().await;
                        true
                    }
                }
            });
        }

        while let Some(result) = joinset.join_next().await {
            match result {
                Ok(true) => {}
                Ok(false) => warn!(
                    "LOGS_AGENT | Resource did not stop within {:?}, abandoning it",
                    timeout.unwrap_or_default()
                ),
                Err(e) if e.is_panic() => {
                    error!("LOGS_AGENT | Resource panicked while stopping: {:?}", e);
                }
                Err(_) => {}
            }
        }
        debug!("LOGS_AGENT | Stopped {} resource(s)", count);
    }
}
