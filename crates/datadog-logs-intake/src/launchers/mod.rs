// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-origin-type supervision of tailers.
//!
//! A [`Launcher`] reconciles the valid sources of its type against the
//! tailers it runs. The origin-specific parts live in the [`TailerFactory`]
//! it is built with, so reconciliation and shutdown are written once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auditor::{AuditorError, CheckpointStore};
use crate::pipeline::Provider;
use crate::restart::{ParallelStopper, Restartable, Stoppable};
use crate::sources::{LogSource, LogSources, SourceType};
use crate::tailers::{Tailer, TailerError, TailerFactory};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("source '{name}' carries no {source_type} addressing")]
    NoIdentity {
        name: String,
        source_type: SourceType,
    },
    #[error("already running {limit} {source_type} tailer(s), the most allowed")]
    LimitReached {
        limit: usize,
        source_type: SourceType,
    },
    #[error("failed to read checkpoint: {0}")]
    Checkpoint(#[from] AuditorError),
    #[error(transparent)]
    Tailer(#[from] TailerError),
}

/// Starts one tailer per distinct origin of type `F::source_type()` and stops
/// them all on shutdown.
pub struct Launcher<F: TailerFactory> {
    sources: Arc<LogSources>,
    pipeline_provider: Arc<Provider>,
    auditor: Arc<dyn CheckpointStore>,
    factory: F,
    tailers: Mutex<HashMap<String, F::Tailer>>,
    stop_grace_period: Option<Duration>,
}

impl<F: TailerFactory> Launcher<F> {
    #[must_use]
    pub fn new(
        sources: Arc<LogSources>,
        pipeline_provider: Arc<Provider>,
        auditor: Arc<dyn CheckpointStore>,
        factory: F,
    ) -> Self {
        Self {
            sources,
            pipeline_provider,
            auditor,
            factory,
            tailers: Mutex::new(HashMap::new()),
            stop_grace_period: None,
        }
    }

    /// Bounds how long `stop` waits for each tailer. `None` waits forever.
    #[must_use]
    pub fn with_stop_grace_period(mut self, stop_grace_period: Option<Duration>) -> Self {
        self.stop_grace_period = stop_grace_period;
        self
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.factory.source_type()
    }

    /// Starts a tailer for every valid source of this launcher's type that is
    /// not tailed yet.
    ///
    /// A source that fails to launch is logged and skipped; it is tried again
    /// on the next call. Once the factory's tailer limit is reached, every
    /// remaining source fails to launch.
    pub async fn start(&self) {
        let sources = self
            .sources
            .get_valid_sources_with_type(self.factory.source_type());
        let mut tailers = self.tailers.lock().await;

        for source in sources {
            let Some(identifier) = self.factory.identifier(&source) else {
                warn!(
                    "LOGS_AGENT | {}",
                    LaunchError::NoIdentity {
                        name: source.name.clone(),
                        source_type: self.factory.source_type(),
                    }
                );
                continue;
            };
            if tailers.contains_key(&identifier) {
                debug!("LOGS_AGENT | Already tailing {}", identifier);
                continue;
            }

            let launched = match self.factory.max_tailers() {
                Some(limit) if tailers.len() >= limit => Err(LaunchError::LimitReached {
                    limit,
                    source_type: self.factory.source_type(),
                }),
                _ => self.launch(Arc::clone(&source)).await,
            };
            match launched {
                Ok(tailer) => {
                    info!(
                        "LOGS_AGENT | Started tailing {} for source '{}'",
                        identifier, source.name
                    );
                    tailers.insert(identifier, tailer);
                }
                Err(e) => warn!(
                    "LOGS_AGENT | Could not start tailing source '{}': {}",
                    source.name, e
                ),
            }
        }
    }

    async fn launch(&self, source: Arc<LogSource>) -> Result<F::Tailer, LaunchError> {
        let output = self.pipeline_provider.next_pipeline_chan();
        let mut tailer = self.factory.new_tailer(source, output)?;
        let offset = self.auditor.get_last_committed_offset(tailer.identifier())?;
        tailer.start(offset).await?;
        Ok(tailer)
    }

    /// Stops every running tailer concurrently and returns once all of them
    /// have stopped or outlived the grace period.
    pub async fn stop(&self) {
        let mut tailers = self.tailers.lock().await;
        if tailers.is_empty() {
            return;
        }

        let mut stopper = ParallelStopper::with_timeout(self.stop_grace_period);
        for (_, tailer) in tailers.drain() {
            stopper.add(tailer);
        }
        info!(
            "LOGS_AGENT | Stopping {} {} tailer(s)",
            stopper.len(),
            self.factory.source_type()
        );
        stopper.stop().await;
    }

    pub async fn tailer_count(&self) -> usize {
        self.tailers.lock().await.len()
    }

    pub async fn is_tailing(&self, identifier: &str) -> bool {
        self.tailers.lock().await.contains_key(identifier)
    }
}

#[async_trait::async_trait]
impl<F: TailerFactory> Stoppable for Launcher<F> {
    async fn stop(&mut self) {
        Launcher::stop(self).await;
    }
}

#[async_trait::async_trait]
impl<F: TailerFactory> Restartable for Launcher<F> {
    async fn start(&mut self) {
        Launcher::start(self).await;
    }
}
