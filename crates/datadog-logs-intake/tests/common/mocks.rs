// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock tailers and checkpoint stores for launcher tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use datadog_logs_intake::auditor::{AuditorError, CheckpointStore, Offset};
use datadog_logs_intake::pipeline::Message;
use datadog_logs_intake::restart::Stoppable;
use datadog_logs_intake::sources::{LogSource, SourceConfig, SourceType};
use datadog_logs_intake::tailers::{Tailer, TailerError, TailerFactory};
use tokio::sync::mpsc::Sender;

/// Records what mock tailers went through.
#[derive(Debug, Default)]
pub struct TailerRecorder {
    pub built: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub start_offsets: Mutex<HashMap<String, Offset>>,
    pub stopped: Mutex<Vec<String>>,
}

impl TailerRecorder {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn start_offset(&self, identifier: &str) -> Option<Offset> {
        self.start_offsets
            .lock()
            .expect("recorder lock")
            .get(identifier)
            .cloned()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().expect("recorder lock").clone()
    }
}

/// Factory claiming file sources and building [`MockTailer`]s.
#[derive(Debug, Clone, Default)]
pub struct MockTailerFactory {
    pub recorder: Arc<TailerRecorder>,
    pub failing: HashSet<String>,
    pub stop_delay: Duration,
    pub max_tailers: Option<usize>,
}

impl MockTailerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `start` fail for the tailer of `identifier`.
    pub fn failing_on(mut self, identifier: &str) -> Self {
        self.failing.insert(identifier.to_string());
        self
    }

    pub fn with_stop_delay(mut self, stop_delay: Duration) -> Self {
        self.stop_delay = stop_delay;
        self
    }

    pub fn with_max_tailers(mut self, max_tailers: usize) -> Self {
        self.max_tailers = Some(max_tailers);
        self
    }
}

impl TailerFactory for MockTailerFactory {
    type Tailer = MockTailer;

    fn source_type(&self) -> SourceType {
        SourceType::File
    }

    fn identifier(&self, source: &LogSource) -> Option<String> {
        match &source.config {
            SourceConfig::File(config) => Some(format!("mock:{}", config.path)),
            _ => None,
        }
    }

    fn max_tailers(&self) -> Option<usize> {
        self.max_tailers
    }

    fn new_tailer(
        &self,
        source: Arc<LogSource>,
        _output: Sender<Message>,
    ) -> Result<MockTailer, TailerError> {
        let identifier = self
            .identifier(&source)
            .ok_or_else(|| TailerError::UnsupportedSource {
                name: source.name.clone(),
                expected: SourceType::File,
            })?;
        self.recorder.built.fetch_add(1, Ordering::SeqCst);
        Ok(MockTailer {
            fail_start: self.failing.contains(&identifier),
            identifier,
            recorder: Arc::clone(&self.recorder),
            stop_delay: self.stop_delay,
        })
    }
}

#[derive(Debug)]
pub struct MockTailer {
    identifier: String,
    recorder: Arc<TailerRecorder>,
    fail_start: bool,
    stop_delay: Duration,
}

#[async_trait::async_trait]
impl Tailer for MockTailer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn start(&mut self, offset: Offset) -> Result<(), TailerError> {
        if self.fail_start {
            return Err(TailerError::Io {
                origin: self.identifier.clone(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        self.recorder.starts.fetch_add(1, Ordering::SeqCst);
        self.recorder
            .start_offsets
            .lock()
            .expect("recorder lock")
            .insert(self.identifier.clone(), offset);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stoppable for MockTailer {
    async fn stop(&mut self) {
        tokio::time::sleep(self.stop_delay).await;
        self.recorder.stops.fetch_add(1, Ordering::SeqCst);
        self.recorder
            .stopped
            .lock()
            .expect("recorder lock")
            .push(self.identifier.clone());
    }
}

/// Checkpoint store whose backing storage cannot be read.
#[derive(Debug, Default)]
pub struct UnreadableCheckpointStore;

impl CheckpointStore for UnreadableCheckpointStore {
    fn get_last_committed_offset(&self, _identifier: &str) -> Result<Offset, AuditorError> {
        Err(AuditorError::Unreadable("disk on fire".to_string()))
    }

    fn commit(&self, _identifier: &str, _offset: Offset) -> Result<(), AuditorError> {
        Err(AuditorError::Unreadable("disk on fire".to_string()))
    }
}
