// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable checkpoint registry persisted as JSON.
//!
//! The registry lives at `<run_path>/registry.json`:
//!
//! ```json
//! {
//!   "Version": 2,
//!   "Registry": {
//!     "file:/var/log/app.log": { "Offset": "1024", "LastUpdated": "2025-01-01T00:00:00Z" }
//!   }
//! }
//! ```
//!
//! Commits land in memory and are written out by a periodic flush task and on
//! stop, both on the blocking thread pool. Writes go to a temporary file that
//! is then renamed over the registry, so a crash mid-write leaves the previous
//! registry intact.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::auditor::{AuditorError, CheckpointStore, Offset};

pub const REGISTRY_VERSION: u32 = 2;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RegistryEntry {
    #[serde(rename = "Offset")]
    offset: Offset,
    #[serde(rename = "LastUpdated", with = "time::serde::rfc3339")]
    last_updated: OffsetDateTime,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(rename = "Version")]
    version: u32,
    #[serde(rename = "Registry")]
    registry: HashMap<String, RegistryEntry>,
}

/// Checkpoint store backed by a JSON file.
#[derive(Debug)]
pub struct Auditor {
    path: PathBuf,
    registry: RwLock<HashMap<String, RegistryEntry>>,
    /// Set when the registry on disk could not be loaded. Reads fail instead
    /// of pretending every origin starts from the beginning.
    load_error: Option<String>,
    dirty: AtomicBool,
    flush_interval: Duration,
    cancel_token: CancellationToken,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl Auditor {
    /// Opens the registry at `path`. A missing file is an empty registry.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_flush_interval(path, DEFAULT_FLUSH_INTERVAL)
    }

    #[must_use]
    pub fn with_flush_interval(path: impl AsRef<Path>, flush_interval: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let (registry, load_error) = match load_registry(&path) {
            Ok(registry) => (registry, None),
            Err(e) => {
                error!(
                    "LOGS_AGENT | Failed to load checkpoint registry {}: {}",
                    path.display(),
                    e
                );
                (HashMap::new(), Some(e.to_string()))
            }
        };

        Self {
            path,
            registry: RwLock::new(registry),
            load_error,
            dirty: AtomicBool::new(false),
            flush_interval,
            cancel_token: CancellationToken::new(),
            flush_task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spawns the periodic flush task. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut flush_task) = self.flush_task.lock() else {
            error!("LOGS_AGENT | Auditor flush task lock poisoned, not starting");
            return;
        };
        if flush_task.is_some() {
            return;
        }

        let auditor = Arc::clone(self);
        *flush_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(auditor.flush_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = auditor.flush_in_background().await {
                            warn!("LOGS_AGENT | Failed to flush checkpoint registry: {}", e);
                        }
                    }
                    () = auditor.cancel_token.cancelled() => break,
                }
            }
        }));
    }

    /// Stops the flush task and writes the registry one last time.
    pub async fn stop(self: &Arc<Self>) {
        self.cancel_token.cancel();

        let handle = match self.flush_task.lock() {
            Ok(mut flush_task) => flush_task.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("LOGS_AGENT | Auditor flush task failed: {:?}", e);
            }
        }

        if let Err(e) = self.flush_in_background().await {
            error!("LOGS_AGENT | Final checkpoint registry flush failed: {}", e);
        }
    }

    /// Runs [`Auditor::flush`] on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns the flush error, or [`AuditorError::FlushTask`] if the blocking
    /// task did not complete.
    pub async fn flush_in_background(self: &Arc<Self>) -> Result<(), AuditorError> {
        let auditor = Arc::clone(self);
        match tokio::task::spawn_blocking(move || auditor.flush()).await {
            Ok(result) => result,
            Err(e) => Err(AuditorError::FlushTask(e.to_string())),
        }
    }

    /// Writes the registry to disk if anything was committed since the last flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be serialized or written.
    pub fn flush(&self) -> Result<(), AuditorError> {
        if self.load_error.is_some() {
            // Leave the unreadable registry on disk for inspection.
            return Ok(());
        }
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let file = {
            let registry = self.registry.read().map_err(|_| AuditorError::Poisoned)?;
            RegistryFile {
                version: REGISTRY_VERSION,
                registry: registry.clone(),
            }
        };

        if let Err(e) = atomic_write(&self.path, &file) {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        debug!(
            "LOGS_AGENT | Flushed {} checkpoint(s) to {}",
            file.registry.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl CheckpointStore for Auditor {
    fn get_last_committed_offset(&self, identifier: &str) -> Result<Offset, AuditorError> {
        if let Some(reason) = &self.load_error {
            return Err(AuditorError::Unreadable(reason.clone()));
        }
        let registry = self.registry.read().map_err(|_| AuditorError::Poisoned)?;
        Ok(registry
            .get(identifier)
            .map(|entry| entry.offset.clone())
            .unwrap_or_default())
    }

    fn commit(&self, identifier: &str, offset: Offset) -> Result<(), AuditorError> {
        if let Some(reason) = &self.load_error {
            return Err(AuditorError::Unreadable(reason.clone()));
        }
        let mut registry = self.registry.write().map_err(|_| AuditorError::Poisoned)?;
        registry.insert(
            identifier.to_string(),
            RegistryEntry {
                offset,
                last_updated: OffsetDateTime::now_utc(),
            },
        );
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }
}

fn load_registry(path: &Path) -> Result<HashMap<String, RegistryEntry>, AuditorError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    let registry: RegistryFile = serde_json::from_reader(BufReader::new(file))?;
    if registry.version != REGISTRY_VERSION {
        return Err(AuditorError::Unreadable(format!(
            "unsupported registry version {}, expected {}",
            registry.version, REGISTRY_VERSION
        )));
    }
    Ok(registry.registry)
}

fn atomic_write(path: &Path, registry: &RegistryFile) -> Result<(), AuditorError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, registry)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
