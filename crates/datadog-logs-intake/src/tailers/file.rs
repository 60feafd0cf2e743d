// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tails a single file by byte offset.
//!
//! The checkpoint is the decimal byte position right after the last line (or
//! frame of an over-long line) handed to the pipeline. Partial trailing lines
//! are held back until their newline shows up. A file that shrinks below the
//! current position is treated as truncated and read again from the start,
//! and a file replaced at the same path (rotation) is followed from the
//! start of the new file.

use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncSeekExt, BufReader};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auditor::Offset;
use crate::config::{DEFAULT_FRAME_SIZE, DEFAULT_OPEN_FILES_LIMIT};
use crate::pipeline::{Message, Origin};
use crate::restart::Stoppable;
use crate::sources::{LogSource, SourceConfig, SourceType};
use crate::tailers::{
    forward, is_frame_complete, read_frame, trim_line_ending, Tailer, TailerError,
    TailerFactory, TailerTask,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct FileTailerFactory {
    poll_interval: Duration,
    frame_size: usize,
    open_files_limit: usize,
}

impl FileTailerFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    #[must_use]
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            frame_size: DEFAULT_FRAME_SIZE,
            open_files_limit: DEFAULT_OPEN_FILES_LIMIT,
        }
    }

    /// Longest line shipped as one message; longer lines are split.
    #[must_use]
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size.max(1);
        self
    }

    /// Most files tailed at once.
    #[must_use]
    pub fn with_open_files_limit(mut self, open_files_limit: usize) -> Self {
        self.open_files_limit = open_files_limit;
        self
    }
}

/// Identity of the file at `path`.
///
/// The path is normalized lexically so that spellings of the same path
/// (`/d/app.log`, `/d/./app.log`, `/d//app.log`) share one tailer and one
/// checkpoint. Symlinks and `..` are left alone.
#[must_use]
pub fn file_identifier(path: &str) -> String {
    format!("file:{}", normalize_path(path).display())
}

fn normalize_path(path: &str) -> PathBuf {
    Path::new(path).components().collect()
}

impl Default for FileTailerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TailerFactory for FileTailerFactory {
    type Tailer = FileTailer;

    fn source_type(&self) -> SourceType {
        SourceType::File
    }

    fn identifier(&self, source: &LogSource) -> Option<String> {
        match &source.config {
            SourceConfig::File(config) => Some(file_identifier(&config.path)),
            _ => None,
        }
    }

    fn max_tailers(&self) -> Option<usize> {
        Some(self.open_files_limit)
    }

    fn new_tailer(
        &self,
        source: Arc<LogSource>,
        output: Sender<Message>,
    ) -> Result<FileTailer, TailerError> {
        let SourceConfig::File(config) = &source.config else {
            return Err(TailerError::UnsupportedSource {
                name: source.name.clone(),
                expected: SourceType::File,
            });
        };

        Ok(FileTailer {
            identifier: file_identifier(&config.path),
            path: normalize_path(&config.path),
            source_name: source.name.clone(),
            output,
            poll_interval: self.poll_interval,
            frame_size: self.frame_size,
            task: TailerTask::default(),
        })
    }
}

#[derive(Debug)]
pub struct FileTailer {
    identifier: String,
    path: PathBuf,
    source_name: String,
    output: Sender<Message>,
    poll_interval: Duration,
    frame_size: usize,
    task: TailerTask,
}

impl FileTailer {
    fn parse_offset(&self, offset: &Offset) -> Result<u64, TailerError> {
        if offset.is_beginning() {
            return Ok(0);
        }
        offset
            .as_str()
            .parse::<u64>()
            .map_err(|e| TailerError::InvalidOffset {
                identifier: self.identifier.clone(),
                offset: offset.clone(),
                reason: e.to_string(),
            })
    }

    fn io_error(&self, source: std::io::Error) -> TailerError {
        TailerError::Io {
            origin: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl Tailer for FileTailer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn start(&mut self, offset: Offset) -> Result<(), TailerError> {
        self.task.ensure_startable(&self.identifier)?;
        let mut position = self.parse_offset(&offset)?;

        let mut file = File::open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let metadata = file.metadata().await.map_err(|e| self.io_error(e))?;
        let len = metadata.len();
        if position > len {
            warn!(
                "LOGS_AGENT | {} is shorter than its checkpoint ({} < {}), reading from the start",
                self.path.display(),
                len,
                position
            );
            position = 0;
        }
        file.seek(SeekFrom::Start(position))
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(
            "LOGS_AGENT | Tailing {} from byte {}",
            self.path.display(),
            position
        );
        let reader = FileReader {
            identifier: self.identifier.clone(),
            source_name: self.source_name.clone(),
            path: self.path.clone(),
            reader: BufReader::new(file),
            file_id: file_id(&metadata),
            position,
            output: self.output.clone(),
            poll_interval: self.poll_interval,
            frame_size: self.frame_size,
            cancel_token: self.task.token(),
        };
        self.task.spawn(reader.run());
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stoppable for FileTailer {
    async fn stop(&mut self) {
        self.task.stop(&self.identifier).await;
        debug!("LOGS_AGENT | Stopped tailing {}", self.path.display());
    }
}

struct FileReader {
    identifier: String,
    source_name: String,
    path: PathBuf,
    reader: BufReader<File>,
    file_id: Option<FileId>,
    position: u64,
    output: Sender<Message>,
    poll_interval: Duration,
    frame_size: usize,
    cancel_token: CancellationToken,
}

impl FileReader {
    async fn run(mut self) {
        let mut line = Vec::new();
        loop {
            let read = tokio::select! {
                () = self.cancel_token.cancelled() => return,
                read = read_frame(&mut self.reader, &mut line, self.frame_size) => read,
            };

            match read {
                Ok(0) => {
                    self.check_replaced(&mut line).await;
                    if !self.wait().await {
                        return;
                    }
                }
                // Partial line, wait for the rest of it.
                Ok(_) if !is_frame_complete(&line, self.frame_size) => {}
                Ok(_) => {
                    self.position += line.len() as u64;
                    let message = Message::new(
                        Origin {
                            identifier: self.identifier.clone(),
                            source_name: self.source_name.clone(),
                            offset: Offset::from(self.position),
                        },
                        trim_line_ending(&line).to_vec(),
                    );
                    line.clear();
                    if !forward(&self.output, &self.cancel_token, message).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(
                        "LOGS_AGENT | Failed to read {}: {}",
                        self.path.display(),
                        e
                    );
                    if !self.wait().await {
                        return;
                    }
                }
            }
        }
    }

    /// Called at end of file: follows a rotated file or rewinds a truncated one.
    async fn check_replaced(&mut self, pending: &mut Vec<u8>) {
        let Ok(metadata) = tokio::fs::metadata(&self.path).await else {
            return;
        };
        let current = file_id(&metadata);
        if current.is_some() && current != self.file_id {
            self.reopen(pending).await;
            return;
        }
        if metadata.len() >= self.position + pending.len() as u64 {
            return;
        }

        warn!(
            "LOGS_AGENT | {} was truncated, reading from the start",
            self.path.display()
        );
        match self.reader.seek(SeekFrom::Start(0)).await {
            Ok(_) => {
                self.position = 0;
                pending.clear();
            }
            Err(e) => warn!(
                "LOGS_AGENT | Failed to rewind {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    async fn reopen(&mut self, pending: &mut Vec<u8>) {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    "LOGS_AGENT | Failed to reopen rotated {}: {}",
                    self.path.display(),
                    e
                );
                return;
            }
        };
        let file_id = match file.metadata().await {
            Ok(metadata) => file_id(&metadata),
            Err(_) => None,
        };

        info!(
            "LOGS_AGENT | {} was rotated, following the new file",
            self.path.display()
        );
        if !pending.is_empty() {
            debug!(
                "LOGS_AGENT | Dropping {} byte(s) of unterminated line from the rotated {}",
                pending.len(),
                self.path.display()
            );
            pending.clear();
        }
        self.reader = BufReader::new(file);
        self.file_id = file_id;
        self.position = 0;
    }

    /// Sleeps for one poll interval; `false` when stopping.
    async fn wait(&self) -> bool {
        tokio::select! {
            () = self.cancel_token.cancelled() => false,
            () = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}

/// Device and inode of a file, stable across renames.
type FileId = (u64, u64);

#[cfg(unix)]
fn file_id(metadata: &Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_id(_metadata: &Metadata) -> Option<FileId> {
    None
}
