// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Follows the systemd journal through `journalctl --output=json`.
//!
//! The checkpoint is the entry's `__CURSOR`. Without one, only entries written
//! after start are read.

use std::ffi::OsString;
use std::process::Stdio;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auditor::Offset;
use crate::pipeline::{Message, Origin};
use crate::restart::Stoppable;
use crate::sources::{JournaldConfig, LogSource, SourceConfig, SourceType};
use crate::tailers::{forward, Tailer, TailerError, TailerFactory, TailerTask};

pub const DEFAULT_JOURNALCTL: &str = "journalctl";

const CURSOR_FIELD: &str = "__CURSOR";
const MESSAGE_FIELD: &str = "MESSAGE";

#[derive(Debug, Clone)]
pub struct JournaldTailerFactory {
    program: OsString,
}

impl JournaldTailerFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DEFAULT_JOURNALCTL)
    }

    /// Uses `program` instead of `journalctl` from `PATH`.
    #[must_use]
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for JournaldTailerFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn journald_identifier(config: &JournaldConfig) -> String {
    match &config.path {
        Some(path) => format!("journald:{path}"),
        None => "journald:default".to_string(),
    }
}

impl TailerFactory for JournaldTailerFactory {
    type Tailer = JournaldTailer;

    fn source_type(&self) -> SourceType {
        SourceType::Journald
    }

    fn identifier(&self, source: &LogSource) -> Option<String> {
        match &source.config {
            SourceConfig::Journald(config) => Some(journald_identifier(config)),
            _ => None,
        }
    }

    fn new_tailer(
        &self,
        source: Arc<LogSource>,
        output: Sender<Message>,
    ) -> Result<JournaldTailer, TailerError> {
        let SourceConfig::Journald(config) = &source.config else {
            return Err(TailerError::UnsupportedSource {
                name: source.name.clone(),
                expected: SourceType::Journald,
            });
        };

        Ok(JournaldTailer {
            identifier: journald_identifier(config),
            directory: config.path.clone(),
            source_name: source.name.clone(),
            program: self.program.clone(),
            output,
            task: TailerTask::default(),
        })
    }
}

#[derive(Debug)]
pub struct JournaldTailer {
    identifier: String,
    directory: Option<String>,
    source_name: String,
    program: OsString,
    output: Sender<Message>,
    task: TailerTask,
}

#[async_trait::async_trait]
impl Tailer for JournaldTailer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn start(&mut self, offset: Offset) -> Result<(), TailerError> {
        self.task.ensure_startable(&self.identifier)?;

        let args = journalctl_args(self.directory.as_deref(), &offset);
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TailerError::Io {
                origin: self.identifier.clone(),
                source,
            })?;
        debug!(
            "LOGS_AGENT | Following {} from {}",
            self.identifier, offset
        );

        let Some(stdout) = child.stdout.take() else {
            if let Err(e) = child.kill().await {
                debug!(
                    "LOGS_AGENT | Failed to kill journalctl for {}: {}",
                    self.identifier, e
                );
            }
            return Err(TailerError::Io {
                origin: self.identifier.clone(),
                source: std::io::Error::other("journalctl stdout was not captured"),
            });
        };

        let reader = JournalReader {
            identifier: self.identifier.clone(),
            source_name: self.source_name.clone(),
            output: self.output.clone(),
            cancel_token: self.task.token(),
        };
        self.task.spawn(reader.run(child, BufReader::new(stdout)));
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stoppable for JournaldTailer {
    async fn stop(&mut self) {
        self.task.stop(&self.identifier).await;
        debug!("LOGS_AGENT | Stopped following {}", self.identifier);
    }
}

/// Arguments passed to `journalctl` for a journal directory and checkpoint.
fn journalctl_args(directory: Option<&str>, offset: &Offset) -> Vec<String> {
    let mut args = vec!["--follow".to_string(), "--output=json".to_string()];
    if let Some(directory) = directory {
        args.push(format!("--directory={directory}"));
    }
    if offset.is_beginning() {
        args.push("--since=now".to_string());
    } else {
        args.push(format!("--after-cursor={}", offset.as_str()));
    }
    args
}

/// Extracts the message payload and cursor from one JSON export line.
///
/// `MESSAGE` is a string, or an array of bytes when the entry is not valid
/// UTF-8.
fn parse_entry(line: &str) -> Option<(Vec<u8>, Offset)> {
    let entry: Value = serde_json::from_str(line).ok()?;
    let cursor = entry.get(CURSOR_FIELD)?.as_str()?;
    let content = match entry.get(MESSAGE_FIELD)? {
        Value::String(message) => message.as_bytes().to_vec(),
        Value::Array(bytes) => bytes
            .iter()
            .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()?,
        _ => return None,
    };
    Some((content, Offset::new(cursor)))
}

struct JournalReader {
    identifier: String,
    source_name: String,
    output: Sender<Message>,
    cancel_token: CancellationToken,
}

impl JournalReader {
    async fn run(self, mut child: Child, stdout: BufReader<tokio::process::ChildStdout>) {
        let mut lines = stdout.lines();
        loop {
            let line = tokio::select! {
                () = self.cancel_token.cancelled() => break,
                line = lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) => {
                    let Some((content, cursor)) = parse_entry(&line) else {
                        debug!(
                            "LOGS_AGENT | Skipping unparseable journal entry from {}",
                            self.identifier
                        );
                        continue;
                    };
                    let message = Message::new(
                        Origin {
                            identifier: self.identifier.clone(),
                            source_name: self.source_name.clone(),
                            offset: cursor,
                        },
                        content,
                    );
                    if !forward(&self.output, &self.cancel_token, message).await {
                        break;
                    }
                }
                Ok(None) => {
                    warn!("LOGS_AGENT | journalctl exited for {}", self.identifier);
                    break;
                }
                Err(e) => {
                    warn!("LOGS_AGENT | Failed to read journal {}: {}", self.identifier, e);
                    break;
                }
            }
        }

        if let Err(e) = child.kill().await {
            debug!("LOGS_AGENT | Failed to kill journalctl for {}: {}", self.identifier, e);
        }
    }
}
