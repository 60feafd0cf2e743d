// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Origin-specific readers.
//!
//! A [`TailerFactory`] is the per-origin-type strategy plugged into a
//! [`Launcher`](crate::launchers::Launcher): it derives the identity of a
//! source and builds the [`Tailer`] that reads it. A tailer runs as its own
//! task from `start` until `stop`, and is never restarted.

pub mod file;
pub mod journald;
pub mod tcp;

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::auditor::Offset;
use crate::pipeline::Message;
use crate::restart::Stoppable;
use crate::sources::{LogSource, SourceType};

pub use file::{FileTailer, FileTailerFactory};
pub use journald::{JournaldTailer, JournaldTailerFactory};
pub use tcp::{TcpTailer, TcpTailerFactory};

#[derive(Debug, thiserror::Error)]
pub enum TailerError {
    #[error("source '{name}' is not a {expected} source")]
    UnsupportedSource { name: String, expected: SourceType },
    #[error("tailer {0} was already started")]
    AlreadyStarted(String),
    #[error("invalid offset '{offset}' for {identifier}: {reason}")]
    InvalidOffset {
        identifier: String,
        offset: Offset,
        reason: String,
    },
    #[error("invalid port {0}")]
    InvalidPort(i64),
    #[error("failed to open {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },
}

/// A running reader bound to exactly one source.
#[async_trait::async_trait]
pub trait Tailer: Stoppable {
    /// Stable identity of the origin, also used as the checkpoint key.
    fn identifier(&self) -> &str;

    /// Opens the origin and starts reading from `offset`.
    ///
    /// # Errors
    ///
    /// Fails when the origin cannot be opened or `offset` is not meaningful
    /// for it. Nothing keeps running in that case.
    async fn start(&mut self, offset: Offset) -> Result<(), TailerError>;
}

/// Builds tailers for one origin type.
pub trait TailerFactory: Send + Sync + 'static {
    type Tailer: Tailer + 'static;

    /// The source type this factory claims.
    fn source_type(&self) -> SourceType;

    /// Derives the identity of `source` from its addressing fields, or
    /// `None` when the source is not of this factory's type.
    fn identifier(&self, source: &LogSource) -> Option<String>;

    /// Most tailers of this type that may run at once. `None` is unbounded.
    fn max_tailers(&self) -> Option<usize> {
        None
    }

    /// Builds a tailer for `source` writing into `output`.
    ///
    /// # Errors
    ///
    /// Fails when `source` cannot be tailed by this factory.
    fn new_tailer(
        &self,
        source: Arc<LogSource>,
        output: Sender<Message>,
    ) -> Result<Self::Tailer, TailerError>;
}

/// Task and cancellation plumbing shared by all tailers.
#[derive(Debug, Default)]
pub(crate) struct TailerTask {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TailerTask {
    /// A task can be started once; stopping it cancels it for good.
    pub(crate) fn ensure_startable(&self, identifier: &str) -> Result<(), TailerError> {
        if self.handle.is_some() || self.cancel_token.is_cancelled() {
            return Err(TailerError::AlreadyStarted(identifier.to_string()));
        }
        Ok(())
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle = Some(tokio::spawn(task));
    }

    pub(crate) async fn stop(&mut self, identifier: &str) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("LOGS_AGENT | Tailer {} task failed: {:?}", identifier, e);
            }
        }
    }
}

/// Pushes `message` into the pipeline, waiting while it is full.
///
/// Returns `false` once the tailer is stopping or the pipeline is gone; the
/// caller must stop reading.
pub(crate) async fn forward(
    output: &Sender<Message>,
    cancel_token: &CancellationToken,
    message: Message,
) -> bool {
    tokio::select! {
        biased;
        () = cancel_token.cancelled() => false,
        sent = output.send(message) => sent.is_ok(),
    }
}

/// Appends to `line` until a newline or until `line` holds `frame_size` bytes.
///
/// A line longer than `frame_size` therefore comes back in several frames,
/// none of which ends with a newline except the last. `Ok(0)` means end of
/// input as long as `line` was shorter than `frame_size` on entry.
pub(crate) async fn read_frame<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    frame_size: usize,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let remaining = frame_size.saturating_sub(line.len()) as u64;
    reader.take(remaining).read_until(b'\n', line).await
}

/// Whether `line` is ready to be shipped: it is complete or it fills a frame.
pub(crate) fn is_frame_complete(line: &[u8], frame_size: usize) -> bool {
    line.last() == Some(&b'\n') || line.len() >= frame_size
}

/// Drops the line terminator, `\r\n` included.
pub(crate) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Origin;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn message() -> Message {
        Message::new(
            Origin {
                identifier: "file:/tmp/a.log".to_string(),
                source_name: "a".to_string(),
                offset: Offset::from(1),
            },
            b"a".to_vec(),
        )
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending(b"hello\n"), b"hello");
        assert_eq!(trim_line_ending(b"hello\r\n"), b"hello");
        assert_eq!(trim_line_ending(b"hello"), b"hello");
        assert_eq!(trim_line_ending(b"\n"), b"");
    }

    #[tokio::test]
    async fn test_read_frame_splits_long_lines() {
        let mut input: &[u8] = b"0123456789\nab\n";
        let mut line = Vec::new();

        assert_eq!(read_frame(&mut input, &mut line, 4).await.expect("read"), 4);
        assert_eq!(line, b"0123");
        assert!(is_frame_complete(&line, 4));

        line.clear();
        read_frame(&mut input, &mut line, 4).await.expect("read");
        read_frame(&mut input, &mut line, 4).await.expect("read");
        assert_eq!(line, b"4567");

        line.clear();
        read_frame(&mut input, &mut line, 4).await.expect("read");
        assert_eq!(line, b"89\n");
        assert!(is_frame_complete(&line, 4));

        line.clear();
        read_frame(&mut input, &mut line, 4).await.expect("read");
        assert_eq!(line, b"ab\n");
        line.clear();
        assert_eq!(read_frame(&mut input, &mut line, 4).await.expect("read"), 0);
    }

    #[tokio::test]
    async fn test_read_frame_keeps_partial_lines() {
        let mut input: &[u8] = b"ab";
        let mut line = Vec::new();
        read_frame(&mut input, &mut line, 4).await.expect("read");
        assert_eq!(line, b"ab");
        assert!(!is_frame_complete(&line, 4));
    }

    #[tokio::test]
    async fn test_forward_races_cancellation_on_full_pipeline() {
        let (tx, _rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        assert!(forward(&tx, &token, message()).await);

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
        assert!(!forward(&tx, &token, message()).await);
    }

    #[tokio::test]
    async fn test_forward_fails_without_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!forward(&tx, &CancellationToken::new(), message()).await);
    }

    #[tokio::test]
    async fn test_task_cannot_be_restarted() {
        let mut task = TailerTask::default();
        task.ensure_startable("tcp:1").expect("fresh task");
        task.spawn(async {});
        assert!(task.ensure_startable("tcp:1").is_err());

        task.stop("tcp:1").await;
        assert!(task.ensure_startable("tcp:1").is_err());
    }
}
