// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Listens on a TCP port and forwards newline-delimited lines.
//!
//! A network stream has no replayable position, so messages always carry the
//! beginning offset and the checkpoint read at start is ignored. Lines longer
//! than the frame size are forwarded in several messages.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::auditor::Offset;
use crate::config::DEFAULT_FRAME_SIZE;
use crate::pipeline::{Message, Origin};
use crate::restart::Stoppable;
use crate::sources::{LogSource, SourceConfig, SourceType, TcpConfig};
use crate::tailers::{
    forward, is_frame_complete, read_frame, trim_line_ending, Tailer, TailerError,
    TailerFactory, TailerTask,
};

#[derive(Debug, Clone, Copy)]
pub struct TcpTailerFactory {
    frame_size: usize,
}

impl TcpTailerFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }

    /// Longest line forwarded as one message; longer lines are split.
    #[must_use]
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size.max(1);
        self
    }
}

impl Default for TcpTailerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TailerFactory for TcpTailerFactory {
    type Tailer = TcpTailer;

    fn source_type(&self) -> SourceType {
        SourceType::Tcp
    }

    fn identifier(&self, source: &LogSource) -> Option<String> {
        match &source.config {
            SourceConfig::Tcp(TcpConfig {
                port: Some(port), ..
            }) => Some(format!("tcp:{port}")),
            _ => None,
        }
    }

    fn new_tailer(
        &self,
        source: Arc<LogSource>,
        output: Sender<Message>,
    ) -> Result<TcpTailer, TailerError> {
        let SourceConfig::Tcp(TcpConfig {
            port: Some(port), ..
        }) = &source.config
        else {
            return Err(TailerError::UnsupportedSource {
                name: source.name.clone(),
                expected: SourceType::Tcp,
            });
        };
        let port = u16::try_from(*port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or(TailerError::InvalidPort(*port))?;

        Ok(TcpTailer {
            identifier: format!("tcp:{port}"),
            port,
            source_name: source.name.clone(),
            output,
            frame_size: self.frame_size,
            local_addr: None,
            task: TailerTask::default(),
        })
    }
}

#[derive(Debug)]
pub struct TcpTailer {
    identifier: String,
    port: u16,
    source_name: String,
    output: Sender<Message>,
    frame_size: usize,
    local_addr: Option<SocketAddr>,
    task: TailerTask,
}

impl TcpTailer {
    /// Address the listener is bound to, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl Tailer for TcpTailer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn start(&mut self, _offset: Offset) -> Result<(), TailerError> {
        self.task.ensure_startable(&self.identifier)?;

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(|source| TailerError::Io {
                origin: format!("0.0.0.0:{}", self.port),
                source,
            })?;
        self.local_addr = listener.local_addr().ok();
        debug!("LOGS_AGENT | Listening for logs on 0.0.0.0:{}", self.port);

        let server = TcpServer {
            identifier: self.identifier.clone(),
            source_name: self.source_name.clone(),
            output: self.output.clone(),
            frame_size: self.frame_size,
            cancel_token: self.task.token(),
        };
        self.task.spawn(server.serve(listener));
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stoppable for TcpTailer {
    async fn stop(&mut self) {
        self.task.stop(&self.identifier).await;
        debug!("LOGS_AGENT | Stopped listening on port {}", self.port);
    }
}

#[derive(Clone)]
struct TcpServer {
    identifier: String,
    source_name: String,
    output: Sender<Message>,
    frame_size: usize,
    cancel_token: CancellationToken,
}

impl TcpServer {
    async fn serve(self, listener: TcpListener) {
        let mut connections = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                () = self.cancel_token.cancelled() => break,
                accepted = listener.accept() => accepted,
                Some(finished) = connections.join_next() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("LOGS_AGENT | Connection handler panicked: {:?}", e);
                        }
                    }
                    continue;
                }
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!("LOGS_AGENT | Accepted connection from {}", peer);
                    connections.spawn(self.clone().read_connection(stream, peer));
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) => {}
                Err(e) => {
                    error!(
                        "LOGS_AGENT | Failed to accept connection on {}: {}",
                        self.identifier, e
                    );
                    break;
                }
            }
        }

        // Connections observe the same token and wind down on their own.
        while connections.join_next().await.is_some() {}
    }

    async fn read_connection(self, stream: TcpStream, peer: SocketAddr) {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();

        loop {
            let read = tokio::select! {
                () = self.cancel_token.cancelled() => return,
                read = read_frame(&mut reader, &mut line, self.frame_size) => read,
            };

            match read {
                Ok(0) => {
                    debug!("LOGS_AGENT | Connection from {} closed", peer);
                    return;
                }
                // Partial line, wait for the rest of it.
                Ok(_) if !is_frame_complete(&line, self.frame_size) => {}
                Ok(_) => {
                    let content = trim_line_ending(&line);
                    if content.is_empty() {
                        line.clear();
                        continue;
                    }
                    let message = Message::new(
                        Origin {
                            identifier: self.identifier.clone(),
                            source_name: self.source_name.clone(),
                            offset: Offset::beginning(),
                        },
                        content.to_vec(),
                    );
                    line.clear();
                    if !forward(&self.output, &self.cancel_token, message).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!("LOGS_AGENT | Failed to read from {}: {}", peer, e);
                    return;
                }
            }
        }
    }
}
