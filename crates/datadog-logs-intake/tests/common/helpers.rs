// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use datadog_logs_intake::pipeline::{Message, Provider};
use datadog_logs_intake::sources::{
    FileConfig, LogSource, LogSources, SourceConfig, TcpConfig,
};
use tokio::sync::mpsc::Receiver;

pub fn file_source(name: &str, path: &str) -> LogSource {
    let mut source = LogSource::new(
        name,
        SourceConfig::File(FileConfig {
            path: path.to_string(),
            service: None,
            source: None,
        }),
    );
    source.validate();
    source
}

pub fn tcp_source(name: &str, port: i64) -> LogSource {
    let mut source = LogSource::new(
        name,
        SourceConfig::Tcp(TcpConfig {
            port: Some(port),
            service: None,
            source: None,
        }),
    );
    source.validate();
    source
}

pub fn registry(sources: Vec<LogSource>) -> Arc<LogSources> {
    Arc::new(LogSources::new(sources))
}

pub fn provider() -> (Arc<Provider>, Vec<Receiver<Message>>) {
    let (provider, receivers) = Provider::new(2, 16);
    (Arc::new(provider), receivers)
}

/// Waits for the next message on `receiver`, failing the test after 5s.
pub async fn next_message(receiver: &mut Receiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("message in time")
        .expect("pipeline open")
}
