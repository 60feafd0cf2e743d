// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod logger;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context};
use tokio::{sync::mpsc::Receiver, task::JoinSet};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use datadog_logs_intake::{
    auditor::{Auditor, CheckpointStore},
    config::{self, Config},
    launchers::Launcher,
    pipeline::{Message, Provider},
    restart::ParallelStopper,
    sources::{self, LogSources, SourceType},
    tailers::{FileTailerFactory, JournaldTailerFactory, TailerFactory, TcpTailerFactory},
};

const DEFAULT_CONFIG_DIR: &str = "/etc/datadog-agent";

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config_dir = env::var("DD_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));
    let config = config::get_config(&config_dir);

    init_logging(&config)?;
    debug!("Logging subsystem enabled");

    let sources = Arc::new(sources::build(&config));
    report_sources(&sources);

    let auditor = Arc::new(Auditor::open(config.registry_path()));
    auditor.start();

    let (provider, receivers) = Provider::new(
        config.logs_config_pipelines,
        config.logs_config_pipeline_buffer_size,
    );
    let provider = Arc::new(provider);

    let mut pipelines = JoinSet::new();
    for receiver in receivers {
        pipelines.spawn(drain_pipeline(receiver, Arc::clone(&auditor)));
    }

    let file_factory = FileTailerFactory::new()
        .with_frame_size(config.logs_config_frame_size)
        .with_open_files_limit(config.logs_config_open_files_limit);
    let tcp_factory = TcpTailerFactory::new().with_frame_size(config.logs_config_frame_size);

    let file_launcher = launcher(&config, &sources, &provider, &auditor, file_factory);
    let tcp_launcher = launcher(&config, &sources, &provider, &auditor, tcp_factory);
    let journald_launcher = launcher(
        &config,
        &sources,
        &provider,
        &auditor,
        JournaldTailerFactory::new(),
    );

    tokio::join!(
        file_launcher.start(),
        tcp_launcher.start(),
        journald_launcher.start()
    );
    info!("LOGS_AGENT | Logs agent started");

    wait_for_shutdown().await?;
    info!("LOGS_AGENT | Shutting down");

    let mut stopper = ParallelStopper::new();
    stopper.add(file_launcher);
    stopper.add(tcp_launcher);
    stopper.add(journald_launcher);
    stopper.stop().await;

    // Launchers are gone; dropping the provider closes every pipeline so the
    // drains commit what is left and return.
    drop(provider);
    while pipelines.join_next().await.is_some() {}

    auditor.stop().await;
    info!("LOGS_AGENT | Logs agent stopped");
    Ok(())
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_new(config.log_level.as_filter_directive())
        .context("could not parse log level in configuration")?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .event_format(logger::Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("setting default subscriber failed: {e}"))
}

fn report_sources(sources: &LogSources) {
    let valid = sources.get_valid_sources();
    info!(
        "LOGS_AGENT | {} valid log source(s), {} invalid",
        valid.len(),
        sources.len() - valid.len()
    );
    for source in sources.get_valid_sources_with_type(SourceType::Docker) {
        warn!(
            "LOGS_AGENT | Source '{}' needs the container runtime integration, \
             it will not be tailed",
            source.name
        );
    }
}

fn launcher<F: TailerFactory>(
    config: &Config,
    sources: &Arc<LogSources>,
    provider: &Arc<Provider>,
    auditor: &Arc<Auditor>,
    factory: F,
) -> Launcher<F> {
    Launcher::new(
        Arc::clone(sources),
        Arc::clone(provider),
        Arc::clone(auditor) as Arc<dyn CheckpointStore>,
        factory,
    )
    .with_stop_grace_period(config.logs_config_stop_grace_period)
}

/// Stands in for the downstream pipeline: accepts every message and commits
/// its offset.
async fn drain_pipeline(mut receiver: Receiver<Message>, auditor: Arc<Auditor>) {
    while let Some(message) = receiver.recv().await {
        debug!(
            "LOGS_AGENT | {} | {}",
            message.origin.identifier,
            String::from_utf8_lossy(&message.content)
        );
        if message.origin.offset.is_beginning() {
            continue;
        }
        if let Err(e) = auditor.commit(&message.origin.identifier, message.origin.offset) {
            warn!(
                "LOGS_AGENT | Failed to commit offset for {}: {}",
                message.origin.identifier, e
            );
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}
