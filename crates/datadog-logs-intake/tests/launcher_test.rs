// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::helpers::{file_source, next_message, provider, registry, tcp_source};
use common::mocks::{MockTailerFactory, UnreadableCheckpointStore};
use datadog_logs_intake::auditor::{CheckpointStore, InMemoryAuditor, Offset};
use datadog_logs_intake::launchers::Launcher;
use datadog_logs_intake::pipeline::Provider;
use datadog_logs_intake::restart::{ParallelStopper, Restartable, Stoppable};
use datadog_logs_intake::sources::LogSource;
use datadog_logs_intake::tailers::FileTailerFactory;
use tempfile::TempDir;
use tracing_test::traced_test;

fn launcher(
    sources: Vec<LogSource>,
    auditor: Arc<dyn CheckpointStore>,
    factory: MockTailerFactory,
) -> Launcher<MockTailerFactory> {
    let (provider, _receivers) = provider();
    Launcher::new(registry(sources), provider, auditor, factory)
}

fn three_files() -> Vec<LogSource> {
    vec![
        file_source("a", "/var/log/a.log"),
        file_source("b", "/var/log/b.log"),
        file_source("c", "/var/log/c.log"),
    ]
}

#[tokio::test]
async fn test_start_launches_valid_sources_of_its_type_only() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(
        vec![
            file_source("a", "/var/log/a.log"),
            file_source("blank", " "),
            tcp_source("tcp_forward", 10514),
        ],
        Arc::new(InMemoryAuditor::new()),
        factory,
    );

    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 1);
    assert!(launcher.is_tailing("mock:/var/log/a.log").await);
    assert_eq!(recorder.starts(), 1);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);

    launcher.start().await;
    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 3);
    assert_eq!(recorder.starts(), 3);
}

#[tokio::test]
async fn test_concurrent_starts_never_duplicate_tailers() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = Arc::new(launcher(
        three_files(),
        Arc::new(InMemoryAuditor::new()),
        factory,
    ));

    let first = tokio::spawn({
        let launcher = Arc::clone(&launcher);
        async move { launcher.start().await }
    });
    let second = tokio::spawn({
        let launcher = Arc::clone(&launcher);
        async move { launcher.start().await }
    });
    first.await.expect("first start");
    second.await.expect("second start");

    assert_eq!(launcher.tailer_count().await, 3);
    assert_eq!(recorder.starts(), 3);
}

#[tokio::test]
async fn test_sources_for_the_same_origin_share_one_tailer() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(
        vec![
            file_source("app", "/var/log/app.log"),
            file_source("app-again", "/var/log/app.log"),
        ],
        Arc::new(InMemoryAuditor::new()),
        factory,
    );

    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 1);
    assert_eq!(recorder.starts(), 1);
}

#[tokio::test]
async fn test_tailers_resume_from_committed_offset() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let auditor = Arc::new(InMemoryAuditor::with_offsets([(
        "mock:/var/log/b.log",
        Offset::from(42),
    )]));
    let launcher = launcher(three_files(), auditor, factory);

    launcher.start().await;

    assert_eq!(
        recorder.start_offset("mock:/var/log/b.log"),
        Some(Offset::from(42))
    );
    assert_eq!(
        recorder.start_offset("mock:/var/log/a.log"),
        Some(Offset::beginning())
    );
}

#[tokio::test]
async fn test_stop_stops_every_tailer_exactly_once() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);

    launcher.start().await;
    launcher.stop().await;

    assert_eq!(launcher.tailer_count().await, 0);
    assert_eq!(recorder.stops(), 3);
    let mut stopped = recorder.stopped();
    stopped.sort();
    assert_eq!(
        stopped,
        vec![
            "mock:/var/log/a.log",
            "mock:/var/log/b.log",
            "mock:/var/log/c.log"
        ]
    );

    launcher.stop().await;
    assert_eq!(recorder.stops(), 3);
}

#[tokio::test]
async fn test_stop_runs_tailer_stops_concurrently() {
    let factory = MockTailerFactory::new().with_stop_delay(Duration::from_millis(200));
    let recorder = Arc::clone(&factory.recorder);
    let sources = (0..5)
        .map(|i| file_source(&format!("f{i}"), &format!("/var/log/{i}.log")))
        .collect();
    let launcher = launcher(sources, Arc::new(InMemoryAuditor::new()), factory);
    launcher.start().await;

    let started = Instant::now();
    launcher.stop().await;
    let elapsed = started.elapsed();

    assert_eq!(recorder.stops(), 5);
    assert!(
        elapsed < Duration::from_millis(800),
        "tailers were stopped one by one: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_stop_grace_period_bounds_wedged_tailers() {
    let factory = MockTailerFactory::new().with_stop_delay(Duration::from_secs(60));
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory)
        .with_stop_grace_period(Some(Duration::from_millis(50)));
    launcher.start().await;

    tokio::time::timeout(Duration::from_secs(5), launcher.stop())
        .await
        .expect("stop bounded by the grace period");
    assert_eq!(launcher.tailer_count().await, 0);
}

#[tokio::test]
async fn test_start_after_stop_builds_fresh_tailers() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);

    launcher.start().await;
    launcher.stop().await;
    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 3);
    assert_eq!(recorder.built.load(std::sync::atomic::Ordering::SeqCst), 6);
    assert_eq!(recorder.starts(), 6);
}

#[tokio::test]
#[traced_test]
async fn test_one_failing_source_does_not_block_the_others() {
    let factory = MockTailerFactory::new().failing_on("mock:/var/log/b.log");
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);

    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 2);
    assert!(launcher.is_tailing("mock:/var/log/a.log").await);
    assert!(!launcher.is_tailing("mock:/var/log/b.log").await);
    assert!(launcher.is_tailing("mock:/var/log/c.log").await);
    assert_eq!(recorder.starts(), 2);
    assert!(logs_contain("Could not start tailing source 'b'"));
}

#[tokio::test]
#[traced_test]
async fn test_tailer_limit_fails_the_remaining_sources() {
    let factory = MockTailerFactory::new().with_max_tailers(2);
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);

    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 2);
    assert!(launcher.is_tailing("mock:/var/log/a.log").await);
    assert!(launcher.is_tailing("mock:/var/log/b.log").await);
    assert!(!launcher.is_tailing("mock:/var/log/c.log").await);
    assert_eq!(recorder.starts(), 2);
    assert!(logs_contain("Could not start tailing source 'c'"));
    assert!(logs_contain("already running 2 file tailer(s)"));

    launcher.start().await;
    assert_eq!(launcher.tailer_count().await, 2);
    assert_eq!(recorder.starts(), 2);
}

#[tokio::test]
async fn test_path_spellings_of_one_file_share_one_tailer() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("app.log");
    std::fs::write(&path, "one\n").expect("write");
    let plain = path.display().to_string();
    let dotted = dir.path().join(".").join("app.log").display().to_string();
    assert_ne!(plain, dotted);

    let (provider, mut receivers) = Provider::new(1, 16);
    let launcher = Launcher::new(
        registry(vec![
            file_source("plain", &plain),
            file_source("dotted", &dotted),
        ]),
        Arc::new(provider),
        Arc::new(InMemoryAuditor::new()),
        FileTailerFactory::with_poll_interval(Duration::from_millis(10)),
    );

    launcher.start().await;
    assert_eq!(launcher.tailer_count().await, 1);

    let message = next_message(&mut receivers[0]).await;
    assert_eq!(message.content, b"one");
    assert!(
        tokio::time::timeout(Duration::from_millis(200), receivers[0].recv())
            .await
            .is_err(),
        "the line is delivered once"
    );

    launcher.stop().await;
}

#[tokio::test]
#[traced_test]
async fn test_unreadable_checkpoint_fails_the_launch() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(UnreadableCheckpointStore), factory);

    launcher.start().await;

    assert_eq!(launcher.tailer_count().await, 0);
    assert_eq!(recorder.starts(), 0);
    assert!(logs_contain("failed to read checkpoint"));
}

#[tokio::test]
async fn test_launcher_is_stoppable_through_the_trait() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);
    launcher.start().await;

    let mut stopper = ParallelStopper::new();
    stopper.add(launcher);
    stopper.stop().await;

    assert_eq!(recorder.stops(), 3);
}

#[tokio::test]
async fn test_launcher_restarts_through_the_trait() {
    let factory = MockTailerFactory::new();
    let recorder = Arc::clone(&factory.recorder);
    let mut launcher = launcher(three_files(), Arc::new(InMemoryAuditor::new()), factory);

    Restartable::start(&mut launcher).await;
    Stoppable::stop(&mut launcher).await;
    Restartable::start(&mut launcher).await;

    assert_eq!(launcher.tailer_count().await, 3);
    assert_eq!(recorder.starts(), 6);
    assert_eq!(recorder.stops(), 3);
}
