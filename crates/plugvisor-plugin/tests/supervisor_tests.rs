// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-restart loop and shutdown behaviour of the process supervisor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use plugvisor_core::{BackendPlugin, PluginClass, PluginType, PlugvisorError, Result};
use plugvisor_plugin::supervisor::restart_killed_process;
use plugvisor_plugin::{Plugin, PluginMetadata, ProcessState, ProcessSupervisor};
use plugvisor_test_utils::MockBackend;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn backend_plugin(id: &str, backend: Arc<MockBackend>) -> Arc<Plugin> {
    let plugin = Plugin::new(
        id,
        PluginType::Datasource,
        PluginClass::External,
        format!("/plugins/{id}"),
        PluginMetadata {
            backend: true,
            executable: "gpx_mock".into(),
            ..Default::default()
        },
    );
    plugin.set_client(backend).unwrap();
    Arc::new(plugin)
}

fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new(Duration::from_secs(1), Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn restarts_on_every_exit_until_decommissioned() {
    let backend = Arc::new(MockBackend::new("acme"));
    let plugin = backend_plugin("acme", backend.clone());
    let supervisor = supervisor();

    supervisor.start(&plugin).await.unwrap();
    assert_eq!(backend.start_count(), 1);
    assert_eq!(plugin.state(), ProcessState::Running);

    backend.kill();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(backend.start_count(), 2);
    assert_eq!(plugin.state(), ProcessState::Running);

    backend.kill();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.start_count(), 3);

    plugin.decommission();
    backend.kill();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(backend.start_count(), 3);
    assert_eq!(plugin.state(), ProcessState::Stopped);
    assert_eq!(supervisor.active_loops(), 0);
}

#[tokio::test(start_paused = true)]
async fn running_process_is_not_restarted() {
    let backend = Arc::new(MockBackend::new("acme"));
    let plugin = backend_plugin("acme", backend.clone());
    let supervisor = supervisor();

    supervisor.start(&plugin).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.start_count(), 1);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn failed_restarts_are_retried() {
    let backend = Arc::new(MockBackend::new("acme"));
    let plugin = backend_plugin("acme", backend.clone());
    let supervisor = supervisor();
    supervisor.start(&plugin).await.unwrap();

    backend.fail_next_starts(2);
    backend.kill();
    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(backend.start_count(), 4);
    assert!(backend.is_running());
    assert!(logs_contain("failed to restart plugin"));
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_supervision() {
    let backend = Arc::new(MockBackend::new("acme"));
    let plugin = backend_plugin("acme", backend.clone());
    let supervisor = supervisor();
    supervisor.start(&plugin).await.unwrap();

    supervisor.shutdown().await;
    assert!(supervisor.is_shut_down());
    assert_eq!(supervisor.active_loops(), 0);

    backend.kill();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_is_surfaced_to_the_caller() {
    let backend = Arc::new(MockBackend::new("acme"));
    let plugin = backend_plugin("acme", backend.clone());
    let ctx = CancellationToken::new();

    let deadline = Instant::now() + Duration::from_millis(2500);
    let err = restart_killed_process(&plugin, &ctx, Duration::from_secs(1), Some(deadline))
        .await
        .unwrap_err();
    match err {
        PlugvisorError::Timeout { duration } => {
            assert_eq!(duration, Duration::from_millis(2500))
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    // the first tick starts the idle process; later ticks see it running
    assert_eq!(backend.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unmanaged_plugins_are_not_started() {
    let backend = Arc::new(MockBackend::new("host-run").unmanaged());
    let plugin = backend_plugin("host-run", backend.clone());
    let supervisor = supervisor();

    supervisor.start(&plugin).await.unwrap();
    assert_eq!(backend.start_count(), 0);
    assert_eq!(supervisor.active_loops(), 0);
    assert_eq!(plugin.state(), ProcessState::Unstarted);
}

#[tokio::test(start_paused = true)]
async fn start_failure_is_wrapped() {
    let backend = Arc::new(MockBackend::new("acme"));
    backend.fail_next_starts(1);
    let plugin = backend_plugin("acme", backend);
    let supervisor = supervisor();

    let err = supervisor.start(&plugin).await.unwrap_err();
    assert!(matches!(err, PlugvisorError::ProcessStart { ref plugin_id, .. } if plugin_id == "acme"));
    assert_eq!(supervisor.active_loops(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_all_runs_concurrently() {
    let a = Arc::new(MockBackend::new("a").with_stop_delay(Duration::from_secs(4)));
    let b = Arc::new(MockBackend::new("b").with_stop_delay(Duration::from_secs(4)));
    let plugins = vec![backend_plugin("a", a.clone()), backend_plugin("b", b.clone())];
    let supervisor = supervisor();

    let started = Instant::now();
    supervisor
        .stop_all(plugins.clone(), &CancellationToken::new())
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(a.stop_count(), 1);
    assert_eq!(b.stop_count(), 1);
    assert!(plugins.iter().all(|p| p.state() == ProcessState::Stopped));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn stuck_stop_is_logged_and_does_not_block_the_rest() {
    let stuck = Arc::new(MockBackend::new("stuck").with_stop_delay(Duration::from_secs(60)));
    let quick = Arc::new(MockBackend::new("quick"));
    let plugins = vec![
        backend_plugin("stuck", stuck.clone()),
        backend_plugin("quick", quick.clone()),
    ];
    let supervisor = supervisor();

    let started = Instant::now();
    supervisor.stop_all(plugins, &CancellationToken::new()).await;

    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(quick.stop_count(), 1);
    assert!(logs_contain("failed to stop plugin"));
}

#[tokio::test(start_paused = true)]
async fn decommission_and_stop() {
    let backend = Arc::new(MockBackend::new("acme"));
    let plugin = backend_plugin("acme", backend.clone());
    let supervisor = supervisor();
    supervisor.start(&plugin).await.unwrap();

    supervisor
        .decommission_and_stop(&plugin, &CancellationToken::new())
        .await
        .unwrap();
    assert!(plugin.is_decommissioned());
    assert!(!backend.is_running());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(backend.start_count(), 1);
    assert_eq!(supervisor.active_loops(), 0);
}

/// Backend whose process "exits" because the plugin was decommissioned in the same instant.
#[derive(Default)]
struct StoppedDuringPoll {
    plugin: OnceLock<Weak<Plugin>>,
    starts: AtomicUsize,
}

#[async_trait]
impl BackendPlugin for StoppedDuringPoll {
    fn plugin_id(&self) -> &str {
        "racy"
    }

    fn is_managed(&self) -> bool {
        true
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _ctx: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn exited(&self) -> bool {
        if let Some(plugin) = self.plugin.get().and_then(Weak::upgrade) {
            plugin.decommission();
        }
        true
    }
}

#[tokio::test(start_paused = true)]
async fn exit_caused_by_decommission_is_not_restarted() {
    let backend = Arc::new(StoppedDuringPoll::default());
    let plugin = Arc::new(Plugin::new(
        "racy",
        PluginType::Datasource,
        PluginClass::External,
        "/plugins/racy",
        PluginMetadata {
            backend: true,
            ..Default::default()
        },
    ));
    plugin.set_client(backend.clone()).unwrap();
    backend.plugin.set(Arc::downgrade(&plugin)).unwrap();

    let ctx = CancellationToken::new();
    restart_killed_process(&plugin, &ctx, Duration::from_secs(1), None)
        .await
        .unwrap();

    assert_eq!(backend.starts.load(Ordering::SeqCst), 0);
    assert_eq!(plugin.state(), ProcessState::Stopped);
}
