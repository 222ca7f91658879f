// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol forwarding through a managed OS process.

#![cfg(unix)]

use std::sync::Arc;

use plugvisor_core::types::{CheckHealthRequest, HealthStatus};
use plugvisor_core::{BackendPlugin, PluginClass, PluginType, PlugvisorError, Result};
use plugvisor_plugin::{
    ManagedProcess, Plugin, PluginInitializer, PluginMetadata, ProcessInitializer,
};
use plugvisor_test_utils::MockBackend;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn calls_are_forwarded_only_while_the_process_runs() {
    let ctx = CancellationToken::new();
    let process = ManagedProcess::new("sleeper", "sleep")
        .arg("30")
        .with_protocol(Arc::new(MockBackend::new("sleeper")));
    let health = CheckHealthRequest::default();

    assert!(matches!(
        process.check_health(&ctx, &health).await.unwrap_err(),
        PlugvisorError::PluginUnavailable
    ));

    process.start(&ctx).await.unwrap();
    let result = process.check_health(&ctx, &health).await.unwrap();
    assert_eq!(result.status, HealthStatus::Ok);
    assert_eq!(result.message, "plugin is running");
    let metrics = process.collect_metrics(&ctx).await.unwrap();
    assert!(String::from_utf8_lossy(&metrics.prometheus_metrics).contains("plugin=\"sleeper\""));

    process.stop(&ctx).await.unwrap();
    assert!(matches!(
        process.collect_metrics(&ctx).await.unwrap_err(),
        PlugvisorError::PluginUnavailable
    ));
}

#[tokio::test]
async fn running_process_without_connection_implements_nothing() {
    let ctx = CancellationToken::new();
    let process = ManagedProcess::new("sleeper", "sleep").arg("30");
    process.start(&ctx).await.unwrap();

    assert!(matches!(
        process.collect_metrics(&ctx).await.unwrap_err(),
        PlugvisorError::MethodNotImplemented
    ));
    process.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn initializer_wires_connector_into_plugin_process() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let executable = dir.path().join("gpx_acme");
    std::fs::write(&executable, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&executable, std::fs::Permissions::from_mode(0o755)).unwrap();

    let plugin = Plugin::new(
        "acme",
        PluginType::Datasource,
        PluginClass::External,
        dir.path(),
        PluginMetadata {
            backend: true,
            executable: "gpx_acme".into(),
            ..Default::default()
        },
    );
    let connector = |plugin_id: &str| -> Result<Arc<dyn BackendPlugin>> {
        Ok(Arc::new(MockBackend::new(plugin_id)))
    };
    ProcessInitializer::new()
        .connector(Arc::new(connector))
        .initialize(&plugin)
        .unwrap();

    let ctx = CancellationToken::new();
    assert!(plugin.is_managed());
    plugin.start(&ctx).await.unwrap();
    let metrics = plugin.collect_metrics(&ctx).await.unwrap();
    assert!(String::from_utf8_lossy(&metrics.prometheus_metrics).contains("plugin=\"acme\""));

    plugin.stop(&ctx).await.unwrap();
    assert!(plugin.exited());
}
