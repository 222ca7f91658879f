// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery, loading, and initialization collaborators.
//!
//! Manifest discovery and parsing are supplied by the host. The runtime only
//! sees fully-parsed [`Plugin`] values.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugvisor_core::{BackendFactory, Result};
use tracing::debug;

use crate::entity::Plugin;
use crate::process::ManagedProcess;

/// Locates plugin manifests under a directory.
pub trait PluginFinder: Send + Sync {
    fn find(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Turns manifest paths into plugin entities.
pub trait PluginLoader: Send + Sync {
    fn load(&self, manifest_path: &Path) -> Result<Plugin>;

    /// Loads every manifest, stopping at the first failure.
    fn load_all(&self, manifest_paths: &[PathBuf]) -> Result<Vec<Plugin>> {
        manifest_paths.iter().map(|path| self.load(path)).collect()
    }
}

/// Attaches runtime context (most importantly the backend client) to a loaded plugin.
pub trait PluginInitializer: Send + Sync {
    fn initialize(&self, plugin: &Plugin) -> Result<()>;

    fn initialize_core_plugin_with_backend(
        &self,
        plugin: &Plugin,
        factory: &dyn BackendFactory,
    ) -> Result<()>;
}

/// Environment variable carrying the host's log level into plugin processes.
pub const PLUGIN_LOG_LEVEL_ENV: &str = "PLUGIN_LOG_LEVEL";

/// Gives every backend plugin a [`ManagedProcess`] running its manifest executable.
///
/// Without a connector the processes are supervised but answer every
/// protocol call with `MethodNotImplemented`.
#[derive(Clone, Default)]
pub struct ProcessInitializer {
    log_level: Option<String>,
    connector: Option<Arc<dyn BackendFactory>>,
}

impl ProcessInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passed to each process in [`PLUGIN_LOG_LEVEL_ENV`].
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Opens the protocol connection a plugin's process forwards calls to.
    pub fn connector(mut self, connector: Arc<dyn BackendFactory>) -> Self {
        self.connector = Some(connector);
        self
    }
}

impl PluginInitializer for ProcessInitializer {
    fn initialize(&self, plugin: &Plugin) -> Result<()> {
        if !plugin.is_backend() || plugin.metadata().executable.is_empty() {
            return Ok(());
        }
        debug!(plugin_id = %plugin.id(), executable = %plugin.metadata().executable, "attaching plugin process");

        let mut process = ManagedProcess::for_plugin(plugin);
        if let Some(level) = &self.log_level {
            process = process.env(PLUGIN_LOG_LEVEL_ENV, level);
        }
        if let Some(connector) = &self.connector {
            process = process.with_protocol(connector.create(plugin.id())?);
        }
        plugin.set_client(Arc::new(process))
    }

    fn initialize_core_plugin_with_backend(
        &self,
        plugin: &Plugin,
        factory: &dyn BackendFactory,
    ) -> Result<()> {
        let client = factory.create(plugin.id())?;
        plugin.set_client(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PluginMetadata;
    use parking_lot::Mutex;
    use plugvisor_core::{BackendPlugin, PluginClass, PluginType, PlugvisorError};

    fn plugin(backend: bool) -> Plugin {
        Plugin::new(
            "acme",
            PluginType::Datasource,
            PluginClass::External,
            "/plugins/acme",
            PluginMetadata {
                backend,
                executable: "gpx_acme".into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn backend_plugins_get_a_managed_process() {
        let p = plugin(true);
        ProcessInitializer::new().initialize(&p).unwrap();
        assert!(p.is_managed());
        assert!(p.exited());
    }

    #[test]
    fn frontend_plugins_stay_clientless() {
        let p = plugin(false);
        ProcessInitializer::new().initialize(&p).unwrap();
        assert!(p.client().is_none());
    }

    #[test]
    fn connector_is_asked_for_each_backend_plugin() {
        let opened = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&opened);
        let connector = move |plugin_id: &str| -> Result<Arc<dyn BackendPlugin>> {
            recorder.lock().push(plugin_id.to_string());
            Err(PlugvisorError::PluginUnavailable)
        };
        let initializer = ProcessInitializer::new().connector(Arc::new(connector));

        let err = initializer.initialize(&plugin(true)).unwrap_err();
        assert!(matches!(err, PlugvisorError::PluginUnavailable));
        initializer.initialize(&plugin(false)).unwrap();
        assert_eq!(*opened.lock(), vec!["acme".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn log_level_reaches_the_process() {
        use std::os::unix::fs::PermissionsExt;
        use tokio_util::sync::CancellationToken;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gpx_acme");
        std::fs::write(
            &script,
            format!("#!/bin/sh\n[ \"${PLUGIN_LOG_LEVEL_ENV}\" = debug ] && exit 0\nsleep 30\n"),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let p = Plugin::new(
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
        ProcessInitializer::new()
            .log_level("debug")
            .initialize(&p)
            .unwrap();

        let ctx = CancellationToken::new();
        p.start(&ctx).await.unwrap();
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while !p.exited() {
            assert!(tokio::time::Instant::now() < deadline, "script did not see the log level");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        p.stop(&ctx).await.unwrap();
    }
}
