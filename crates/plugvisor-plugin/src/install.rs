// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin discovery, installation, and uninstallation.
//!
//! All deletions are confined to the configured external plugins root: a
//! plugin directory must normalise to a strict descendant of it.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use plugvisor_core::{InstallRequest, PluginInstaller, PlugvisorError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::entity::Plugin;
use crate::loader::{PluginFinder, PluginInitializer, PluginLoader};
use crate::registry::PluginRegistry;
use crate::supervisor::ProcessSupervisor;

/// Compiled-in core plugins and their manifest paths relative to the core plugins directory.
pub const CORE_PLUGIN_MANIFESTS: [(&str, &str); 5] = [
    ("cloudwatch", "datasource/cloudwatch/plugin.json"),
    ("testdata", "datasource/testdata/plugin.json"),
    ("graphite", "datasource/graphite/plugin.json"),
    ("opentsdb", "datasource/opentsdb/plugin.json"),
    (
        "grafana-azure-monitor-datasource",
        "datasource/grafana-azure-monitor-datasource/plugin.json",
    ),
];

/// Manifest path of a reserved core plugin id.
pub fn core_plugin_manifest(plugin_id: &str) -> Option<&'static str> {
    CORE_PLUGIN_MANIFESTS
        .iter()
        .find(|(id, _)| *id == plugin_id)
        .map(|(_, path)| *path)
}

/// Host-supplied capabilities the installation manager drives.
#[derive(Clone)]
pub struct Collaborators {
    pub finder: Arc<dyn PluginFinder>,
    pub loader: Arc<dyn PluginLoader>,
    pub initializer: Arc<dyn PluginInitializer>,
    pub installer: Arc<dyn PluginInstaller>,
}

pub struct InstallationManager {
    registry: Arc<PluginRegistry>,
    supervisor: Arc<ProcessSupervisor>,
    collaborators: Collaborators,
    plugins_path: PathBuf,
    repository_url: String,
    build_version: String,
}

impl InstallationManager {
    pub fn new(
        registry: Arc<PluginRegistry>,
        supervisor: Arc<ProcessSupervisor>,
        collaborators: Collaborators,
        plugins_path: impl Into<PathBuf>,
        repository_url: impl Into<String>,
        build_version: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            supervisor,
            collaborators,
            plugins_path: plugins_path.into(),
            repository_url: repository_url.into(),
            build_version: build_version.into(),
        }
    }

    pub fn plugins_path(&self) -> &Path {
        &self.plugins_path
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Discovers, registers, and starts every new plugin under `dir`.
    ///
    /// The first failure aborts the batch; plugins registered before it stay registered.
    pub async fn install_plugins(&self, dir: &Path) -> Result<()> {
        if !tokio::fs::try_exists(dir).await? {
            return Err(PlugvisorError::PluginsDirNotFound {
                path: dir.to_path_buf(),
            });
        }

        let manifests = self.collaborators.finder.find(dir)?;
        let loaded = self.collaborators.loader.load_all(&manifests)?;
        debug!(dir = %dir.display(), count = loaded.len(), "loaded plugin manifests");

        for plugin in self.filter_out_duplicates(loaded) {
            self.collaborators.initializer.initialize(&plugin)?;
            self.register_and_start(Arc::new(plugin)).await?;
        }
        Ok(())
    }

    fn filter_out_duplicates(&self, loaded: Vec<Plugin>) -> Vec<Plugin> {
        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(loaded.len());

        for plugin in loaded {
            if !seen.insert(plugin.id().to_string()) {
                warn!(plugin_id = %plugin.id(), "skipping plugin as it's a duplicate");
                continue;
            }
            if let Some(existing) = self.registry.plugin(plugin.id()) {
                debug!(
                    plugin_id = %existing.id(),
                    version = %existing.version(),
                    "skipping plugin as it's already installed"
                );
                continue;
            }
            if core_plugin_manifest(plugin.id()).is_some() {
                continue;
            }
            result.push(plugin);
        }
        result
    }

    async fn register_and_start(&self, plugin: Arc<Plugin>) -> Result<()> {
        self.registry.register(Arc::clone(&plugin))?;
        if let Err(e) = self.supervisor.start(&plugin).await {
            error!(plugin_id = %plugin.id(), error = %e, "failed to start plugin");
            return Err(e);
        }
        Ok(())
    }

    /// Installs `plugin_id@version`, replacing a different installed version.
    pub async fn install(&self, ctx: &CancellationToken, plugin_id: &str, version: &str) -> Result<()> {
        let mut plugin_zip_url = String::new();

        if let Some(plugin) = self.registry.plugin(plugin_id) {
            if !plugin.is_external() {
                return Err(PlugvisorError::CannotInstallCore);
            }
            if same_version(plugin.version(), version) {
                return Err(PlugvisorError::DuplicatePlugin {
                    plugin_id: plugin_id.to_string(),
                    existing_dir: plugin.plugin_dir().to_path_buf(),
                });
            }

            let update = self
                .collaborators
                .installer
                .get_update_info(plugin_id, version, &self.repository_url)
                .await?;
            plugin_zip_url = update.plugin_zip_url;

            self.uninstall(ctx, plugin_id).await?;
        }

        self.collaborators
            .installer
            .install(
                ctx,
                InstallRequest {
                    plugin_id,
                    version,
                    host_version: &self.build_version,
                    plugins_dir: &self.plugins_path,
                    plugin_zip_url: &plugin_zip_url,
                    repository_url: &self.repository_url,
                },
            )
            .await?;
        info!(plugin_id, version, "plugin installed");

        self.install_plugins(&self.plugins_path).await
    }

    /// Stops, unregisters, and deletes an external plugin.
    pub async fn uninstall(&self, ctx: &CancellationToken, plugin_id: &str) -> Result<()> {
        let plugin = self
            .registry
            .plugin(plugin_id)
            .ok_or_else(|| PlugvisorError::NotInstalled {
                plugin_id: plugin_id.to_string(),
            })?;
        if !plugin.is_external() {
            return Err(PlugvisorError::CannotUninstallCore);
        }
        ensure_within(&self.plugins_path, plugin.plugin_dir())?;

        if self.registry.is_registered(plugin_id) {
            self.unregister_and_stop(ctx, plugin_id).await?;
        } else if let Err(e) = self.registry.unregister(plugin_id) {
            debug!(plugin_id, error = %e, "plugin already removed from registry");
        }

        self.collaborators
            .installer
            .uninstall(ctx, plugin.plugin_dir())
            .await?;
        info!(plugin_id, "plugin uninstalled");
        Ok(())
    }

    /// Decommissions and stops a registered plugin, then removes it from the registry.
    ///
    /// The entry is removed even when the stop fails, so a later scan can register the plugin again.
    pub async fn unregister_and_stop(&self, ctx: &CancellationToken, plugin_id: &str) -> Result<()> {
        debug!(plugin_id, "unregistering plugin");
        let plugin = self
            .registry
            .plugin(plugin_id)
            .ok_or_else(|| PlugvisorError::NotRegistered {
                plugin_id: plugin_id.to_string(),
            })?;

        let stopped = self.supervisor.decommission_and_stop(&plugin, ctx).await;
        self.registry.unregister(plugin_id)?;
        if let Err(e) = &stopped {
            error!(plugin_id, error = %e, "failed to stop plugin, removed it from the registry anyway");
        }
        stopped
    }
}

fn same_version(installed: &str, requested: &str) -> bool {
    match (
        semver::Version::parse(installed.trim_start_matches('v')),
        semver::Version::parse(requested.trim_start_matches('v')),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => installed == requested,
    }
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Fails unless `dir` is strictly inside `root`.
pub fn ensure_within(root: &Path, dir: &Path) -> Result<()> {
    let root = normalize(root);
    let normalized = normalize(dir);
    match normalized.strip_prefix(&root) {
        Ok(rel)
            if !rel.as_os_str().is_empty()
                && rel.components().all(|c| matches!(c, Component::Normal(_))) =>
        {
            Ok(())
        }
        _ => Err(PlugvisorError::UnsafeUninstallPath {
            path: dir.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_are_allowed() {
        let root = Path::new("/var/lib/plugvisor/plugins");
        assert!(ensure_within(root, Path::new("/var/lib/plugvisor/plugins/acme")).is_ok());
        assert!(ensure_within(root, Path::new("/var/lib/plugvisor/plugins/./acme/dist")).is_ok());
        assert!(ensure_within(Path::new("data/plugins"), Path::new("data/plugins/acme")).is_ok());
    }

    #[test]
    fn traversal_and_siblings_are_rejected() {
        let root = Path::new("/var/lib/plugvisor/plugins");
        for dir in [
            "/var/lib/plugvisor/plugins/../secrets",
            "/var/lib/plugvisor/plugins/acme/../../etc",
            "/var/lib/plugvisor/plugins-backup/acme",
            "/etc",
            "/var/lib/plugvisor/plugins",
            "/var/lib/plugvisor/plugins/acme/..",
            "relative/acme",
        ] {
            let err = ensure_within(root, Path::new(dir)).unwrap_err();
            assert!(
                matches!(err, PlugvisorError::UnsafeUninstallPath { .. }),
                "{dir} should be rejected"
            );
        }
    }

    #[test]
    fn reserved_core_ids() {
        assert_eq!(
            core_plugin_manifest("testdata"),
            Some("datasource/testdata/plugin.json")
        );
        assert!(core_plugin_manifest("acme").is_none());
    }

    #[test]
    fn versions_compare_semantically() {
        assert!(same_version("1.0.0", "1.0.0"));
        assert!(same_version("v1.0.0", "1.0.0"));
        assert!(!same_version("1.0.0", "1.0.1"));
        assert!(same_version("nightly", "nightly"));
    }
}
