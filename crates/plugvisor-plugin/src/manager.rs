// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition root wiring the registry, supervisor, dispatcher, and installer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use plugvisor_config::model::PLUGIN_MANAGER_TOGGLE;
use plugvisor_config::PlugvisorConfig;
use plugvisor_core::{
    BackendFactory, PluginInstaller, PluginType, PlugvisorError, RequestValidator, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatch::RequestDispatcher;
use crate::entity::{Plugin, PluginStaticRoute};
use crate::install::{core_plugin_manifest, Collaborators, InstallationManager};
use crate::loader::{PluginFinder, PluginInitializer, PluginLoader, ProcessInitializer};
use crate::registry::PluginRegistry;
use crate::supervisor::{ProcessSupervisor, RESTART_POLL_INTERVAL};

pub struct PluginManager {
    config: PlugvisorConfig,
    registry: Arc<PluginRegistry>,
    supervisor: Arc<ProcessSupervisor>,
    dispatcher: Arc<RequestDispatcher>,
    installation: InstallationManager,
}

/// Builder for [`PluginManager`]. Finder, loader, validator, and installer are required.
pub struct PluginManagerBuilder {
    config: PlugvisorConfig,
    finder: Option<Arc<dyn PluginFinder>>,
    loader: Option<Arc<dyn PluginLoader>>,
    initializer: Option<Arc<dyn PluginInitializer>>,
    validator: Option<Arc<dyn RequestValidator>>,
    installer: Option<Arc<dyn PluginInstaller>>,
    connector: Option<Arc<dyn BackendFactory>>,
    restart_poll_interval: Duration,
}

impl PluginManagerBuilder {
    pub fn finder(mut self, finder: Arc<dyn PluginFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Defaults to a [`ProcessInitializer`] passing on the configured log level.
    pub fn initializer(mut self, initializer: Arc<dyn PluginInitializer>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn RequestValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn installer(mut self, installer: Arc<dyn PluginInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Protocol connector for the default [`ProcessInitializer`]. Ignored when
    /// an initializer is set explicitly.
    pub fn protocol_connector(mut self, connector: Arc<dyn BackendFactory>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn restart_poll_interval(mut self, interval: Duration) -> Self {
        self.restart_poll_interval = interval;
        self
    }

    pub fn build(self) -> Result<PluginManager> {
        let finder = required(self.finder, "plugin finder")?;
        let loader = required(self.loader, "plugin loader")?;
        let validator = required(self.validator, "request validator")?;
        let installer = required(self.installer, "plugin installer")?;
        let initializer: Arc<dyn PluginInitializer> = match self.initializer {
            Some(initializer) => initializer,
            None => {
                let mut initializer =
                    ProcessInitializer::new().log_level(self.config.log.level.clone());
                if let Some(connector) = self.connector {
                    initializer = initializer.connector(connector);
                }
                Arc::new(initializer)
            }
        };

        let registry = Arc::new(PluginRegistry::new());
        let supervisor = Arc::new(ProcessSupervisor::new(
            self.restart_poll_interval,
            Duration::from_secs(self.config.plugins.stop_timeout_secs),
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&registry),
            validator,
            self.config.plugins.resource_body_limit_bytes,
        ));
        let installation = InstallationManager::new(
            Arc::clone(&registry),
            Arc::clone(&supervisor),
            Collaborators {
                finder,
                loader,
                initializer,
                installer,
            },
            self.config.paths.plugins_path.clone(),
            self.config.plugins.repository_url.clone(),
            self.config.plugins.build_version.clone(),
        );

        Ok(PluginManager {
            config: self.config,
            registry,
            supervisor,
            dispatcher,
            installation,
        })
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| PlugvisorError::Config(format!("plugin manager requires a {name}")))
}

impl PluginManager {
    pub fn builder(config: PlugvisorConfig) -> PluginManagerBuilder {
        PluginManagerBuilder {
            config,
            finder: None,
            loader: None,
            initializer: None,
            validator: None,
            installer: None,
            connector: None,
            restart_poll_interval: RESTART_POLL_INTERVAL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_feature_enabled(PLUGIN_MANAGER_TOGGLE)
    }

    /// Installs core, bundled, and external plugins, in that order.
    ///
    /// A missing external plugins directory is created and nothing is installed from it.
    pub async fn init(&self) -> Result<()> {
        if !self.is_enabled() {
            debug!("plugin manager disabled by feature toggle");
            return Ok(());
        }

        let paths = &self.config.paths;
        self.installation
            .install_plugins(&paths.core_plugins_path())
            .await?;
        self.installation
            .install_plugins(&paths.bundled_plugins_path)
            .await?;

        let external = &paths.plugins_path;
        if !tokio::fs::try_exists(external).await? {
            if let Err(e) = tokio::fs::create_dir_all(external).await {
                error!(dir = %external.display(), error = %e, "failed to create plugins directory");
            }
            return Ok(());
        }
        self.installation.install_plugins(external).await?;

        info!(count = self.registry.len(), "plugin manager initialized");
        Ok(())
    }

    /// Registers a compiled-in core plugin whose backend comes from `factory`.
    pub fn init_core_plugin(&self, plugin_id: &str, factory: &dyn BackendFactory) -> Result<()> {
        let manifest = core_plugin_manifest(plugin_id).ok_or_else(|| PlugvisorError::Loader {
            message: format!("{plugin_id} is not a core plugin"),
            source: None,
        })?;
        let path = self.config.paths.core_plugins_path().join(manifest);

        let collaborators = self.installation.collaborators();
        let plugin = collaborators.loader.load(&path)?;
        collaborators
            .initializer
            .initialize_core_plugin_with_backend(&plugin, factory)?;
        self.registry.register(Arc::new(plugin))
    }

    /// Serves until `shutdown` is cancelled, then stops every plugin.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        info!("plugin manager shutting down");
        self.stop().await;
        Ok(())
    }

    /// Ends supervision, so nothing is restarted, then stops all plugins concurrently.
    pub async fn stop(&self) {
        self.supervisor.shutdown().await;
        self.supervisor
            .stop_all(self.registry.snapshot(), &CancellationToken::new())
            .await;
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn plugin(&self, plugin_id: &str) -> Option<Arc<Plugin>> {
        self.registry.plugin(plugin_id)
    }

    pub fn plugin_by_type(&self, plugin_id: &str, plugin_type: PluginType) -> Option<Arc<Plugin>> {
        self.registry.plugin_by_type(plugin_id, plugin_type)
    }

    pub fn plugins(&self, types: &[PluginType]) -> Vec<Arc<Plugin>> {
        self.registry.plugins(types)
    }

    pub fn renderer(&self) -> Option<Arc<Plugin>> {
        self.registry.renderer()
    }

    pub fn static_routes(&self) -> Vec<PluginStaticRoute> {
        self.registry.static_routes()
    }

    pub fn is_registered(&self, plugin_id: &str) -> bool {
        self.registry.is_registered(plugin_id)
    }

    pub fn is_supported(&self, plugin_id: &str) -> bool {
        self.registry.is_supported(plugin_id)
    }

    pub async fn install_plugins(&self, dir: &Path) -> Result<()> {
        self.installation.install_plugins(dir).await
    }

    pub async fn install(&self, ctx: &CancellationToken, plugin_id: &str, version: &str) -> Result<()> {
        self.installation.install(ctx, plugin_id, version).await
    }

    pub async fn uninstall(&self, ctx: &CancellationToken, plugin_id: &str) -> Result<()> {
        self.installation.uninstall(ctx, plugin_id).await
    }

    pub async fn unregister_and_stop(&self, ctx: &CancellationToken, plugin_id: &str) -> Result<()> {
        self.installation.unregister_and_stop(ctx, plugin_id).await
    }
}
