// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling a [`PluginManager`] over temporary plugin directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use plugvisor_config::model::PLUGIN_MANAGER_TOGGLE;
use plugvisor_config::PlugvisorConfig;
use plugvisor_core::Result;
use plugvisor_plugin::PluginManager;
use tempfile::TempDir;

use crate::collaborators::{MockInitializer, MockValidator};
use crate::manifest::{JsonManifestFinder, JsonManifestLoader};
use crate::mock_installer::MockInstaller;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    deny_access: bool,
    feature_enabled: bool,
    create_plugins_dir: bool,
    poll_interval: Duration,
    stop_timeout_secs: Option<u64>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            deny_access: false,
            feature_enabled: true,
            create_plugins_dir: true,
            poll_interval: Duration::from_millis(20),
            stop_timeout_secs: None,
        }
    }

    /// Make the access validator reject every request.
    pub fn deny_access(mut self) -> Self {
        self.deny_access = true;
        self
    }

    /// Switch the plugin manager toggle off.
    pub fn disabled(mut self) -> Self {
        self.feature_enabled = false;
        self
    }

    /// Leave the external plugins directory uncreated.
    pub fn without_plugins_dir(mut self) -> Self {
        self.create_plugins_dir = false;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override `plugins.stop_timeout_secs`.
    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<TestHarness> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();

        let mut config = PlugvisorConfig::default();
        config.paths.static_root_path = root.join("public");
        config.paths.bundled_plugins_path = root.join("plugins-bundled");
        config.paths.plugins_path = root.join("data").join("plugins");
        if let Some(secs) = self.stop_timeout_secs {
            config.plugins.stop_timeout_secs = secs;
        }
        config
            .feature_toggles
            .insert(PLUGIN_MANAGER_TOGGLE.to_string(), self.feature_enabled);

        std::fs::create_dir_all(config.paths.core_plugins_path())?;
        std::fs::create_dir_all(&config.paths.bundled_plugins_path)?;
        if self.create_plugins_dir {
            std::fs::create_dir_all(&config.paths.plugins_path)?;
        }

        let installer = Arc::new(MockInstaller::new());
        let initializer = Arc::new(MockInitializer::new());
        let validator = Arc::new(if self.deny_access {
            MockValidator::deny()
        } else {
            MockValidator::allow()
        });

        let manager = PluginManager::builder(config.clone())
            .finder(Arc::new(JsonManifestFinder))
            .loader(Arc::new(JsonManifestLoader))
            .initializer(initializer.clone())
            .validator(validator.clone())
            .installer(installer.clone())
            .restart_poll_interval(self.poll_interval)
            .build()?;

        Ok(TestHarness {
            _temp_dir: temp_dir,
            root,
            config,
            manager,
            installer,
            initializer,
            validator,
        })
    }
}

/// A plugin manager wired to mock collaborators over a temp directory tree.
pub struct TestHarness {
    _temp_dir: TempDir,
    pub root: PathBuf,
    pub config: PlugvisorConfig,
    pub manager: PluginManager,
    pub installer: Arc<MockInstaller>,
    pub initializer: Arc<MockInitializer>,
    pub validator: Arc<MockValidator>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn core_dir(&self) -> PathBuf {
        self.config.paths.core_plugins_path()
    }

    pub fn bundled_dir(&self) -> &Path {
        &self.config.paths.bundled_plugins_path
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.config.paths.plugins_path
    }
}
