// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Installer that "downloads" by writing a manifest fixture.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use plugvisor_core::{InstallRequest, PluginInstaller, Result, UpdateInfo};
use tokio_util::sync::CancellationToken;

use crate::manifest::ManifestFixture;

/// A recorded install call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCall {
    pub plugin_id: String,
    pub version: String,
    pub host_version: String,
    pub plugins_dir: PathBuf,
    pub plugin_zip_url: String,
}

#[derive(Debug, Default)]
pub struct MockInstaller {
    installs: Mutex<Vec<InstallCall>>,
    uninstalls: Mutex<Vec<PathBuf>>,
    update_requests: Mutex<Vec<(String, String)>>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installs(&self) -> Vec<InstallCall> {
        self.installs.lock().clone()
    }

    pub fn uninstalls(&self) -> Vec<PathBuf> {
        self.uninstalls.lock().clone()
    }

    pub fn update_requests(&self) -> Vec<(String, String)> {
        self.update_requests.lock().clone()
    }
}

#[async_trait]
impl PluginInstaller for MockInstaller {
    async fn install(&self, _ctx: &CancellationToken, request: InstallRequest<'_>) -> Result<()> {
        self.installs.lock().push(InstallCall {
            plugin_id: request.plugin_id.to_string(),
            version: request.version.to_string(),
            host_version: request.host_version.to_string(),
            plugins_dir: request.plugins_dir.to_path_buf(),
            plugin_zip_url: request.plugin_zip_url.to_string(),
        });
        ManifestFixture::new(request.plugin_id)
            .version(request.version)
            .write(request.plugins_dir)?;
        Ok(())
    }

    async fn uninstall(&self, _ctx: &CancellationToken, plugin_dir: &Path) -> Result<()> {
        self.uninstalls.lock().push(plugin_dir.to_path_buf());
        tokio::fs::remove_dir_all(plugin_dir).await?;
        Ok(())
    }

    async fn get_update_info(
        &self,
        plugin_id: &str,
        version: &str,
        repository_url: &str,
    ) -> Result<UpdateInfo> {
        self.update_requests
            .lock()
            .push((plugin_id.to_string(), version.to_string()));
        Ok(UpdateInfo {
            plugin_zip_url: format!("{repository_url}/{plugin_id}/versions/{version}/download"),
        })
    }
}
