// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque download/unpack capability used by the installation manager.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Where to fetch a specific version of a plugin from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateInfo {
    pub plugin_zip_url: String,
}

/// One plugin archive to download and unpack.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    pub plugin_id: &'a str,
    pub version: &'a str,
    /// Host version the archive must be compatible with.
    pub host_version: &'a str,
    /// Directory the archive is unpacked into.
    pub plugins_dir: &'a Path,
    /// Empty when the archive should be resolved from `repository_url`.
    pub plugin_zip_url: &'a str,
    pub repository_url: &'a str,
}

/// Fetches plugin archives into, and removes them from, the plugins directory.
#[async_trait]
pub trait PluginInstaller: Send + Sync {
    /// Downloads and unpacks `request.plugin_id@request.version`.
    async fn install(&self, ctx: &CancellationToken, request: InstallRequest<'_>) -> Result<()>;

    /// Deletes an installed plugin's files.
    async fn uninstall(&self, ctx: &CancellationToken, plugin_dir: &Path) -> Result<()>;

    /// Resolves the archive location for upgrading to `version`.
    async fn get_update_info(
        &self,
        plugin_id: &str,
        version: &str,
        repository_url: &str,
    ) -> Result<UpdateInfo>;
}
