// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory representation of one loaded plugin.
//!
//! A [`Plugin`] is created by the loader from a parsed manifest, receives its
//! backend client exactly once from the initializer, and is shared through
//! the registry as `Arc<Plugin>`. Decommissioning is a one-way flag checked
//! at lookup time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use plugvisor_core::types::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsResult,
    QueryDataRequest, QueryDataResponse,
};
use plugvisor_core::{
    BackendPlugin, CallResourceResponseSender, PluginClass, PluginType, PlugvisorError, Result,
};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;

/// Manifest data describing a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginMetadata {
    pub name: String,
    pub info: PluginInfo,
    pub dependencies: PluginDependencies,
    pub includes: Vec<PluginInclude>,
    pub category: String,
    pub signature: SignatureStatus,

    /// Ships an out-of-process executable that the supervisor can run.
    pub backend: bool,
    pub alerting: bool,
    pub logs: bool,
    pub metrics: bool,
    pub annotations: bool,
    pub streaming: bool,

    /// Executable name relative to the plugin directory.
    pub executable: String,
    pub query_options: HashMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginInfo {
    pub author: PluginAuthor,
    pub description: String,
    pub links: Vec<PluginLink>,
    pub logos: PluginLogos,
    pub version: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginAuthor {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginLogos {
    pub small: String,
    pub large: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginDependencies {
    /// Semver range of host versions the plugin supports.
    pub host_version: String,
    pub plugins: Vec<PluginDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginDependency {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub name: String,
    pub version: String,
}

/// A dashboard or page bundled with a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginInclude {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub include_type: String,
    pub role: String,
    pub add_to_nav: bool,
    pub default_nav: bool,
}

/// Outcome of verifying a plugin's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignatureStatus {
    Internal,
    Valid,
    Invalid,
    Modified,
    #[default]
    Unsigned,
}

/// Process lifecycle as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ProcessState {
    #[default]
    Unstarted,
    Running,
    /// Exit detected; a restart is pending.
    Crashed,
    Stopped,
}

/// Static asset directory served on behalf of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginStaticRoute {
    pub plugin_id: String,
    pub directory: PathBuf,
}

/// One loaded plugin and its runtime handle.
pub struct Plugin {
    id: String,
    plugin_type: PluginType,
    class: PluginClass,
    plugin_dir: PathBuf,
    metadata: PluginMetadata,
    client: OnceLock<Arc<dyn BackendPlugin>>,
    decommissioned: AtomicBool,
    state: Mutex<ProcessState>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("plugin_type", &self.plugin_type)
            .field("class", &self.class)
            .field("plugin_dir", &self.plugin_dir)
            .field("client", &self.client.get().is_some())
            .field("decommissioned", &self.is_decommissioned())
            .field("state", &self.state())
            .finish()
    }
}

impl Plugin {
    pub fn new(
        id: impl Into<String>,
        plugin_type: PluginType,
        class: PluginClass,
        plugin_dir: impl Into<PathBuf>,
        metadata: PluginMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            plugin_type,
            class,
            plugin_dir: plugin_dir.into(),
            metadata,
            client: OnceLock::new(),
            decommissioned: AtomicBool::new(false),
            state: Mutex::new(ProcessState::Unstarted),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    pub fn class(&self) -> PluginClass {
        self.class
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Installed version from the manifest.
    pub fn version(&self) -> &str {
        &self.metadata.info.version
    }

    pub fn is_core(&self) -> bool {
        self.class == PluginClass::Core
    }

    pub fn is_bundled(&self) -> bool {
        self.class == PluginClass::Bundled
    }

    pub fn is_external(&self) -> bool {
        self.class == PluginClass::External
    }

    pub fn is_renderer(&self) -> bool {
        self.plugin_type == PluginType::Renderer
    }

    /// Whether the manifest declares an out-of-process backend.
    pub fn is_backend(&self) -> bool {
        self.metadata.backend
    }

    /// Whether the supervisor owns this plugin's process lifecycle.
    pub fn is_managed(&self) -> bool {
        self.client.get().is_some_and(|c| c.is_managed())
    }

    /// Attaches the backend client. Only the first call succeeds.
    pub fn set_client(&self, client: Arc<dyn BackendPlugin>) -> Result<()> {
        self.client
            .set(client)
            .map_err(|_| PlugvisorError::ClientAlreadyAttached {
                plugin_id: self.id.clone(),
            })
    }

    pub fn client(&self) -> Option<&Arc<dyn BackendPlugin>> {
        self.client.get()
    }

    /// Marks the plugin as logically removed. Never reversed.
    pub fn decommission(&self) {
        self.decommissioned.store(true, Ordering::Release);
    }

    pub fn is_decommissioned(&self) -> bool {
        self.decommissioned.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ProcessState) {
        *self.state.lock() = state;
    }

    /// Static asset route for the plugin's directory; core plugins are served by the host.
    pub fn static_route(&self) -> Option<PluginStaticRoute> {
        if self.is_core() {
            return None;
        }
        Some(PluginStaticRoute {
            plugin_id: self.id.clone(),
            directory: self.plugin_dir.clone(),
        })
    }

    pub async fn start(&self, ctx: &CancellationToken) -> Result<()> {
        let client = self.client.get().ok_or_else(|| PlugvisorError::NoPluginClient {
            plugin_id: self.id.clone(),
        })?;
        client.start(ctx).await
    }

    /// Stops the backend process. A plugin without a client has nothing to stop.
    pub async fn stop(&self, ctx: &CancellationToken) -> Result<()> {
        match self.client.get() {
            Some(client) => client.stop(ctx).await,
            None => Ok(()),
        }
    }

    /// True when there is no running backend process.
    pub fn exited(&self) -> bool {
        self.client.get().is_none_or(|c| c.exited())
    }

    fn backend(&self) -> Result<&Arc<dyn BackendPlugin>> {
        self.client.get().ok_or(PlugvisorError::PluginUnavailable)
    }

    pub async fn query_data(
        &self,
        ctx: &CancellationToken,
        request: &QueryDataRequest,
    ) -> Result<QueryDataResponse> {
        self.backend()?.query_data(ctx, request).await
    }

    pub async fn call_resource(
        &self,
        ctx: &CancellationToken,
        request: &CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<()> {
        self.backend()?.call_resource(ctx, request, sender).await
    }

    pub async fn collect_metrics(&self, ctx: &CancellationToken) -> Result<CollectMetricsResult> {
        self.backend()?.collect_metrics(ctx).await
    }

    pub async fn check_health(
        &self,
        ctx: &CancellationToken,
        request: &CheckHealthRequest,
    ) -> Result<CheckHealthResult> {
        self.backend()?.check_health(ctx, request).await
    }
}
