// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend client that owns an OS child process.
//!
//! The process is spawned with `kill_on_drop`, so a dropped handle never
//! leaks a running plugin. Protocol calls go to an attached connection and
//! are refused with [`PlugvisorError::PluginUnavailable`] while the process
//! is not running.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use plugvisor_core::types::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsResult,
    QueryDataRequest, QueryDataResponse,
};
use plugvisor_core::{BackendPlugin, CallResourceResponseSender, PlugvisorError, Result};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::entity::Plugin;

pub struct ManagedProcess {
    plugin_id: String,
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
    child: Mutex<Option<Child>>,
    protocol: Option<Arc<dyn BackendPlugin>>,
}

impl ManagedProcess {
    pub fn new(plugin_id: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            child: Mutex::new(None),
            protocol: None,
        }
    }

    /// Process running the executable declared in a plugin's manifest, from its directory.
    pub fn for_plugin(plugin: &Plugin) -> Self {
        let dir = plugin.plugin_dir();
        Self::new(plugin.id(), dir.join(&plugin.metadata().executable)).current_dir(dir)
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Connection protocol calls are forwarded to while the process runs.
    pub fn with_protocol(mut self, protocol: Arc<dyn BackendPlugin>) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// OS process id of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.lock().as_ref().and_then(Child::id)
    }

    fn connection(&self) -> Result<&Arc<dyn BackendPlugin>> {
        if self.exited() {
            return Err(PlugvisorError::PluginUnavailable);
        }
        self.protocol
            .as_ref()
            .ok_or(PlugvisorError::MethodNotImplemented)
    }
}

#[async_trait]
impl BackendPlugin for ManagedProcess {
    fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    fn is_managed(&self) -> bool {
        true
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<()> {
        if !self.exited() {
            debug!(plugin_id = %self.plugin_id, "plugin process already running");
            return Ok(());
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().cloned())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| PlugvisorError::Process {
            message: format!("failed to spawn {}", self.program.display()),
            source: Some(Box::new(e)),
        })?;
        debug!(plugin_id = %self.plugin_id, pid = ?child.id(), "plugin process spawned");
        *self.child.lock() = Some(child);
        Ok(())
    }

    async fn stop(&self, _ctx: &CancellationToken) -> Result<()> {
        let child = self.child.lock().take();
        let Some(mut child) = child else {
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(plugin_id = %self.plugin_id, %status, "plugin process already exited");
            return Ok(());
        }
        child.kill().await.map_err(|e| PlugvisorError::Process {
            message: format!("failed to kill plugin {}", self.plugin_id),
            source: Some(Box::new(e)),
        })?;
        debug!(plugin_id = %self.plugin_id, "plugin process killed");
        Ok(())
    }

    fn exited(&self) -> bool {
        let mut guard = self.child.lock();
        let Some(child) = guard.as_mut() else {
            return true;
        };
        match child.try_wait() {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(plugin_id = %self.plugin_id, error = %e, "failed to poll plugin process");
                true
            }
        }
    }

    async fn query_data(
        &self,
        ctx: &CancellationToken,
        request: &QueryDataRequest,
    ) -> Result<QueryDataResponse> {
        self.connection()?.query_data(ctx, request).await
    }

    async fn call_resource(
        &self,
        ctx: &CancellationToken,
        request: &CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<()> {
        self.connection()?.call_resource(ctx, request, sender).await
    }

    async fn collect_metrics(&self, ctx: &CancellationToken) -> Result<CollectMetricsResult> {
        self.connection()?.collect_metrics(ctx).await
    }

    async fn check_health(
        &self,
        ctx: &CancellationToken,
        request: &CheckHealthRequest,
    ) -> Result<CheckHealthResult> {
        self.connection()?.check_health(ctx, request).await
    }
}
