// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend plugin client trait.
//!
//! A [`BackendPlugin`] is the host-side handle to one plugin backend: it owns
//! the process lifecycle (start/stop/exited) and forwards protocol calls.
//! Protocol methods default to [`PlugvisorError::MethodNotImplemented`] so a
//! backend only overrides what it actually serves.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{PlugvisorError, Result};
use crate::types::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResult,
    CollectMetricsResult, QueryDataRequest, QueryDataResponse,
};

/// Sink a plugin writes streamed resource-call chunks into.
#[async_trait]
pub trait CallResourceResponseSender: Send + Sync {
    /// Delivers one chunk, waiting until the consumer has taken it.
    async fn send(&self, response: CallResourceResponse) -> Result<()>;
}

/// Host-side client for one backend plugin.
#[async_trait]
pub trait BackendPlugin: Send + Sync + 'static {
    /// Identifier of the plugin this client serves.
    fn plugin_id(&self) -> &str;

    /// Whether the host owns this backend's process lifecycle.
    fn is_managed(&self) -> bool;

    /// Launches (or relaunches) the backend process.
    async fn start(&self, ctx: &CancellationToken) -> Result<()>;

    /// Stops the backend process.
    async fn stop(&self, ctx: &CancellationToken) -> Result<()>;

    /// True once the backend process is no longer running.
    fn exited(&self) -> bool;

    async fn query_data(
        &self,
        _ctx: &CancellationToken,
        _request: &QueryDataRequest,
    ) -> Result<QueryDataResponse> {
        Err(PlugvisorError::MethodNotImplemented)
    }

    async fn call_resource(
        &self,
        _ctx: &CancellationToken,
        _request: &CallResourceRequest,
        _sender: &dyn CallResourceResponseSender,
    ) -> Result<()> {
        Err(PlugvisorError::MethodNotImplemented)
    }

    async fn collect_metrics(&self, _ctx: &CancellationToken) -> Result<CollectMetricsResult> {
        Err(PlugvisorError::MethodNotImplemented)
    }

    async fn check_health(
        &self,
        _ctx: &CancellationToken,
        _request: &CheckHealthRequest,
    ) -> Result<CheckHealthResult> {
        Err(PlugvisorError::MethodNotImplemented)
    }
}

/// Creates backend clients for compiled-in core plugins.
pub trait BackendFactory: Send + Sync {
    fn create(&self, plugin_id: &str) -> Result<Arc<dyn BackendPlugin>>;
}

impl<F> BackendFactory for F
where
    F: Fn(&str) -> Result<Arc<dyn BackendPlugin>> + Send + Sync,
{
    fn create(&self, plugin_id: &str) -> Result<Arc<dyn BackendPlugin>> {
        self(plugin_id)
    }
}
