// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request dispatch onto registered plugins.
//!
//! Every operation follows the same shape: validate access, look up the
//! plugin, invoke it under instrumentation, then translate known error
//! sentinels for the caller.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use plugvisor_core::types::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsResult,
    QueryDataRequest, QueryDataResponse,
};
use plugvisor_core::{PluginContext, PlugvisorError, RequestValidator, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::instrumentation::{instrument, Endpoint};
use crate::proxy::{clear_cookie_header, prepare_proxy_request, KeepCookiesModel};
use crate::registry::PluginRegistry;
use crate::stream::call_resource_streamed;
use crate::writer::{write_json_error, ResponseWriter, StreamingResponseWriter};

pub struct RequestDispatcher {
    registry: Arc<PluginRegistry>,
    validator: Arc<dyn RequestValidator>,
    body_limit: usize,
}

impl RequestDispatcher {
    pub fn new(
        registry: Arc<PluginRegistry>,
        validator: Arc<dyn RequestValidator>,
        body_limit: usize,
    ) -> Self {
        Self {
            registry,
            validator,
            body_limit,
        }
    }

    /// Runs queries against the addressed plugin.
    ///
    /// An unknown or decommissioned plugin yields an empty response, not an error.
    pub async fn query_data(
        &self,
        ctx: &CancellationToken,
        request: &QueryDataRequest,
    ) -> Result<QueryDataResponse> {
        let plugin_id = request.plugin_context.plugin_id.as_str();
        let Some(plugin) = self.registry.plugin(plugin_id) else {
            debug!(plugin_id, "query for unregistered plugin, returning empty response");
            return Ok(QueryDataResponse::empty());
        };

        instrument(plugin_id, Endpoint::QueryData, plugin.query_data(ctx, request))
            .await
            .map_err(|e| {
                if e.is_sentinel() {
                    e
                } else {
                    PlugvisorError::QueryData {
                        source: Box::new(e),
                    }
                }
            })
    }

    /// Proxies an HTTP request to the plugin's resource handler, streaming the reply into `writer`.
    pub async fn call_resource(
        &self,
        ctx: &CancellationToken,
        plugin_context: PluginContext,
        request: Request<Body>,
        path: &str,
        writer: &mut dyn ResponseWriter,
    ) {
        let (parts, body) = request.into_parts();

        if let Err(e) = self
            .validator
            .validate(plugin_context.data_source_url(), Some(&parts))
        {
            respond_error(writer, StatusCode::FORBIDDEN, "Access denied", &e).await;
            return;
        }

        if let Err(e) = self
            .call_resource_internal(ctx, plugin_context, parts, body, path, writer)
            .await
        {
            handle_call_resource_error(writer, e).await;
        }
    }

    /// [`call_resource`](Self::call_resource) on a spawned task, answered as a streaming `axum` response.
    ///
    /// The call runs under a child of `ctx` that is cancelled as soon as the
    /// client drops the response body.
    pub async fn call_resource_response(
        self: &Arc<Self>,
        ctx: &CancellationToken,
        plugin_context: PluginContext,
        request: Request<Body>,
        path: &str,
    ) -> Response {
        let (mut writer, pending) = StreamingResponseWriter::channel();
        let dispatcher = Arc::clone(self);
        let call_ctx = ctx.child_token();
        let path = path.to_string();

        tokio::spawn(async move {
            let client_gone = writer.client_gone();
            {
                let call =
                    dispatcher.call_resource(&call_ctx, plugin_context, request, &path, &mut writer);
                tokio::pin!(call);

                tokio::select! {
                    () = &mut call => {}
                    () = client_gone => {
                        debug!(path = %path, "client disconnected, cancelling resource call");
                        call_ctx.cancel();
                        call.await;
                    }
                }
            }

            if let Err(e) = writer.finish().await {
                debug!(error = %e, "client went away before resource response completed");
            }
        });

        pending.into_response().await
    }

    async fn call_resource_internal(
        &self,
        ctx: &CancellationToken,
        plugin_context: PluginContext,
        parts: Parts,
        body: Body,
        path: &str,
        writer: &mut dyn ResponseWriter,
    ) -> Result<()> {
        let url = match parts.uri.query() {
            Some(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path.to_string(),
        };

        let plugin = self
            .registry
            .plugin(&plugin_context.plugin_id)
            .ok_or_else(|| PlugvisorError::NotRegistered {
                plugin_id: plugin_context.plugin_id.clone(),
            })?;

        let keep = KeepCookiesModel::from_context(&plugin_context);
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let mut headers = parts.headers;
        clear_cookie_header(&mut headers, &keep.keep_cookies);
        prepare_proxy_request(&mut headers, remote_addr);

        let body = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| PlugvisorError::CallResource {
                message: "failed to read request body".to_string(),
                source: Some(Box::new(e)),
            })?;

        let request = CallResourceRequest {
            plugin_context,
            path: path.to_string(),
            method: parts.method.to_string(),
            url,
            headers,
            body,
        };

        instrument(
            plugin.id(),
            Endpoint::CallResource,
            call_resource_streamed(&plugin, ctx, &request, writer),
        )
        .await
    }

    /// Collects Prometheus metrics exposed by a plugin.
    pub async fn collect_metrics(
        &self,
        ctx: &CancellationToken,
        plugin_id: &str,
    ) -> Result<CollectMetricsResult> {
        let plugin = self
            .registry
            .plugin(plugin_id)
            .ok_or_else(|| PlugvisorError::NotRegistered {
                plugin_id: plugin_id.to_string(),
            })?;

        instrument(plugin_id, Endpoint::CollectMetrics, plugin.collect_metrics(ctx)).await
    }

    /// Asks a plugin for its health.
    ///
    /// Access denial is a successful result with a 403 status, so pollers do
    /// not record it as a plugin failure.
    pub async fn check_health(
        &self,
        ctx: &CancellationToken,
        plugin_context: PluginContext,
    ) -> Result<CheckHealthResult> {
        if let Err(e) = self.validator.validate(plugin_context.data_source_url(), None) {
            debug!(plugin_id = %plugin_context.plugin_id, error = %e, "health check denied");
            return Ok(CheckHealthResult::access_denied());
        }

        let plugin_id = plugin_context.plugin_id.clone();
        let plugin = self
            .registry
            .plugin(&plugin_id)
            .ok_or_else(|| PlugvisorError::NotRegistered {
                plugin_id: plugin_id.clone(),
            })?;

        let request = CheckHealthRequest { plugin_context };
        instrument(
            &plugin_id,
            Endpoint::CheckHealth,
            plugin.check_health(ctx, &request),
        )
        .await
        .map_err(|e| {
            if e.is_sentinel() {
                return e;
            }
            error!(plugin_id = %plugin_id, error = %e, "failed to check plugin health");
            PlugvisorError::HealthCheckFailed
        })
    }
}

async fn handle_call_resource_error(writer: &mut dyn ResponseWriter, err: PlugvisorError) {
    let (status, message) = match &err {
        PlugvisorError::PluginUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "Plugin unavailable"),
        PlugvisorError::MethodNotImplemented => (StatusCode::NOT_FOUND, "Not found"),
        PlugvisorError::Cancelled => {
            debug!("resource call cancelled");
            return;
        }
        _ => {
            error!(error = %err, "failed to call resource");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to call resource")
        }
    };
    respond_error(writer, status, message, &err).await;
}

async fn respond_error(
    writer: &mut dyn ResponseWriter,
    status: StatusCode,
    message: &str,
    err: &PlugvisorError,
) {
    if let Err(e) = write_json_error(writer, status, message, Some(err as &(dyn Display + Sync))).await {
        error!(status = %status, error = %e, "failed to write error response");
    }
}
