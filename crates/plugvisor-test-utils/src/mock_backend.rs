// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable in-process backend plugin.
//!
//! `MockBackend` tracks start/stop calls, can be "killed" to simulate a
//! crash, and replays configured protocol responses.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use parking_lot::Mutex;
use plugvisor_core::types::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResult,
    CollectMetricsResult, DataResponse, HealthStatus, QueryDataRequest, QueryDataResponse,
};
use plugvisor_core::{BackendPlugin, CallResourceResponseSender, PlugvisorError, Result};
use tokio_util::sync::CancellationToken;

/// A failure a mock can be scripted to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Unavailable,
    NotImplemented,
    Cancelled,
    Internal(String),
}

impl MockFailure {
    pub fn to_error(&self) -> PlugvisorError {
        match self {
            MockFailure::Unavailable => PlugvisorError::PluginUnavailable,
            MockFailure::NotImplemented => PlugvisorError::MethodNotImplemented,
            MockFailure::Cancelled => PlugvisorError::Cancelled,
            MockFailure::Internal(msg) => PlugvisorError::Internal(msg.clone()),
        }
    }
}

pub struct MockBackend {
    plugin_id: String,
    managed: bool,
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    failing_starts: AtomicUsize,
    stop_delay: Option<Duration>,
    resource_chunks: Vec<CallResourceResponse>,
    resource_failure: Option<MockFailure>,
    query_failure: Option<MockFailure>,
    health_failure: Option<MockFailure>,
    last_resource_request: Mutex<Option<CallResourceRequest>>,
}

impl MockBackend {
    /// A managed backend that starts successfully.
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            managed: true,
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            failing_starts: AtomicUsize::new(0),
            stop_delay: None,
            resource_chunks: Vec::new(),
            resource_failure: None,
            query_failure: None,
            health_failure: None,
            last_resource_request: Mutex::new(None),
        }
    }

    pub fn unmanaged(mut self) -> Self {
        self.managed = false;
        self
    }

    /// Chunks sent, in order, by every resource call.
    pub fn with_resource_chunks(mut self, chunks: Vec<CallResourceResponse>) -> Self {
        self.resource_chunks = chunks;
        self
    }

    /// Error returned by resource calls once all chunks are sent.
    pub fn with_resource_failure(mut self, failure: MockFailure) -> Self {
        self.resource_failure = Some(failure);
        self
    }

    pub fn with_query_failure(mut self, failure: MockFailure) -> Self {
        self.query_failure = Some(failure);
        self
    }

    pub fn with_health_failure(mut self, failure: MockFailure) -> Self {
        self.health_failure = Some(failure);
        self
    }

    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = Some(delay);
        self
    }

    /// Makes the next `n` start calls fail.
    pub fn fail_next_starts(&self, n: usize) {
        self.failing_starts.store(n, Ordering::SeqCst);
    }

    /// Simulates the backend process dying.
    pub fn kill(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_resource_request(&self) -> Option<CallResourceRequest> {
        self.last_resource_request.lock().clone()
    }
}

#[async_trait]
impl BackendPlugin for MockBackend {
    fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    fn is_managed(&self) -> bool {
        self.managed
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let scripted_failure = self
            .failing_starts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(PlugvisorError::Process {
                message: format!("scripted start failure for {}", self.plugin_id),
                source: None,
            });
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _ctx: &CancellationToken) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stop_delay {
            tokio::time::sleep(delay).await;
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn exited(&self) -> bool {
        !self.is_running()
    }

    async fn query_data(
        &self,
        _ctx: &CancellationToken,
        request: &QueryDataRequest,
    ) -> Result<QueryDataResponse> {
        if let Some(failure) = &self.query_failure {
            return Err(failure.to_error());
        }
        let responses = request
            .queries
            .iter()
            .map(|q| (q.ref_id.clone(), DataResponse::default()))
            .collect();
        Ok(QueryDataResponse { responses })
    }

    async fn call_resource(
        &self,
        _ctx: &CancellationToken,
        request: &CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<()> {
        *self.last_resource_request.lock() = Some(request.clone());
        for chunk in &self.resource_chunks {
            sender.send(chunk.clone()).await?;
        }
        match &self.resource_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn collect_metrics(&self, _ctx: &CancellationToken) -> Result<CollectMetricsResult> {
        Ok(CollectMetricsResult {
            prometheus_metrics: Bytes::from(format!(
                "# TYPE mock_up gauge\nmock_up{{plugin=\"{}\"}} 1\n",
                self.plugin_id
            )),
        })
    }

    async fn check_health(
        &self,
        _ctx: &CancellationToken,
        _request: &CheckHealthRequest,
    ) -> Result<CheckHealthResult> {
        if let Some(failure) = &self.health_failure {
            return Err(failure.to_error());
        }
        Ok(CheckHealthResult {
            status: HealthStatus::Ok,
            message: "plugin is running".to_string(),
            json_details: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_start_failures_are_consumed() {
        let backend = MockBackend::new("acme");
        let ctx = CancellationToken::new();
        backend.fail_next_starts(1);

        assert!(backend.start(&ctx).await.is_err());
        assert!(backend.exited());
        backend.start(&ctx).await.unwrap();
        assert!(!backend.exited());
        assert_eq!(backend.start_count(), 2);

        backend.kill();
        assert!(backend.exited());
    }
}
