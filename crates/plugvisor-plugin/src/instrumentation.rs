// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request metrics for plugin protocol calls.
//!
//! Uses the metrics-rs facade; the host installs whichever recorder it exports with.

use std::future::Future;
use std::time::Instant;

use metrics::{describe_counter, describe_histogram};
use plugvisor_core::{PlugvisorError, Result};
use strum::{Display, IntoStaticStr};

pub const REQUEST_TOTAL: &str = "plugvisor_plugin_request_total";
pub const REQUEST_DURATION: &str = "plugvisor_plugin_request_duration_milliseconds";

/// Protocol operation a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum Endpoint {
    QueryData,
    CallResource,
    CollectMetrics,
    CheckHealth,
}

/// Register metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(REQUEST_TOTAL, "Total plugin protocol requests");
    describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Milliseconds,
        "Plugin protocol request duration in milliseconds"
    );
}

fn status_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(PlugvisorError::Cancelled) => "cancelled",
        Err(_) => "error",
    }
}

/// Runs `call`, recording its outcome and latency for `plugin_id`.
pub async fn instrument<T, F>(plugin_id: &str, endpoint: Endpoint, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = call.await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let endpoint: &'static str = endpoint.into();

    metrics::counter!(
        REQUEST_TOTAL,
        "plugin_id" => plugin_id.to_string(),
        "endpoint" => endpoint,
        "status" => status_label(&result)
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION,
        "plugin_id" => plugin_id.to_string(),
        "endpoint" => endpoint
    )
    .record(elapsed_ms);

    result
}
