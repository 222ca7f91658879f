// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin identity enums and the typed messages exchanged with backend plugins.
//!
//! The wire encoding between the host and a plugin process is fixed
//! externally; these are the already-decoded values that cross that boundary.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of plugin, as declared by its manifest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PluginType {
    Datasource,
    Panel,
    App,
    Renderer,
}

impl PluginType {
    /// Every known plugin type, used when a listing asks for "all".
    pub const ALL: [PluginType; 4] = [
        PluginType::Datasource,
        PluginType::Panel,
        PluginType::App,
        PluginType::Renderer,
    ];
}

/// Provenance of a plugin, fixed when it is loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PluginClass {
    /// Compiled into the host and registered at startup.
    Core,
    /// Shipped alongside the host in the bundled plugins directory.
    Bundled,
    /// Installed by an operator into the external plugins directory.
    External,
}

/// Signed-in user on whose behalf a plugin request is made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Settings of the data source instance a request targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceInstanceSettings {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub url: String,
    pub user: String,
    pub database: String,
    pub basic_auth_enabled: bool,
    pub basic_auth_user: String,
    /// Free-form JSON configuration of the data source.
    pub json_data: serde_json::Value,
    #[serde(skip_serializing)]
    pub decrypted_secure_json_data: HashMap<String, String>,
    pub updated: Option<DateTime<Utc>>,
}

/// Settings of the app instance a request targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInstanceSettings {
    pub json_data: serde_json::Value,
    #[serde(skip_serializing)]
    pub decrypted_secure_json_data: HashMap<String, String>,
    pub updated: Option<DateTime<Utc>>,
}

/// Identifies the plugin and instance a request is addressed to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginContext {
    pub org_id: i64,
    pub plugin_id: String,
    pub user: Option<User>,
    pub app_instance_settings: Option<AppInstanceSettings>,
    pub data_source_instance_settings: Option<DataSourceInstanceSettings>,
}

impl PluginContext {
    /// URL of the targeted data source, or an empty string when none is set.
    pub fn data_source_url(&self) -> &str {
        self.data_source_instance_settings
            .as_ref()
            .map(|ds| ds.url.as_str())
            .unwrap_or("")
    }
}

/// Absolute time range of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// A single query within a [`QueryDataRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQuery {
    pub ref_id: String,
    pub query_type: String,
    pub max_data_points: i64,
    pub interval_ms: i64,
    pub time_range: TimeRange,
    /// Plugin-specific query model.
    pub json: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct QueryDataRequest {
    pub plugin_context: PluginContext,
    pub headers: HashMap<String, String>,
    pub queries: Vec<DataQuery>,
}

/// Result for one query, keyed by `ref_id` in [`QueryDataResponse`].
#[derive(Debug, Clone, Default)]
pub struct DataResponse {
    /// Opaque, already-encoded data frames.
    pub frames: Vec<Bytes>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryDataResponse {
    pub responses: HashMap<String, DataResponse>,
}

impl QueryDataResponse {
    /// An empty response with zero result entries.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A proxied resource request forwarded to a plugin.
#[derive(Debug, Clone)]
pub struct CallResourceRequest {
    pub plugin_context: PluginContext,
    pub path: String,
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One chunk of a streamed resource response.
///
/// Only the first chunk of a stream is expected to carry `headers` and a
/// meaningful `status`; later chunks carry body bytes only.
#[derive(Debug, Clone)]
pub struct CallResourceResponse {
    pub status: StatusCode,
    pub headers: Option<HeaderMap>,
    pub body: Bytes,
}

impl CallResourceResponse {
    /// A body-only continuation chunk.
    pub fn chunk(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: None,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectMetricsResult {
    /// Prometheus text exposition emitted by the plugin.
    pub prometheus_metrics: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct CheckHealthRequest {
    pub plugin_context: PluginContext,
}

/// Status reported by a plugin health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum HealthStatus {
    #[default]
    Unknown,
    Ok,
    Error,
    /// The request was rejected by the access validator before reaching the plugin.
    Forbidden,
}

impl HealthStatus {
    /// Numeric status code; `Forbidden` carries the HTTP 403 code.
    pub fn code(&self) -> u16 {
        match self {
            HealthStatus::Unknown => 0,
            HealthStatus::Ok => 1,
            HealthStatus::Error => 2,
            HealthStatus::Forbidden => StatusCode::FORBIDDEN.as_u16(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckHealthResult {
    pub status: HealthStatus,
    pub message: String,
    pub json_details: Option<serde_json::Value>,
}

impl CheckHealthResult {
    /// The result returned when access validation rejects a health check.
    pub fn access_denied() -> Self {
        Self {
            status: HealthStatus::Forbidden,
            message: "Access denied".to_string(),
            json_details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn plugin_type_parses_lowercase() {
        for t in PluginType::ALL {
            assert_eq!(PluginType::from_str(&t.to_string()).unwrap(), t);
        }
        assert_eq!(PluginType::from_str("datasource").unwrap(), PluginType::Datasource);
    }

    #[test]
    fn plugin_class_serializes_lowercase() {
        let json = serde_json::to_string(&PluginClass::External).unwrap();
        assert_eq!(json, r#""external""#);
    }

    #[test]
    fn data_source_url_defaults_to_empty() {
        let mut ctx = PluginContext::default();
        assert_eq!(ctx.data_source_url(), "");

        ctx.data_source_instance_settings = Some(DataSourceInstanceSettings {
            url: "http://localhost:9090".into(),
            ..Default::default()
        });
        assert_eq!(ctx.data_source_url(), "http://localhost:9090");
    }

    #[test]
    fn access_denied_health_result_carries_403() {
        let result = CheckHealthResult::access_denied();
        assert_eq!(result.status.code(), 403);
        assert_eq!(result.message, "Access denied");
    }
}
