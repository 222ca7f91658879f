// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access validation consulted before resource and health calls.

use axum::http::request::Parts;

use crate::error::Result;

/// Decides whether a request may reach a data-source-backed plugin.
///
/// `target_url` is the data source URL (empty when the plugin has no data
/// source). `request` is the inbound HTTP request head when one exists;
/// health checks pass `None`.
pub trait RequestValidator: Send + Sync {
    fn validate(&self, target_url: &str, request: Option<&Parts>) -> Result<()>;
}
