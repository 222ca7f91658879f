// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Header rewriting applied to requests proxied to a plugin resource.

use std::net::SocketAddr;

use axum::http::header::{COOKIE, ORIGIN, REFERER};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use plugvisor_core::PluginContext;
use serde::Deserialize;
use tracing::error;

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Data source `jsonData` fragment listing cookies a plugin may receive.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepCookiesModel {
    #[serde(default)]
    pub keep_cookies: Vec<String>,
}

impl KeepCookiesModel {
    /// Reads the keep list from the targeted data source, if any.
    ///
    /// Malformed `jsonData` is logged and treated as an empty list.
    pub fn from_context(ctx: &PluginContext) -> Self {
        let Some(settings) = &ctx.data_source_instance_settings else {
            return Self::default();
        };
        if settings.json_data.is_null() {
            return Self::default();
        }
        serde_json::from_value(settings.json_data.clone()).unwrap_or_else(|e| {
            error!(
                plugin_id = %ctx.plugin_id,
                error = %e,
                "failed to unpack jsonData in data source instance settings"
            );
            Self::default()
        })
    }
}

/// Drops every cookie except those named in `keep_cookies`.
pub fn clear_cookie_header(headers: &mut HeaderMap, keep_cookies: &[String]) {
    let kept: Vec<String> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|cookie| {
            let name = cookie.split_once('=').map_or(*cookie, |(name, _)| name);
            !name.is_empty() && keep_cookies.iter().any(|k| k == name)
        })
        .map(String::from)
        .collect();

    headers.remove(COOKIE);
    if kept.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&kept.join("; ")) {
        headers.insert(COOKIE, value);
    }
}

/// Records the client address in `X-Forwarded-For` and strips `Origin` and `Referer`.
pub fn prepare_proxy_request(headers: &mut HeaderMap, remote_addr: Option<SocketAddr>) {
    if let Some(addr) = remote_addr {
        let ip = addr.ip().to_string();
        let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.trim().is_empty() => format!("{prior}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }
    }
    headers.remove(ORIGIN);
    headers.remove(REFERER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugvisor_core::types::DataSourceInstanceSettings;

    #[test]
    fn keeps_only_listed_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("session=abc; theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("tenant=42"));

        clear_cookie_header(&mut headers, &["theme".to_string(), "tenant".to_string()]);
        assert_eq!(headers.get_all(COOKIE).iter().count(), 1);
        assert_eq!(headers[COOKIE], "theme=dark; tenant=42");

        clear_cookie_header(&mut headers, &[]);
        assert!(headers.get(COOKIE).is_none());
    }

    #[test]
    fn forwards_client_address() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("https://evil.example"));
        headers.insert(REFERER, HeaderValue::from_static("https://evil.example/page"));
        headers.insert(X_FORWARDED_FOR.clone(), HeaderValue::from_static("10.0.0.1"));

        prepare_proxy_request(&mut headers, Some("192.168.1.5:5000".parse().unwrap()));
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.1, 192.168.1.5");
        assert!(headers.get(ORIGIN).is_none());
        assert!(headers.get(REFERER).is_none());
    }

    #[test]
    fn keep_cookies_from_context() {
        let mut ctx = PluginContext {
            plugin_id: "acme".into(),
            ..Default::default()
        };
        assert!(KeepCookiesModel::from_context(&ctx).keep_cookies.is_empty());

        ctx.data_source_instance_settings = Some(DataSourceInstanceSettings {
            json_data: serde_json::json!({ "keepCookies": ["theme"] }),
            ..Default::default()
        });
        assert_eq!(KeepCookiesModel::from_context(&ctx).keep_cookies, vec!["theme"]);

        ctx.data_source_instance_settings = Some(DataSourceInstanceSettings {
            json_data: serde_json::json!({ "keepCookies": "theme" }),
            ..Default::default()
        });
        assert!(KeepCookiesModel::from_context(&ctx).keep_cookies.is_empty());
    }
}
