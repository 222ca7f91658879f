// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Plugvisor plugin runtime.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently falling back to a default.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Feature toggle that enables the plugin manager.
pub const PLUGIN_MANAGER_TOGGLE: &str = "pluginManagerV2";

/// Top-level Plugvisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlugvisorConfig {
    /// Filesystem locations of core, bundled, and external plugins.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Plugin installation and resource proxy settings.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Named feature toggles. A toggle is on only when present and `true`.
    #[serde(default = "default_feature_toggles")]
    pub feature_toggles: HashMap<String, bool>,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for PlugvisorConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            plugins: PluginsConfig::default(),
            feature_toggles: default_feature_toggles(),
            log: LogConfig::default(),
        }
    }
}

impl PlugvisorConfig {
    /// Whether the named feature toggle is switched on.
    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.feature_toggles.get(name).copied().unwrap_or(false)
    }
}

fn default_feature_toggles() -> HashMap<String, bool> {
    HashMap::from([(PLUGIN_MANAGER_TOGGLE.to_string(), true)])
}

/// Plugin directory layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Static asset root; core plugin manifests live under `app/plugins`.
    #[serde(default = "default_static_root_path")]
    pub static_root_path: PathBuf,

    /// Directory of plugins shipped with the host.
    #[serde(default = "default_bundled_plugins_path")]
    pub bundled_plugins_path: PathBuf,

    /// Root directory of operator-installed plugins. Uninstall never deletes
    /// anything outside of it.
    #[serde(default = "default_plugins_path")]
    pub plugins_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            static_root_path: default_static_root_path(),
            bundled_plugins_path: default_bundled_plugins_path(),
            plugins_path: default_plugins_path(),
        }
    }
}

impl PathsConfig {
    /// Directory holding core plugin manifests.
    pub fn core_plugins_path(&self) -> PathBuf {
        self.static_root_path.join("app").join("plugins")
    }
}

fn default_static_root_path() -> PathBuf {
    PathBuf::from("public")
}

fn default_bundled_plugins_path() -> PathBuf {
    PathBuf::from("plugins-bundled")
}

fn default_plugins_path() -> PathBuf {
    PathBuf::from("data/plugins")
}

/// Plugin installation and proxy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Plugin repository API base URL handed to the installer.
    #[serde(default = "default_repository_url")]
    pub repository_url: String,

    /// Host version reported to the installer for compatibility checks.
    #[serde(default = "default_build_version")]
    pub build_version: String,

    /// Maximum request body size forwarded to a plugin resource call.
    #[serde(default = "default_resource_body_limit_bytes")]
    pub resource_body_limit_bytes: usize,

    /// Upper bound on each plugin's stop call during shutdown.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            repository_url: default_repository_url(),
            build_version: default_build_version(),
            resource_body_limit_bytes: default_resource_body_limit_bytes(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

fn default_repository_url() -> String {
    "https://plugins.plugvisor.dev/api/plugins".to_string()
}

fn default_build_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_resource_body_limit_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_stop_timeout_secs() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
