// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Plugvisor plugin runtime.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used across the plugin runtime.
///
/// A handful of variants are *sentinels*: callers match on them by identity
/// (`PluginUnavailable`, `MethodNotImplemented`, `HealthCheckFailed`,
/// `NotRegistered`) to render specific user-facing outcomes.
#[derive(Debug, Error)]
pub enum PlugvisorError {
    /// Configuration errors (invalid TOML, missing required fields, bad paths).
    #[error("configuration error: {0}")]
    Config(String),

    /// A plugin with the same id is already present in the registry.
    #[error("plugin {plugin_id} already registered")]
    AlreadyRegistered { plugin_id: String },

    /// No plugin with the given id is registered.
    #[error("plugin {plugin_id} is not registered")]
    NotRegistered { plugin_id: String },

    /// The plugin exists but no running instance can serve the request.
    #[error("plugin unavailable")]
    PluginUnavailable,

    /// The plugin does not implement the requested protocol method.
    #[error("method not implemented")]
    MethodNotImplemented,

    /// A health check failed for a reason other than a recognized sentinel.
    #[error("plugin health check failed")]
    HealthCheckFailed,

    /// The access validator rejected the target URL or request.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Launching the backend process failed.
    #[error("failed to start plugin {plugin_id}: {source}")]
    ProcessStart {
        plugin_id: String,
        source: Box<PlugvisorError>,
    },

    /// A start was requested for a plugin that has no backend client attached.
    #[error("could not start plugin {plugin_id} as no plugin client exists")]
    NoPluginClient { plugin_id: String },

    /// The initializer tried to attach a second backend client.
    #[error("plugin {plugin_id} already has a backend client attached")]
    ClientAlreadyAttached { plugin_id: String },

    /// OS-level process management failure (spawn, signal, wait).
    #[error("plugin process error: {message}")]
    Process {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// `send` was called after the resource stream was closed.
    #[error("cannot send to a closed stream")]
    SendOnClosedStream,

    /// `close` was called on an already-closed resource stream.
    #[error("cannot close a closed stream")]
    StreamAlreadyClosed,

    /// The governing context was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The resource stream ended before a single chunk was delivered.
    #[error("received empty resource response")]
    EmptyResourceResponse,

    /// Receiving the first resource chunk failed.
    #[error("failed to receive response from resource call: {source}")]
    ResourceReceive { source: Box<PlugvisorError> },

    /// An unrecognized query failure, wrapped for the caller.
    #[error("failed to query data: {source}")]
    QueryData { source: Box<PlugvisorError> },

    /// A resource call could not be prepared or forwarded.
    #[error("failed to call resource: {message}")]
    CallResource {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A plugins directory handed to discovery does not exist.
    #[error("aborting install as plugins directory {} does not exist", path.display())]
    PluginsDirNotFound { path: PathBuf },

    /// Core and bundled plugins are not installable.
    #[error("cannot install a Core plugin")]
    CannotInstallCore,

    /// Core and bundled plugins are not uninstallable.
    #[error("cannot uninstall a Core plugin")]
    CannotUninstallCore,

    /// The requested version of the plugin is already installed.
    #[error("plugin {plugin_id} is already installed in {}", existing_dir.display())]
    DuplicatePlugin {
        plugin_id: String,
        existing_dir: PathBuf,
    },

    /// Uninstall of a plugin that is not installed.
    #[error("plugin {plugin_id} is not installed")]
    NotInstalled { plugin_id: String },

    /// The plugin directory resolves outside of the managed plugins root.
    #[error("cannot uninstall a plugin outside of the plugins directory: {}", path.display())]
    UnsafeUninstallPath { path: PathBuf },

    /// The external installer capability failed (download, unpack, delete).
    #[error("installer error: {message}")]
    Installer {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The manifest loader or initializer failed.
    #[error("failed to load plugin: {message}")]
    Loader {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlugvisorError {
    /// Returns true for the conditions dispatch boundaries pass through unwrapped.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            PlugvisorError::PluginUnavailable | PlugvisorError::MethodNotImplemented
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PlugvisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_recognized() {
        assert!(PlugvisorError::PluginUnavailable.is_sentinel());
        assert!(PlugvisorError::MethodNotImplemented.is_sentinel());
        assert!(!PlugvisorError::HealthCheckFailed.is_sentinel());
        assert!(
            !PlugvisorError::NotRegistered {
                plugin_id: "acme".into()
            }
            .is_sentinel()
        );
    }

    #[test]
    fn duplicate_plugin_names_existing_dir() {
        let err = PlugvisorError::DuplicatePlugin {
            plugin_id: "acme".into(),
            existing_dir: PathBuf::from("/var/lib/plugins/acme"),
        };
        let msg = err.to_string();
        assert!(msg.contains("acme"));
        assert!(msg.contains("/var/lib/plugins/acme"));
    }

    #[test]
    fn process_start_wraps_cause() {
        let err = PlugvisorError::ProcessStart {
            plugin_id: "acme".into(),
            source: Box::new(PlugvisorError::NoPluginClient {
                plugin_id: "acme".into(),
            }),
        };
        assert!(err.to_string().contains("no plugin client exists"));
    }
}
