// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend-plugin runtime for Plugvisor.
//!
//! Registers plugins loaded by the host, supervises their backend processes
//! with crash-restart, dispatches query, resource, metrics, and health
//! requests onto them, and installs or removes external plugins on disk.

pub mod dispatch;
pub mod entity;
pub mod install;
pub mod instrumentation;
pub mod loader;
pub mod manager;
pub mod process;
pub mod proxy;
pub mod registry;
pub mod stream;
pub mod supervisor;
pub mod writer;

pub use dispatch::RequestDispatcher;
pub use entity::{Plugin, PluginMetadata, PluginStaticRoute, ProcessState};
pub use install::{Collaborators, InstallationManager};
pub use loader::{
    PluginFinder, PluginInitializer, PluginLoader, ProcessInitializer, PLUGIN_LOG_LEVEL_ENV,
};
pub use manager::{PluginManager, PluginManagerBuilder};
pub use process::ManagedProcess;
pub use registry::PluginRegistry;
pub use supervisor::ProcessSupervisor;
pub use writer::{ResponseWriter, StreamingResponseWriter};
