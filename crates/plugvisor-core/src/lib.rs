// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Plugvisor plugin runtime.
//!
//! Provides the error taxonomy, the typed protocol messages exchanged with
//! backend plugins, and the traits for collaborators supplied by the host
//! (backend clients, access validation, archive installation).

pub mod error;
pub mod traits;
pub mod types;

pub use error::{PlugvisorError, Result};
pub use types::{PluginClass, PluginContext, PluginType};

pub use traits::{
    BackendFactory, BackendPlugin, CallResourceResponseSender, InstallRequest, PluginInstaller,
    RequestValidator, UpdateInfo,
};
