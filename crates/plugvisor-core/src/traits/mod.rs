// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the edges of the plugin runtime.

pub mod backend;
pub mod installer;
pub mod validator;

pub use backend::{BackendFactory, BackendPlugin, CallResourceResponseSender};
pub use installer::{InstallRequest, PluginInstaller, UpdateInfo};
pub use validator::RequestValidator;
