// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock initializer and access validator.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::request::Parts;
use parking_lot::Mutex;
use plugvisor_core::{BackendFactory, PlugvisorError, RequestValidator, Result};
use plugvisor_plugin::{Plugin, PluginInitializer};

use crate::mock_backend::MockBackend;

/// Attaches a fresh [`MockBackend`] to every backend plugin and keeps a handle to it.
#[derive(Default)]
pub struct MockInitializer {
    backends: Mutex<HashMap<String, Arc<MockBackend>>>,
}

impl MockInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend most recently attached to `plugin_id`.
    pub fn backend(&self, plugin_id: &str) -> Option<Arc<MockBackend>> {
        self.backends.lock().get(plugin_id).cloned()
    }
}

impl PluginInitializer for MockInitializer {
    fn initialize(&self, plugin: &Plugin) -> Result<()> {
        if !plugin.is_backend() {
            return Ok(());
        }
        let backend = Arc::new(MockBackend::new(plugin.id()));
        plugin.set_client(backend.clone())?;
        self.backends.lock().insert(plugin.id().to_string(), backend);
        Ok(())
    }

    fn initialize_core_plugin_with_backend(
        &self,
        plugin: &Plugin,
        factory: &dyn BackendFactory,
    ) -> Result<()> {
        plugin.set_client(factory.create(plugin.id())?)
    }
}

/// Validator with a fixed verdict that records the target URLs it saw.
#[derive(Debug)]
pub struct MockValidator {
    allow: bool,
    seen: Mutex<Vec<(String, bool)>>,
}

impl MockValidator {
    pub fn allow() -> Self {
        Self {
            allow: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn deny() -> Self {
        Self {
            allow: false,
            ..Self::allow()
        }
    }

    /// `(target_url, had_request)` per call.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.seen.lock().clone()
    }
}

impl RequestValidator for MockValidator {
    fn validate(&self, target_url: &str, request: Option<&Parts>) -> Result<()> {
        self.seen
            .lock()
            .push((target_url.to_string(), request.is_some()));
        if self.allow {
            Ok(())
        } else {
            Err(PlugvisorError::AccessDenied(format!(
                "{target_url} is not an allowed target"
            )))
        }
    }
}
