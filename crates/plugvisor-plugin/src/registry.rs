// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrency-safe registry of loaded plugins.
//!
//! One reader/writer lock guards the map. Writers hold it for the whole
//! mutation; readers clone the `Arc` out and release the lock before the
//! decommission flag is consulted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use plugvisor_core::{PluginType, PlugvisorError, Result};
use tracing::debug;

use crate::entity::{Plugin, PluginStaticRoute};

#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a plugin, failing if any entry with the same id exists.
    pub fn register(&self, plugin: Arc<Plugin>) -> Result<()> {
        let plugin_id = plugin.id().to_string();
        debug!(plugin_id = %plugin_id, "registering plugin");

        let mut plugins = self.plugins.write();
        if plugins.contains_key(&plugin_id) {
            return Err(PlugvisorError::AlreadyRegistered { plugin_id });
        }
        plugins.insert(plugin_id.clone(), plugin);
        drop(plugins);

        debug!(plugin_id = %plugin_id, "plugin registered");
        Ok(())
    }

    /// Removes and returns the entry for `plugin_id`.
    pub fn unregister(&self, plugin_id: &str) -> Result<Arc<Plugin>> {
        let removed = self.plugins.write().remove(plugin_id);
        match removed {
            Some(plugin) => {
                debug!(plugin_id, "plugin unregistered");
                Ok(plugin)
            }
            None => Err(PlugvisorError::NotRegistered {
                plugin_id: plugin_id.to_string(),
            }),
        }
    }

    /// Dispatch-eligible plugin: present and not decommissioned.
    pub fn plugin(&self, plugin_id: &str) -> Option<Arc<Plugin>> {
        let plugin = self.plugins.read().get(plugin_id).cloned()?;
        (!plugin.is_decommissioned()).then_some(plugin)
    }

    /// Like [`plugin`](Self::plugin), additionally requiring a matching type.
    pub fn plugin_by_type(&self, plugin_id: &str, plugin_type: PluginType) -> Option<Arc<Plugin>> {
        self.plugin(plugin_id)
            .filter(|p| p.plugin_type() == plugin_type)
    }

    /// Registered plugins whose type is in `types`; an empty slice means all types.
    pub fn plugins(&self, types: &[PluginType]) -> Vec<Arc<Plugin>> {
        let types = if types.is_empty() {
            &PluginType::ALL[..]
        } else {
            types
        };
        self.plugins
            .read()
            .values()
            .filter(|p| types.contains(&p.plugin_type()))
            .cloned()
            .collect()
    }

    pub fn is_registered(&self, plugin_id: &str) -> bool {
        self.plugin(plugin_id).is_some()
    }

    /// Whether an entry exists at all, decommissioned or not.
    pub fn is_supported(&self, plugin_id: &str) -> bool {
        self.plugins.read().contains_key(plugin_id)
    }

    pub fn renderer(&self) -> Option<Arc<Plugin>> {
        self.plugins
            .read()
            .values()
            .find(|p| p.is_renderer())
            .cloned()
    }

    pub fn static_routes(&self) -> Vec<PluginStaticRoute> {
        self.plugins
            .read()
            .values()
            .filter_map(|p| p.static_route())
            .collect()
    }

    /// Every entry, including decommissioned ones still awaiting removal.
    pub fn snapshot(&self) -> Vec<Arc<Plugin>> {
        self.plugins.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PluginMetadata;
    use plugvisor_core::PluginClass;

    fn plugin(id: &str, plugin_type: PluginType) -> Arc<Plugin> {
        Arc::new(Plugin::new(
            id,
            plugin_type,
            PluginClass::External,
            format!("/plugins/{id}"),
            PluginMetadata::default(),
        ))
    }

    #[test]
    fn register_twice_fails() {
        let registry = PluginRegistry::new();
        registry.register(plugin("acme", PluginType::Datasource)).unwrap();
        let err = registry
            .register(plugin("acme", PluginType::Datasource))
            .unwrap_err();
        assert!(matches!(err, PlugvisorError::AlreadyRegistered { plugin_id } if plugin_id == "acme"));
    }

    #[test]
    fn lookup_after_unregister_is_absent() {
        let registry = PluginRegistry::new();
        registry.register(plugin("acme", PluginType::Datasource)).unwrap();
        registry.unregister("acme").unwrap();
        assert!(registry.plugin("acme").is_none());
        assert!(matches!(
            registry.unregister("acme").unwrap_err(),
            PlugvisorError::NotRegistered { .. }
        ));
        registry.register(plugin("acme", PluginType::Datasource)).unwrap();
    }

    #[test]
    fn decommissioned_entry_is_hidden_but_present() {
        let registry = PluginRegistry::new();
        let p = plugin("acme", PluginType::Datasource);
        registry.register(p.clone()).unwrap();

        p.decommission();
        assert!(registry.plugin("acme").is_none());
        assert!(!registry.is_registered("acme"));
        assert!(registry.is_supported("acme"));
        assert_eq!(registry.snapshot().len(), 1);

        // still blocks a re-register until removed
        assert!(registry.register(plugin("acme", PluginType::Datasource)).is_err());
    }

    #[test]
    fn list_filters_by_type() {
        let registry = PluginRegistry::new();
        registry.register(plugin("ds", PluginType::Datasource)).unwrap();
        registry.register(plugin("panel", PluginType::Panel)).unwrap();
        registry.register(plugin("render", PluginType::Renderer)).unwrap();

        assert_eq!(registry.plugins(&[]).len(), 3);
        let panels = registry.plugins(&[PluginType::Panel]);
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].id(), "panel");
        assert_eq!(
            registry
                .plugins(&[PluginType::Datasource, PluginType::Renderer])
                .len(),
            2
        );
        assert_eq!(registry.renderer().unwrap().id(), "render");
        assert!(registry.plugin_by_type("ds", PluginType::Panel).is_none());
        assert!(registry.plugin_by_type("ds", PluginType::Datasource).is_some());
    }

    #[test]
    fn concurrent_registration_admits_one() {
        let registry = Arc::new(PluginRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register(plugin("acme", PluginType::App)).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }
}
