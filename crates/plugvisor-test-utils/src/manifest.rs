// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plugin.json` fixtures plus the finder and loader that read them back.

use std::fs;
use std::path::{Path, PathBuf};

use plugvisor_core::{PluginClass, PluginType, PlugvisorError, Result};
use plugvisor_plugin::{Plugin, PluginFinder, PluginLoader, PluginMetadata};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "plugin.json";

/// On-disk manifest shape used by the fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    #[serde(default = "default_class")]
    pub class: PluginClass,
    #[serde(flatten)]
    pub metadata: PluginMetadata,
}

fn default_class() -> PluginClass {
    PluginClass::External
}

/// Builder that writes `<root>/<dir>/plugin.json`.
#[derive(Debug, Clone)]
pub struct ManifestFixture {
    dir_name: String,
    manifest: ManifestFile,
}

impl ManifestFixture {
    /// An external datasource without a backend, version 1.0.0.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut metadata = PluginMetadata {
            name: id.clone(),
            ..Default::default()
        };
        metadata.info.version = "1.0.0".to_string();
        Self {
            dir_name: id.clone(),
            manifest: ManifestFile {
                id,
                plugin_type: PluginType::Datasource,
                class: PluginClass::External,
                metadata,
            },
        }
    }

    pub fn plugin_type(mut self, plugin_type: PluginType) -> Self {
        self.manifest.plugin_type = plugin_type;
        self
    }

    pub fn class(mut self, class: PluginClass) -> Self {
        self.manifest.class = class;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.manifest.metadata.info.version = version.into();
        self
    }

    pub fn backend(mut self, executable: impl Into<String>) -> Self {
        self.manifest.metadata.backend = true;
        self.manifest.metadata.executable = executable.into();
        self
    }

    /// Directory name under the root, defaulting to the plugin id.
    pub fn dir_name(mut self, dir_name: impl Into<String>) -> Self {
        self.dir_name = dir_name.into();
        self
    }

    /// Writes the manifest, returning the plugin directory.
    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join(&self.dir_name);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| PlugvisorError::Internal(format!("failed to encode manifest: {e}")))?;
        fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(dir)
    }
}

/// Finds every `plugin.json` below a directory, in sorted path order.
#[derive(Debug, Default)]
pub struct JsonManifestFinder;

impl JsonManifestFinder {
    fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        let mut entries = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();
        for path in entries {
            if path.is_dir() {
                Self::walk(&path, found)?;
            } else if path.file_name().is_some_and(|n| n == MANIFEST_FILE) {
                found.push(path);
            }
        }
        Ok(())
    }
}

impl PluginFinder for JsonManifestFinder {
    fn find(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        Self::walk(dir, &mut found)?;
        Ok(found)
    }
}

/// Parses [`ManifestFile`]s into plugins rooted at the manifest's directory.
#[derive(Debug, Default)]
pub struct JsonManifestLoader;

impl PluginLoader for JsonManifestLoader {
    fn load(&self, manifest_path: &Path) -> Result<Plugin> {
        let bytes = fs::read(manifest_path)?;
        let manifest: ManifestFile =
            serde_json::from_slice(&bytes).map_err(|e| PlugvisorError::Loader {
                message: format!("invalid manifest {}", manifest_path.display()),
                source: Some(Box::new(e)),
            })?;
        let plugin_dir = manifest_path.parent().unwrap_or(Path::new("")).to_path_buf();
        Ok(Plugin::new(
            manifest.id,
            manifest.plugin_type,
            manifest.class,
            plugin_dir,
            manifest.metadata,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_round_trip_through_finder_and_loader() {
        let root = tempfile::tempdir().unwrap();
        ManifestFixture::new("acme").version("2.0.0").write(root.path()).unwrap();
        ManifestFixture::new("zeta")
            .plugin_type(PluginType::Panel)
            .dir_name("nested/zeta")
            .write(root.path())
            .unwrap();

        let paths = JsonManifestFinder.find(root.path()).unwrap();
        assert_eq!(paths.len(), 2);

        let plugins = JsonManifestLoader.load_all(&paths).unwrap();
        assert_eq!(plugins[0].id(), "acme");
        assert_eq!(plugins[0].version(), "2.0.0");
        assert_eq!(plugins[0].plugin_dir(), root.path().join("acme"));
        assert_eq!(plugins[1].plugin_type(), PluginType::Panel);
    }
}
