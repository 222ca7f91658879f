// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./plugvisor.toml` > `~/.config/plugvisor/plugvisor.toml` >
//! `/etc/plugvisor/plugvisor.toml`, with `PLUGVISOR_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PlugvisorConfig;

/// Config sections addressable from environment variables.
const ENV_SECTIONS: [&str; 3] = ["paths", "plugins", "log"];

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<PlugvisorConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PlugvisorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlugvisorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PlugvisorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlugvisorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PlugvisorConfig::default()))
        .merge(Toml::file("/etc/plugvisor/plugvisor.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("plugvisor/plugvisor.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("plugvisor.toml"))
        .merge(env_provider())
}

/// Maps `PLUGVISOR_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the leading section is split off, so `PLUGVISOR_PATHS_PLUGINS_PATH`
/// becomes `paths.plugins_path` rather than `paths.plugins.path`.
fn env_provider() -> Env {
    Env::prefixed("PLUGVISOR_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_the_section() {
        assert_eq!(map_env_key("paths_plugins_path"), "paths.plugins_path");
        assert_eq!(map_env_key("plugins_repository_url"), "plugins.repository_url");
        assert_eq!(map_env_key("log_level"), "log.level");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[paths]
plugins_path = "/from/file"
"#,
            )?;
            jail.set_env("PLUGVISOR_PATHS_PLUGINS_PATH", "/from/env");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.paths.plugins_path, Path::new("/from/env"));
            Ok(())
        });
    }
}
