// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::PlugvisorConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration, collecting every failure.
pub fn validate_config(config: &PlugvisorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let paths = [
        ("paths.static_root_path", &config.paths.static_root_path),
        ("paths.bundled_plugins_path", &config.paths.bundled_plugins_path),
        ("paths.plugins_path", &config.paths.plugins_path),
    ];
    for (key, path) in paths {
        if path.as_os_str().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    let url = config.plugins.repository_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        errors.push(ConfigError::Validation {
            message: format!("plugins.repository_url `{url}` must be an http(s) URL"),
        });
    }

    if let Err(e) = semver::Version::parse(&config.plugins.build_version) {
        errors.push(ConfigError::Validation {
            message: format!(
                "plugins.build_version `{}` is not a semantic version: {e}",
                config.plugins.build_version
            ),
        });
    }

    if config.plugins.resource_body_limit_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "plugins.resource_body_limit_bytes must be greater than zero".to_string(),
        });
    }

    if config.plugins.stop_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "plugins.stop_timeout_secs must be greater than zero".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` must be one of: {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
