// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Plugvisor plugin runtime.
//!
//! TOML configuration with strict key checking, layered file lookup,
//! `PLUGVISOR_` environment overrides, and miette diagnostics.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PlugvisorConfig;

use plugvisor_core::PlugvisorError;

/// Load configuration from the standard hierarchy and validate it.
pub fn load_and_validate() -> Result<PlugvisorConfig, Vec<ConfigError>> {
    finish(loader::load_config())
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<PlugvisorConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content))
}

fn finish(
    loaded: Result<PlugvisorConfig, figment::Error>,
) -> Result<PlugvisorConfig, Vec<ConfigError>> {
    let config = loaded.map_err(diagnostic::figment_to_config_errors)?;
    if let Err(errors) = validation::validate_config(&config) {
        tracing::debug!(count = errors.len(), "configuration failed validation");
        return Err(errors);
    }
    Ok(config)
}

/// Collapse diagnostics into a single runtime error for callers that do not render them.
pub fn into_runtime_error(errors: &[ConfigError]) -> PlugvisorError {
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    PlugvisorError::Config(joined)
}
