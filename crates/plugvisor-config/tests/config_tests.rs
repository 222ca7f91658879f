// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Plugvisor configuration system.

use std::path::Path;

use plugvisor_config::diagnostic::ConfigError;
use plugvisor_config::model::PLUGIN_MANAGER_TOGGLE;
use plugvisor_config::{into_runtime_error, load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes() {
    let toml = r#"
[paths]
static_root_path = "/srv/public"
bundled_plugins_path = "/srv/bundled"
plugins_path = "/var/lib/plugvisor/plugins"

[plugins]
repository_url = "https://example.com/api/plugins"
build_version = "8.1.0"
resource_body_limit_bytes = 1024

[feature_toggles]
pluginManagerV2 = false

[log]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.paths.static_root_path, Path::new("/srv/public"));
    assert_eq!(
        config.paths.plugins_path,
        Path::new("/var/lib/plugvisor/plugins")
    );
    assert_eq!(config.plugins.build_version, "8.1.0");
    assert_eq!(config.plugins.resource_body_limit_bytes, 1024);
    assert!(!config.is_feature_enabled(PLUGIN_MANAGER_TOGGLE));
    assert_eq!(config.log.level, "debug");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert!(config.is_feature_enabled(PLUGIN_MANAGER_TOGGLE));
    assert_eq!(config.log.level, "info");
}

#[test]
fn unknown_key_reports_suggestion() {
    let toml = r#"
[paths]
plugin_path = "/tmp/plugins"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "plugin_path");
            assert_eq!(suggestion.as_deref(), Some("plugins_path"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[log]
level = "verbose"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));

    let runtime = into_runtime_error(&errors);
    assert!(runtime.to_string().contains("log.level"));
}
