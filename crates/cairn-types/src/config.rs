//! SDK configuration types.
//!
//! `SdkConfig` represents the optional `cairn.toml` that controls how a
//! service keys its definitions and how strictly record types are checked
//! when the registry is published.

use serde::{Deserialize, Serialize};

/// Service identifier used when none is configured.
pub const DEFAULT_SERVICE: &str = "activity";

/// Top-level configuration for a service's definition registry.
///
/// All fields have defaults, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Identifier that keys every published definition externally.
    #[serde(default = "default_service")]
    pub service: String,

    /// Reject record type names that are not dotted identifiers.
    #[serde(default = "default_true")]
    pub strict_type_names: bool,

    /// Fail publication when registered types share no namespace.
    #[serde(default = "default_true")]
    pub require_common_namespace: bool,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            strict_type_names: true,
            require_common_namespace: true,
        }
    }
}

impl SdkConfig {
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_config_default_values() {
        let config = SdkConfig::default();
        assert_eq!(config.service, "activity");
        assert!(config.strict_type_names);
        assert!(config.require_common_namespace);
    }

    #[test]
    fn test_sdk_config_deserialize_with_defaults() {
        let config: SdkConfig = toml::from_str("").unwrap();
        assert_eq!(config, SdkConfig::default());
    }

    #[test]
    fn test_sdk_config_deserialize_with_values() {
        let toml_str = r#"
service = "storage"
strict_type_names = false
"#;
        let config: SdkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service, "storage");
        assert!(!config.strict_type_names);
        assert!(config.require_common_namespace);
    }

    #[test]
    fn test_sdk_config_serde_roundtrip() {
        let config = SdkConfig::for_service("compute");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SdkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
