//! SDK configuration loader.
//!
//! Reads a `cairn.toml` file into [`SdkConfig`]. `load_sdk_config` is
//! forgiving and falls back to defaults; `read_sdk_config` reports every
//! failure and is used when the caller named the file explicitly.

use std::path::{Path, PathBuf};

use cairn_types::config::SdkConfig;
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "cairn.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load `{dir}/cairn.toml`.
///
/// - Missing file: returns [`SdkConfig::default()`].
/// - Unreadable or malformed file: logs a warning and returns the default.
pub fn load_sdk_config(dir: &Path) -> SdkConfig {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", path.display());
        return SdkConfig::default();
    }
    match read_sdk_config(&path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            SdkConfig::default()
        }
    }
}

/// Read and parse the configuration file at `path`.
pub fn read_sdk_config(path: &Path) -> Result<SdkConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_sdk_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_sdk_config(tmp.path());
        assert_eq!(config, SdkConfig::default());
    }

    #[test]
    fn load_sdk_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
service = "storage"
require_common_namespace = false
"#,
        )
        .unwrap();

        let config = load_sdk_config(tmp.path());
        assert_eq!(config.service, "storage");
        assert!(!config.require_common_namespace);
        assert!(config.strict_type_names);
    }

    #[test]
    fn load_sdk_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "this is not { valid toml !!!").unwrap();

        let config = load_sdk_config(tmp.path());
        assert_eq!(config, SdkConfig::default());
    }

    #[test]
    fn read_sdk_config_reports_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.toml");
        let err = read_sdk_config(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "got: {err:?}");

        let bad = tmp.path().join("bad.toml");
        std::fs::write(&bad, "service = 3").unwrap();
        let err = read_sdk_config(&bad).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse"), "got: {err}");
    }
}
