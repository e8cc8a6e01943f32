//! Bridge configuration
//!
//! Loaded from a TOML file. Every field has a default, so a missing file or
//! a partial file is fine.

use std::path::Path;

use bridge_types::NamingConvention;
use bridge_ui::UiOptions;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub bridge: BridgeSection,
    pub log: LogConfig,
    pub ipc: IpcConfig,
}

/// Controller binding options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Case style for member names sent to the UI
    pub naming: NamingConvention,
    /// Whether the UI calls the internal warm-up method after binding
    pub warm_up: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            naming: NamingConvention::CamelCase,
            warm_up: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "bridge=info".to_string(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Largest accepted frame in bytes
    pub max_frame_len: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `path`; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !fs::try_exists(path).await? {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let config: BridgeConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Options for a UI runtime bound to this host
    pub fn ui_options(&self) -> UiOptions {
        UiOptions {
            warm_up: self.bridge.warm_up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BridgeConfig::load(dir.path().join("bridge.toml")).await.unwrap();

        assert_eq!(config.bridge.naming, NamingConvention::CamelCase);
        assert!(config.bridge.warm_up);
        assert_eq!(config.log.filter, "bridge=info");
        assert_eq!(config.ipc.max_frame_len, 16 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bridge.toml");
        fs::write(
            &path,
            r#"
[bridge]
naming = "normal"

[ipc]
max_frame_len = 1024
"#,
        )
        .await
        .unwrap();

        let config = BridgeConfig::load(&path).await.unwrap();
        assert_eq!(config.bridge.naming, NamingConvention::Normal);
        assert!(config.bridge.warm_up);
        assert_eq!(config.ipc.max_frame_len, 1024);
        assert!(config.ui_options().warm_up);
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bridge.toml");
        fs::write(&path, "[bridge]\nnaming = \"shouting\"\n").await.unwrap();

        assert!(matches!(
            BridgeConfig::load(&path).await,
            Err(ConfigError::TomlParseError(_))
        ));
    }
}
