//! Configuration management for the mdedit client

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MdeditError, Result};

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub socket: SocketConfig,
    pub editor: EditorConfig,
    pub flash: FlashConfig,
    pub storage: StorageConfig,
    pub dev_mode: bool,
}

/// Live connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Endpoint the live socket connects to
    pub endpoint: String,
    /// Delay before falling back to long polling, in milliseconds
    pub long_poll_fallback_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            endpoint: "/live".to_string(),
            long_poll_fallback_ms: 2500,
        }
    }
}

/// Modifier accepted for the save shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveModifier {
    /// Either Ctrl or Meta (Cmd)
    #[default]
    Either,
    Ctrl,
    Meta,
}

/// Editing surface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Route prefix of editor pages, `/editor` matches `/editor/<slug>`
    pub route_prefix: String,
    /// Selector of the element that performs the save action
    pub save_selector: String,
    pub save_modifier: SaveModifier,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            route_prefix: "/editor".to_string(),
            save_selector: "[phx-click=\"save_document\"]".to_string(),
            save_modifier: SaveModifier::Either,
        }
    }
}

/// Flash message settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Delay before a mounted flash message dismisses itself
    pub dismiss_delay_ms: u64,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            dismiss_delay_ms: 1000,
        }
    }
}

impl FlashConfig {
    pub fn dismiss_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.dismiss_delay_ms)
    }
}

/// Durable client storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Namespace prefix of capability token keys
    pub token_key_prefix: String,
    /// Backing file for durable storage, in-memory when absent
    pub file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_key_prefix: "admin_token_".to_string(),
            file: None,
        }
    }
}

/// Outcome of a configuration validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ClientConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MdeditError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| MdeditError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MdeditError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| MdeditError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration, failing on the first pass with errors
    pub fn validate(&self) -> Result<ValidationResult> {
        let result = self.check();

        if !result.is_valid {
            return Err(MdeditError::Config(format!(
                "Configuration validation failed: {}",
                result.errors.join("; ")
            )));
        }

        for warning in &result.warnings {
            tracing::warn!("Configuration warning: {}", warning);
        }

        Ok(result)
    }

    /// Collect every validation error and warning without failing
    pub fn check(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.socket.endpoint.trim().is_empty() {
            result
                .errors
                .push("socket.endpoint must not be empty".to_string());
        }

        let prefix = &self.editor.route_prefix;
        if !prefix.starts_with('/') {
            result
                .errors
                .push(format!("editor.route_prefix must start with '/': {}", prefix));
        } else if prefix.len() > 1 && prefix.ends_with('/') {
            result.errors.push(format!(
                "editor.route_prefix must not end with '/': {}",
                prefix
            ));
        }

        if self.editor.save_selector.trim().is_empty() {
            result
                .errors
                .push("editor.save_selector must not be empty".to_string());
        }

        if self.storage.token_key_prefix.is_empty() {
            result
                .errors
                .push("storage.token_key_prefix must not be empty".to_string());
        }

        if self.flash.dismiss_delay_ms == 0 {
            result
                .errors
                .push("flash.dismiss_delay_ms must be greater than zero".to_string());
        } else if self.flash.dismiss_delay_ms > 60_000 {
            result.warnings.push(format!(
                "flash.dismiss_delay_ms is {}ms, messages will linger for over a minute",
                self.flash.dismiss_delay_ms
            ));
        }

        if self.socket.long_poll_fallback_ms == 0 {
            result.warnings.push(
                "socket.long_poll_fallback_ms is 0, long polling starts immediately".to_string(),
            );
        }

        result.is_valid = result.errors.is_empty();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_client_behaviour() {
        let config = ClientConfig::new();
        assert_eq!(config.socket.endpoint, "/live");
        assert_eq!(config.socket.long_poll_fallback_ms, 2500);
        assert_eq!(config.editor.route_prefix, "/editor");
        assert_eq!(config.editor.save_selector, "[phx-click=\"save_document\"]");
        assert_eq!(config.flash.dismiss_delay(), std::time::Duration::from_secs(1));
        assert_eq!(config.storage.token_key_prefix, "admin_token_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"flash": {"dismiss_delay_ms": 250}, "dev_mode": true}"#)
                .unwrap();
        assert_eq!(config.flash.dismiss_delay_ms, 250);
        assert!(config.dev_mode);
        assert_eq!(config.socket.endpoint, "/live");
        assert_eq!(config.editor.save_modifier, SaveModifier::Either);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mdedit.json");

        let mut config = ClientConfig::new();
        config.editor.save_modifier = SaveModifier::Meta;
        config.save_to_file(&path).unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ClientConfig::from_file(Path::new("/nonexistent/mdedit.json")).unwrap_err();
        assert!(matches!(err, MdeditError::Config(_)));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ClientConfig::new();
        config.editor.route_prefix = "editor/".to_string();
        config.flash.dismiss_delay_ms = 0;
        config.storage.token_key_prefix.clear();

        let result = config.check();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trailing_slash_prefix_rejected() {
        let mut config = ClientConfig::new();
        config.editor.route_prefix = "/editor/".to_string();
        assert!(!config.check().is_valid);

        config.editor.route_prefix = "/".to_string();
        assert!(config.check().is_valid);
    }

    #[test]
    fn test_validation_warnings() {
        let mut config = ClientConfig::new();
        config.flash.dismiss_delay_ms = 120_000;

        let result = config.validate().unwrap();
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
