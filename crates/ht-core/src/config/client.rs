//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::detach_keys::DetachKeys;

/// Configuration for interactive sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Detach sequence, e.g. `"ctrl-p,ctrl-q"`
    pub detach_keys: Option<String>,

    /// Poll interval used when the platform has no window-change signal
    #[serde(rename = "resize_poll_interval_ms", with = "duration_millis")]
    pub resize_poll_interval: Duration,

    /// Forward received signals to non-TTY sessions by default
    pub proxy_signals: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            detach_keys: None,
            resize_poll_interval: Duration::from_millis(250),
            proxy_signals: true,
        }
    }
}

impl ClientConfig {
    /// Load from `path`, or the default location when `None`
    ///
    /// A missing file yields defaults. A broken file is reported and
    /// replaced by defaults rather than failing the command.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let default_path = super::default_config_path();
        let path = path.unwrap_or(default_path.as_path());

        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        super::load_config(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Effective detach keys given an optional command-line override
    pub fn detach_keys(&self, flag: Option<&str>) -> DetachKeys {
        DetachKeys::resolve(flag, self.detach_keys.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, save_config};

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.detach_keys, None);
        assert_eq!(config.resize_poll_interval, Duration::from_millis(250));
        assert!(config.proxy_signals);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ClientConfig = toml::from_str(r#"detach_keys = "ctrl-x,x""#).unwrap();
        assert_eq!(config.detach_keys.as_deref(), Some("ctrl-x,x"));
        assert!(config.proxy_signals);
        assert_eq!(config.detach_keys(None).as_bytes(), &[0x18, b'x']);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ClientConfig {
            detach_keys: Some("ctrl-a,d".to_string()),
            resize_poll_interval: Duration::from_millis(100),
            proxy_signals: false,
        };
        save_config(&path, &config).unwrap();

        let loaded: ClientConfig = load_config(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(ClientConfig::load_or_default(Some(&path)), config);
    }

    #[test]
    fn test_broken_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "detach_keys = [").unwrap();

        assert_eq!(
            ClientConfig::load_or_default(Some(&path)),
            ClientConfig::default()
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert_eq!(
            ClientConfig::load_or_default(Some(&path)),
            ClientConfig::default()
        );
    }

    #[test]
    fn test_flag_overrides_file() {
        let config = ClientConfig {
            detach_keys: Some("ctrl-a".to_string()),
            ..Default::default()
        };
        assert_eq!(config.detach_keys(Some("ctrl-b")).as_bytes(), &[0x02]);
    }
}
