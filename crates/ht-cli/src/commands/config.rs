//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{format_config, print_info, print_success, print_warning};
use ht_core::config::{self, ClientConfig};
use ht_core::DetachKeys;

/// Keys accepted by `config set`
const KNOWN_KEYS: &[&str] = &["detach_keys", "resize_poll_interval_ms", "proxy_signals"];

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Show the effective configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);
    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_warning(&format!("No configuration file at {:?}, showing defaults", path));
    }

    let config = ClientConfig::load_or_default(Some(&path));
    print!("{}", format_config(&config));
    Ok(())
}

/// Print the configuration file path
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve_path(config_path).display());
    Ok(())
}

/// Write a configuration file holding the defaults
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {:?} (use --force to overwrite)",
            path
        );
    }

    config::save_config(&path, &ClientConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

/// Set a config value by key
///
/// The result is validated as a whole before it is written, so a bad
/// value never leaves a config file behind that later loads as defaults.
pub fn config_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        anyhow::bail!(
            "Unknown key: {} (expected one of: {})",
            key,
            KNOWN_KEYS.join(", ")
        );
    }

    let path = resolve_path(config_path);
    let mut table: toml::Table = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        toml::Table::new()
    };

    let toml_value = if value == "true" {
        toml::Value::Boolean(true)
    } else if value == "false" {
        toml::Value::Boolean(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(value.to_string())
    };
    table.insert(key.to_string(), toml_value);

    let config: ClientConfig = toml::Value::Table(table)
        .try_into()
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;
    if let Some(keys) = &config.detach_keys {
        DetachKeys::parse(keys).map_err(|e| anyhow::anyhow!("Invalid detach keys: {}", e))?;
    }

    config::save_config(&path, &config)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}
