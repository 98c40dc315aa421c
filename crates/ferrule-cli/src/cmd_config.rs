use clap::Subcommand;
use std::path::Path;

use ferrule_core::config::CONFIG_KEYS;
use ferrule_core::{FerruleConfig, FerrulePaths};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (ide, wait_for_completion, operation_timeout_ms, body_limit_mb)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values, including defaults
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(root, &key, &value),
        ConfigCmd::Get { key } => get(root, &key),
        ConfigCmd::List => list(root),
    }
}

// ── Command Implementations ──

/// Read config from `.ferrule/config.json`. Returns empty map if file doesn't exist.
fn read_config(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: serde_json::Value = serde_json::from_str(&content)?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

fn write_config(
    path: &Path,
    config: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&config)?;
    ferrule_store::write_atomic(path, json.as_bytes())
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> serde_json::Value {
    match s {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => match s.parse::<u64>() {
            Ok(n) => serde_json::Value::Number(n.into()),
            Err(_) => serde_json::Value::String(s.to_string()),
        },
    }
}

/// The effective configuration as a JSON map, defaults filled in.
fn effective(paths: &FerrulePaths) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(FerruleConfig::load(paths))? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// `ferrule config set <key> <value>`
pub fn set(root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    if !CONFIG_KEYS.contains(&key) {
        anyhow::bail!("unknown config key '{key}' (known: {})", CONFIG_KEYS.join(", "));
    }
    let paths = FerrulePaths::discover(root);
    let mut config = read_config(&paths.config_json)?;
    config.insert(key.to_string(), parse_value(value));

    // Refuse values the server would not be able to load.
    serde_json::from_value::<FerruleConfig>(serde_json::Value::Object(config.clone()))
        .map_err(|e| anyhow::anyhow!("invalid value for '{key}': {e}"))?;

    write_config(&paths.config_json, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `ferrule config get <key>`
pub fn get(root: &Path, key: &str) -> anyhow::Result<()> {
    let paths = FerrulePaths::discover(root);
    match effective(&paths)?.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `ferrule config list`
pub fn list(root: &Path) -> anyhow::Result<()> {
    let paths = FerrulePaths::discover(root);
    let stored = read_config(&paths.config_json)?;
    for (k, v) in &effective(&paths)? {
        let marker = if stored.contains_key(k) { "" } else { "  (default)" };
        println!("{k} = {v}{marker}");
    }
    Ok(())
}
