//! The discovery record: a small properties file telling the bridge client
//! where the running server listens. Its absence means "not running".

use std::collections::BTreeMap;

use ferrule_core::FerrulePaths;

use crate::{read_optional, remove_if_exists, write_atomic};

const HEADER: &str = "# Ferrule bridge runtime properties";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRecord {
    pub ide: String,
    /// Full URL, e.g. `http://127.0.0.1:53211/endpoint-…`.
    pub endpoint: String,
    pub port: u16,
    pub version: String,
    pub supported_actions: Vec<String>,
}

impl DiscoveryRecord {
    /// Render as `key=value` lines with a header and a UTC timestamp comment.
    pub fn render(&self) -> String {
        let ts = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc2822)
            .unwrap_or_default();
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        out.push_str(&format!("# {ts}\n"));
        for (key, value) in [
            ("ide", self.ide.clone()),
            ("endpoint", self.endpoint.clone()),
            ("port", self.port.to_string()),
            ("version", self.version.clone()),
            ("supportedActions", self.supported_actions.join(",")),
        ] {
            out.push_str(key);
            out.push('=');
            out.push_str(&escape(&value));
            out.push('\n');
        }
        out
    }

    /// Parse a rendered record. Comments and unknown keys are ignored.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut props = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                props.insert(k.trim().to_string(), unescape(v));
            }
        }
        let get = |key: &str| {
            props
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("discovery record is missing '{key}'"))
        };
        let port = get("port")?
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("discovery record has a bad port: {e}"))?;
        let supported_actions = get("supportedActions")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(Self {
            ide: get("ide")?,
            endpoint: get("endpoint")?,
            port,
            version: get("version")?,
            supported_actions,
        })
    }
}

/// Write the record atomically, creating the discovery directory if needed.
pub fn publish(paths: &FerrulePaths, record: &DiscoveryRecord) -> anyhow::Result<()> {
    if !paths.discovery_dir.exists() {
        std::fs::create_dir_all(&paths.discovery_dir)?;
        tracing::info!(dir = %paths.discovery_dir.display(), "created discovery directory");
    }
    write_atomic(&paths.discovery_file, record.render().as_bytes())
}

/// Read the current record. `Ok(None)` when no server is advertised.
pub fn read(paths: &FerrulePaths) -> anyhow::Result<Option<DiscoveryRecord>> {
    match read_optional(&paths.discovery_file)? {
        Some(bytes) => Ok(Some(DiscoveryRecord::parse(&String::from_utf8_lossy(&bytes))?)),
        None => Ok(None),
    }
}

/// Delete the record. Returns whether one existed.
pub fn delete(paths: &FerrulePaths) -> anyhow::Result<bool> {
    remove_if_exists(&paths.discovery_file)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
