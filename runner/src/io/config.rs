//! Runner configuration stored under `.aisec/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::task::ToolConfig;

/// Scan runner configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; a missing file is
/// equivalent to all defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Total session wall-clock budget in seconds.
    pub session_timeout_secs: u64,

    /// Truncate agent stdout/stderr kept in memory beyond this many bytes.
    pub output_limit_bytes: usize,

    pub tools: ToolConfig,
    pub bridge: BridgeLocation,
}

/// Where the bridge server checkout lives, relative to the repo root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeLocation {
    /// Bridge checkout directory.
    pub dir: String,
    /// Server entry point, relative to `dir`.
    pub entry: String,
}

impl Default for BridgeLocation {
    fn default() -> Self {
        Self {
            dir: "ai-defense-mcp".to_string(),
            entry: "src/server.py".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
            tools: ToolConfig::default(),
            bridge: BridgeLocation::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.session_timeout_secs == 0 {
            return Err(anyhow!("session_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.tools.read_only.is_empty() {
            return Err(anyhow!("tools.read_only must be a non-empty array"));
        }
        if self.bridge.dir.trim().is_empty() || self.bridge.entry.trim().is_empty() {
            return Err(anyhow!("bridge.dir and bridge.entry must be non-empty"));
        }
        Ok(())
    }
}

/// Default config file location under the repo root.
pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".aisec").join("config.toml")
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ScanConfig::default()`.
pub fn load_config(path: &Path) -> Result<ScanConfig> {
    if !path.exists() {
        let cfg = ScanConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ScanConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
