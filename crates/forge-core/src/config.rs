use crate::error::{ForgeError, Result};
use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// LockConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    10_000
}

fn default_stale_after_ms() -> u64 {
    300_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    #[serde(default = "default_owner")]
    pub default_owner: String,
    #[serde(default)]
    pub lock: LockConfig,
}

fn default_version() -> u32 {
    1
}

fn default_owner() -> String {
    "unassigned".to_string()
}

impl Config {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            default_owner: default_owner(),
            lock: LockConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ForgeError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::config_path(root), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("demo");
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project, "demo");
        assert_eq!(loaded.lock.timeout_ms, 10_000);
    }

    #[test]
    fn load_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()).unwrap_err(),
            ForgeError::NotInitialized
        ));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".forge")).unwrap();
        std::fs::write(dir.path().join(".forge/config.yaml"), "project: demo\n").unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.default_owner, "unassigned");
        assert_eq!(cfg.lock.stale_after_ms, 300_000);
    }
}
