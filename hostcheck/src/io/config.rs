//! Check configuration stored in `hostcheck.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::types::Policy;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "hostcheck.toml";

/// Check configuration (TOML).
///
/// Missing fields default to the well-known host locations.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckConfig {
    /// JSON state document written by the provisioning run.
    pub snapshot_path: PathBuf,

    /// Directory scanned for declarative `*.toml` unit definitions.
    pub units_dir: PathBuf,

    /// Per-request timeout for HTTP fetch helpers.
    pub http_timeout_secs: u64,

    /// Keep running after failures instead of halting on the first one.
    pub continue_on_failure: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("/var/lib/hostcheck/snapshot.json"),
            units_dir: PathBuf::from("units"),
            http_timeout_secs: 30,
            continue_on_failure: false,
        }
    }
}

impl CheckConfig {
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(anyhow!("snapshot_path must be non-empty"));
        }
        if self.units_dir.as_os_str().is_empty() {
            return Err(anyhow!("units_dir must be non-empty"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn policy(&self) -> Policy {
        Policy::from_continue_flag(self.continue_on_failure)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CheckConfig::default()`.
pub fn load_config(path: &Path) -> Result<CheckConfig> {
    if !path.exists() {
        let cfg = CheckConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CheckConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CheckConfig::default());
        assert_eq!(cfg.policy(), Policy::Halt);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("hostcheck.toml");
        fs::write(
            &path,
            "snapshot_path = \"/tmp/state.json\"\ncontinue_on_failure = true\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.snapshot_path, PathBuf::from("/tmp/state.json"));
        assert_eq!(cfg.units_dir, PathBuf::from("units"));
        assert_eq!(cfg.policy(), Policy::Continue);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("hostcheck.toml");
        fs::write(&path, "http_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("http_timeout_secs"));
    }

    #[test]
    fn rejects_unparseable_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("hostcheck.toml");
        fs::write(&path, "snapshot_path = [").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(err.to_string().starts_with("parse "));
    }
}
