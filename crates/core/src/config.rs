// SPDX-License-Identifier: MIT

//! Service configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file is a
//! valid zero-config start. Intervals use humantime strings ("30s", "3h").

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("interval must be non-zero: {0}")]
    ZeroInterval(&'static str),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding state.json, permissions.json and unblocked.json
    pub data_dir: PathBuf,
    /// Directory receiving timestamped state backups
    pub backup_dir: PathBuf,
    /// Directory receiving daemon log files
    pub log_dir: PathBuf,
    /// How often one group's tracked profiles are polled for drift
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// How often one group receives a full reconciliation sweep
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// How often in-memory state is snapshotted to the primary file
    #[serde(with = "humantime_serde")]
    pub snapshot_interval: Duration,
    /// How often a timestamped backup copy is written
    #[serde(with = "humantime_serde")]
    pub backup_interval: Duration,
    /// How long a confirmation prompt stays interactive
    #[serde(with = "humantime_serde")]
    pub prompt_timeout: Duration,
    /// How long ephemeral replies linger before the reply transport deletes
    /// them; contract-only here, the transport lives outside this workspace
    #[serde(with = "humantime_serde")]
    pub reply_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            backup_dir: PathBuf::from("backups"),
            log_dir: PathBuf::from("logs"),
            poll_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(3 * 60 * 60),
            snapshot_interval: Duration::from_secs(60),
            backup_interval: Duration::from_secs(12 * 60 * 60),
            prompt_timeout: Duration::from_secs(40),
            reply_ttl: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load from a TOML file; an absent file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, interval) in [
            ("poll_interval", self.poll_interval),
            ("sweep_interval", self.sweep_interval),
            ("snapshot_interval", self.snapshot_interval),
            ("backup_interval", self.backup_interval),
            ("prompt_timeout", self.prompt_timeout),
            ("reply_ttl", self.reply_ttl),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn permissions_path(&self) -> PathBuf {
        self.data_dir.join("permissions.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join("unblocked.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.sweep_interval, Duration::from_secs(10800));
        assert_eq!(config.state_path(), PathBuf::from("data/state.json"));
    }

    #[test]
    fn humantime_intervals_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "poll_interval = \"10s\"\nsweep_interval = \"1h\"\ndata_dir = \"/var/lib/warden\""
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(
            config.state_path(),
            PathBuf::from("/var/lib/warden/state.json")
        );
        // Unspecified fields keep their defaults
        assert_eq!(config.snapshot_interval, Duration::from_secs(60));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "poll_interval = \"0s\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval("poll_interval")));

        std::fs::write(&path, "reply_ttl = \"0s\"").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval("reply_ttl")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "pol_interval = \"30s\"").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
