//! Sync configuration file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.schoolsync/
//!   config.yaml     (this file — mode 0600, optional)
//!   refresh.json    (refresh timestamps, owned by schoolsync-sync)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths::{config_path, schoolsync_root};

pub const DEFAULT_SERVICES_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_VERIFICATION_RATE: f64 = 0.01;
pub const DEFAULT_MAX_CONCURRENT_WORKS: usize = 4;

/// Tunables for the cache/sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes after which a cache key is considered stale.
    pub services_interval_minutes: u64,
    /// Whether background sync stamps new records as pending notification.
    pub notifications_enabled: bool,
    /// Probability that a scoped work verifies every member of a group.
    /// `0.0` never verifies, `1.0` always does.
    pub verification_rate: f64,
    /// Upper bound of works a sync run executes concurrently.
    pub max_concurrent_works: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            services_interval_minutes: DEFAULT_SERVICES_INTERVAL_MINUTES,
            notifications_enabled: true,
            verification_rate: DEFAULT_VERIFICATION_RATE,
            max_concurrent_works: DEFAULT_MAX_CONCURRENT_WORKS,
        }
    }
}

impl SyncConfig {
    /// Staleness interval as a [`Duration`].
    pub fn services_interval(&self) -> Duration {
        Duration::from_secs(self.services_interval_minutes * 60)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "services_interval_minutes must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.verification_rate) {
            return Err(ConfigError::Invalid(format!(
                "verification_rate must be within 0..=1, got {}",
                self.verification_rate
            )));
        }
        if self.max_concurrent_works == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_works must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `<home>/.schoolsync/config.yaml`.
///
/// A missing file yields [`SyncConfig::default`]. Missing fields fall back to
/// their defaults; out-of-range values are rejected.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let path = config_path(home);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config: SyncConfig = serde_yaml::from_str(&contents)
        .map_err(|source| ConfigError::Parse { path, source })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save `config` to `<home>/.schoolsync/config.yaml`.
///
/// Write flow: validate → serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let root = schoolsync_root(home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let path = config_path(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &SyncConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let config = load_at(tmp.path()).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.services_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let config = SyncConfig {
            services_interval_minutes: 15,
            notifications_enabled: false,
            verification_rate: 1.0,
            max_concurrent_works: 2,
        };
        save_at(tmp.path(), &config).unwrap();
        assert_eq!(load_at(tmp.path()).unwrap(), config);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &SyncConfig::default()).unwrap();
        let tmp_path = config_path(tmp.path()).with_extension("yaml.tmp");
        assert!(!tmp_path.exists(), "tmp file should be renamed away");
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "services_interval_minutes: 30\n").unwrap();

        let config = load_at(tmp.path()).unwrap();
        assert_eq!(config.services_interval_minutes, 30);
        assert!(config.notifications_enabled);
        assert_eq!(config.verification_rate, DEFAULT_VERIFICATION_RATE);
    }

    #[test]
    fn rejects_out_of_range_rate() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "verification_rate: 1.5\n").unwrap();

        let err = load_at(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "services_interval_minutes: [oops\n").unwrap();

        match load_at(tmp.path()).unwrap_err() {
            ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn save_refuses_zero_interval() {
        let tmp = TempDir::new().unwrap();
        let config = SyncConfig {
            services_interval_minutes: 0,
            ..SyncConfig::default()
        };
        assert!(save_at(tmp.path(), &config).is_err());
        assert!(!config_path(tmp.path()).exists());
    }
}
