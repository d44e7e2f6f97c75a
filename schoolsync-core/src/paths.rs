use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const REFRESH_STORE_FILE: &str = "refresh.json";

pub fn schoolsync_root(home: &Path) -> PathBuf {
    home.join(".schoolsync")
}

pub fn config_path(home: &Path) -> PathBuf {
    schoolsync_root(home).join(CONFIG_FILE)
}

/// Durable `refresh key -> last refresh (epoch millis)` map.
pub fn refresh_store_path(home: &Path) -> PathBuf {
    schoolsync_root(home).join(REFRESH_STORE_FILE)
}
