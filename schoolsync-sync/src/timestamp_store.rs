//! Timestamp store — durable `refresh key -> last refresh` map.
//!
//! [`JsonTimestampStore`] persists a [`RefreshStoreFile`] JSON document at
//! `<home>/.schoolsync/refresh.json`. Writes use the atomic `.tmp` + rename
//! pattern shared with the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use schoolsync_core::paths::refresh_store_path;

use crate::error::{io_err, SyncError};

/// Key/value persistence used by the staleness gate.
pub trait TimestampStore: Send + Sync {
    /// Stored epoch millis for `key`, or `default` when unseen.
    fn get_millis(&self, key: &str, default: i64) -> i64;

    fn put_millis(&self, key: &str, value: i64) -> Result<(), SyncError>;

    /// Every stored entry, ordered by key.
    fn entries(&self) -> Vec<(String, i64)>;

    /// Drop every key starting with `prefix`; returns how many were dropped.
    fn remove_matching(&self, prefix: &str) -> Result<usize, SyncError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn drop_prefix(map: &mut BTreeMap<String, i64>, prefix: &str) -> usize {
    let before = map.len();
    map.retain(|key, _| !key.starts_with(prefix));
    before - map.len()
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Ephemeral store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryTimestampStore {
    entries: Mutex<BTreeMap<String, i64>>,
}

impl MemoryTimestampStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimestampStore for MemoryTimestampStore {
    fn get_millis(&self, key: &str, default: i64) -> i64 {
        lock(&self.entries).get(key).copied().unwrap_or(default)
    }

    fn put_millis(&self, key: &str, value: i64) -> Result<(), SyncError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn entries(&self) -> Vec<(String, i64)> {
        lock(&self.entries)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn remove_matching(&self, prefix: &str) -> Result<usize, SyncError> {
        Ok(drop_prefix(&mut lock(&self.entries), prefix))
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// On-disk payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshStoreFile {
    pub updated_at: Option<DateTime<Utc>>,
    pub entries: BTreeMap<String, i64>,
}

/// File-backed store. The whole map is held in memory and rewritten on
/// every change; read-modify-write is serialized by one mutex.
#[derive(Debug)]
pub struct JsonTimestampStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, i64>>,
}

impl JsonTimestampStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let file = load_file(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(file.entries),
        })
    }

    /// Open `<home>/.schoolsync/refresh.json`.
    pub fn open_at(home: &Path) -> Result<Self, SyncError> {
        Self::open(refresh_store_path(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, i64>) -> Result<(), SyncError> {
        save_file(
            &self.path,
            &RefreshStoreFile {
                updated_at: Some(Utc::now()),
                entries: entries.clone(),
            },
        )
    }
}

impl TimestampStore for JsonTimestampStore {
    fn get_millis(&self, key: &str, default: i64) -> i64 {
        lock(&self.entries).get(key).copied().unwrap_or(default)
    }

    fn put_millis(&self, key: &str, value: i64) -> Result<(), SyncError> {
        let mut entries = lock(&self.entries);
        let previous = entries.insert(key.to_string(), value);
        if let Err(err) = self.persist(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn entries(&self) -> Vec<(String, i64)> {
        lock(&self.entries)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn remove_matching(&self, prefix: &str) -> Result<usize, SyncError> {
        let mut entries = lock(&self.entries);
        let mut kept = entries.clone();
        let removed = drop_prefix(&mut kept, prefix);
        if removed > 0 {
            self.persist(&kept)?;
            *entries = kept;
        }
        Ok(removed)
    }
}

fn load_file(path: &Path) -> Result<RefreshStoreFile, SyncError> {
    if !path.exists() {
        return Ok(RefreshStoreFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Writes to `<path>.tmp` then renames to `<path>`.
fn save_file(path: &Path, file: &RefreshStoreFile) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid refresh store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(file)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
