//! Staleness gate and refresh keys.
//!
//! A [`FeatureSyncGate`] is owned by one feature repository. It holds the
//! feature's fetch mutex and decides, per [`RefreshKey`], whether cached data
//! is old enough to refetch:
//!
//! ```text
//! stale(key) = last_refresh(key) < now - interval      (unseen key => epoch 0)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::MutexGuard;

use schoolsync_core::types::{monday_of, sunday_of};
use schoolsync_core::{Mailbox, MessageFolder, Semester, Student, SyncConfig};

use crate::error::SyncError;
use crate::timestamp_store::TimestampStore;

// ---------------------------------------------------------------------------
// Refresh keys
// ---------------------------------------------------------------------------

/// Identifies one staleness/fetch unit.
///
/// Every dimension that changes the fetched result set (account, term, date
/// window, mailbox) must be part of the key, or two accounts end up sharing
/// one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefreshKey(String);

impl RefreshKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// `name_<studentId>_<semesterId>`
    pub fn for_term(name: &str, semester: &Semester) -> Self {
        Self(format!(
            "{name}_{}_{}",
            semester.student_id, semester.semester_id
        ))
    }

    /// `name_<studentId>_<semesterId>_<monday of start>_<sunday of end>`
    pub fn for_term_window(
        name: &str,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self(format!(
            "{name}_{}_{}_{}_{}",
            semester.student_id,
            semester.semester_id,
            monday_of(start),
            sunday_of(end)
        ))
    }

    /// `name_<studentId>_<semesterId>_<subjectId>`
    pub fn for_term_subject(name: &str, semester: &Semester, subject_id: i64) -> Self {
        Self(format!(
            "{name}_{}_{}_{subject_id}",
            semester.student_id, semester.semester_id
        ))
    }

    /// `name_<userLoginId>`
    pub fn for_account(name: &str, student: &Student) -> Self {
        Self(format!("{name}_{}", student.user_login_id))
    }

    /// `name_<userLoginId>_<mailbox key or "all">_<folderId>`
    pub fn for_mailbox(
        name: &str,
        student: &Student,
        mailbox: Option<&Mailbox>,
        folder: MessageFolder,
    ) -> Self {
        let mailbox = mailbox.map_or("all", |m| m.global_key.as_str());
        Self(format!(
            "{name}_{}_{mailbox}_{}",
            student.user_login_id,
            folder.id()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefreshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Whether a key last refreshed at `last_millis` is stale at `now_millis`.
pub fn is_stale(last_millis: i64, now_millis: i64, interval: Duration) -> bool {
    let interval_millis = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    last_millis < now_millis.saturating_sub(interval_millis)
}

/// Fetch mutex plus staleness timestamps for one feature.
pub struct FeatureSyncGate {
    feature: String,
    fetch_lock: tokio::sync::Mutex<()>,
    timestamps: Arc<dyn TimestampStore>,
    interval: Duration,
    /// Completed refreshes of every key some subscription is watching; lets
    /// waiters on the fetch lock notice that someone else already refreshed
    /// their key. Entries live only while a [`RefreshTicket`] holds them.
    generations: Mutex<HashMap<RefreshKey, Generation>>,
}

#[derive(Debug, Default)]
struct Generation {
    refreshes: u64,
    watchers: usize,
}

impl fmt::Debug for FeatureSyncGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSyncGate")
            .field("feature", &self.feature)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl FeatureSyncGate {
    pub fn new(
        feature: impl Into<String>,
        timestamps: Arc<dyn TimestampStore>,
        interval: Duration,
    ) -> Self {
        Self {
            feature: feature.into(),
            fetch_lock: tokio::sync::Mutex::new(()),
            timestamps,
            interval,
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        feature: impl Into<String>,
        timestamps: Arc<dyn TimestampStore>,
        config: &SyncConfig,
    ) -> Self {
        Self::new(feature, timestamps, config.services_interval())
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn should_be_refreshed(&self, key: &RefreshKey) -> bool {
        let last = self.timestamps.get_millis(key.as_str(), 0);
        let stale = is_stale(last, Utc::now().timestamp_millis(), self.interval);
        tracing::debug!(
            feature = %self.feature,
            key = %key,
            stale,
            last_refresh = %format_millis(last),
            interval_min = self.interval.as_secs() / 60,
            "staleness check"
        );
        stale
    }

    /// Stamp `key` as refreshed now.
    pub fn update_last_refresh_timestamp(&self, key: &RefreshKey) -> Result<(), SyncError> {
        self.timestamps
            .put_millis(key.as_str(), Utc::now().timestamp_millis())
    }

    /// Last refresh of `key`, `None` when it was never refreshed.
    pub fn last_refresh(&self, key: &RefreshKey) -> Option<DateTime<Utc>> {
        match self.timestamps.get_millis(key.as_str(), 0) {
            0 => None,
            millis => Utc.timestamp_millis_opt(millis).single(),
        }
    }

    /// Suspend until this feature's fetch+merge section is free.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.fetch_lock.lock().await
    }

    fn generations(&self) -> std::sync::MutexGuard<'_, HashMap<RefreshKey, Generation>> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start watching `key`; the ticket remembers how many refreshes of it
    /// had completed so far.
    pub(crate) fn watch(self: &Arc<Self>, key: &RefreshKey) -> RefreshTicket {
        let mut generations = self.generations();
        let entry = generations.entry(key.clone()).or_default();
        entry.watchers += 1;
        RefreshTicket {
            gate: self.clone(),
            key: key.clone(),
            seen: entry.refreshes,
        }
    }

    pub(crate) fn generation(&self, key: &RefreshKey) -> u64 {
        self.generations().get(key).map_or(0, |g| g.refreshes)
    }

    pub(crate) fn mark_refreshed(&self, key: &RefreshKey) {
        if let Some(entry) = self.generations().get_mut(key) {
            entry.refreshes += 1;
        }
    }

    /// Keys currently tracked for refresh coalescing.
    pub(crate) fn watched_keys(&self) -> usize {
        self.generations().len()
    }

    fn release(&self, key: &RefreshKey) {
        let mut generations = self.generations();
        if let Some(entry) = generations.get_mut(key) {
            entry.watchers = entry.watchers.saturating_sub(1);
            if entry.watchers == 0 {
                generations.remove(key);
            }
        }
    }
}

/// One subscription's interest in a key's refreshes. Dropping the last
/// ticket of a key forgets the key.
pub(crate) struct RefreshTicket {
    gate: Arc<FeatureSyncGate>,
    key: RefreshKey,
    seen: u64,
}

impl RefreshTicket {
    /// Whether a refresh of the key completed after this ticket was taken.
    pub(crate) fn refreshed_since(&self) -> bool {
        self.gate.generation(&self.key) != self.seen
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        self.gate.release(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Age formatting
// ---------------------------------------------------------------------------

/// RFC 3339 rendering of epoch millis; `never` for the unseen default.
pub fn format_millis(millis: i64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |ts| ts.to_rfc3339())
}

/// Compact age of a timestamp, e.g. `42s`, `5m`, `3h`, `2d`.
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let now = Utc::now();
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(age)
}

pub fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
