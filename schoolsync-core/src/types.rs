//! Account and term types shared by every feature.
//!
//! A [`Student`] is one registered account (a pupil, or a guardian viewing a
//! pupil). A [`Semester`] is the term the account is currently looking at.
//! Several accounts may describe the same pupil, which is what notification
//! scopes deduplicate.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Remote identifier of a pupil, as assigned by the education API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct StudentId(pub i64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for StudentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Message folder on the remote mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFolder {
    #[default]
    Received,
    Sent,
    Trashed,
}

impl MessageFolder {
    /// Numeric folder id used by the remote API and in refresh keys.
    pub fn id(self) -> i32 {
        match self {
            MessageFolder::Received => 1,
            MessageFolder::Sent => 2,
            MessageFolder::Trashed => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Local account row id.
    pub id: i64,
    /// Login the account signs in with; unique per registered account.
    pub user_login_id: i64,
    pub student_id: StudentId,
    /// Display name of the login (guardian or pupil).
    pub user_name: String,
    /// Display name of the pupil the account observes.
    pub student_name: String,
    pub school_name: String,
    pub class_name: String,
    pub registration_date: DateTime<Utc>,
    #[serde(default)]
    pub is_parent: bool,
}

/// The term an account is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub student_id: StudentId,
    pub diary_id: i64,
    /// Class name of the diary, e.g. `3b`.
    pub diary_name: String,
    pub semester_id: i64,
    pub school_year: i32,
    pub class_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// An account paired with its current term; the unit a sync run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentWithCurrentSemester {
    pub student: Student,
    pub semester: Semester,
}

impl StudentWithCurrentSemester {
    pub fn new(student: Student, semester: Semester) -> Self {
        Self { student, semester }
    }
}

/// A remote mailbox an account can read messages from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mailbox {
    pub global_key: String,
    pub owner_name: String,
    pub user_login_id: i64,
}

// ---------------------------------------------------------------------------
// Calendar helpers
// ---------------------------------------------------------------------------

/// Monday of the week `date` falls in.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sunday of the week `date` falls in.
pub fn sunday_of(date: NaiveDate) -> NaiveDate {
    monday_of(date) + Duration::days(6)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
