//! Cached records fetched from the education API.
//!
//! Every record has a surrogate `id` assigned by the local store and a
//! natural key made of the fields the remote API controls. Merges compare
//! records by natural key only, so local bookkeeping (`id`, read/notified
//! flags) never makes two copies of the same remote record look different.

use std::hash::Hash;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::StudentId;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A record the local cache stores and the merge step diffs.
pub trait CacheEntity: Clone + Send + Sync + 'static {
    /// Value-equality key; excludes the surrogate id and local flags.
    type NaturalKey: Eq + Hash + Clone + Send + Sync;

    fn natural_key(&self) -> Self::NaturalKey;

    /// Surrogate id assigned by the local store (0 until inserted).
    fn row_id(&self) -> i64;

    fn set_row_id(&mut self, id: i64);
}

/// A record that raises a notification once, after it first appears.
pub trait Notifiable {
    fn is_notified(&self) -> bool;

    fn set_notified(&mut self, notified: bool);
}

macro_rules! impl_row_id {
    () => {
        fn row_id(&self) -> i64 {
            self.id
        }

        fn set_row_id(&mut self, id: i64) {
            self.id = id;
        }
    };
}

macro_rules! impl_notifiable {
    ($ty:ty) => {
        impl Notifiable for $ty {
            fn is_notified(&self) -> bool {
                self.is_notified
            }

            fn set_notified(&mut self, notified: bool) {
                self.is_notified = notified;
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub student_id: StudentId,
    pub semester_id: i64,
    pub subject: String,
    /// Grade as displayed, e.g. `4+`.
    pub entry: String,
    pub value: i32,
    pub comment: String,
    pub description: String,
    pub weight: String,
    pub date: NaiveDate,
    pub teacher: String,
    pub is_read: bool,
    pub is_notified: bool,
}

impl CacheEntity for Grade {
    type NaturalKey = (
        StudentId,
        i64,
        String,
        String,
        i32,
        String,
        String,
        String,
        NaiveDate,
        String,
    );

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.semester_id,
            self.subject.clone(),
            self.entry.clone(),
            self.value,
            self.comment.clone(),
            self.description.clone(),
            self.weight.clone(),
            self.date,
            self.teacher.clone(),
        )
    }

    impl_row_id!();
}

impl_notifiable!(Grade);

/// Per-subject predicted and final grade for a term.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradeSummary {
    pub id: i64,
    pub student_id: StudentId,
    pub semester_id: i64,
    pub position: i32,
    pub subject: String,
    pub predicted_grade: String,
    pub final_grade: String,
    pub is_predicted_grade_notified: bool,
    pub is_final_grade_notified: bool,
    pub predicted_grade_last_change: DateTime<Utc>,
    pub final_grade_last_change: DateTime<Utc>,
}

impl CacheEntity for GradeSummary {
    type NaturalKey = (StudentId, i64, i32, String, String, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.semester_id,
            self.position,
            self.subject.clone(),
            self.predicted_grade.clone(),
            self.final_grade.clone(),
        )
    }

    impl_row_id!();
}

// ---------------------------------------------------------------------------
// Exams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    pub date: NaiveDate,
    pub entry_date: NaiveDate,
    pub subject: String,
    pub group: String,
    pub type_name: String,
    pub description: String,
    pub teacher: String,
    pub is_notified: bool,
}

impl CacheEntity for Exam {
    type NaturalKey = (
        StudentId,
        i64,
        NaiveDate,
        NaiveDate,
        String,
        String,
        String,
        String,
        String,
    );

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.diary_id,
            self.date,
            self.entry_date,
            self.subject.clone(),
            self.group.clone(),
            self.type_name.clone(),
            self.description.clone(),
            self.teacher.clone(),
        )
    }

    impl_row_id!();
}

impl_notifiable!(Exam);

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attendance {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    pub time_id: i32,
    pub date: NaiveDate,
    /// Lesson number within the day.
    pub number: i32,
    pub subject: String,
    pub name: String,
    pub presence: bool,
    pub absence: bool,
    pub lateness: bool,
    pub excused: bool,
    pub exemption: bool,
    pub is_notified: bool,
}

impl CacheEntity for Attendance {
    type NaturalKey = (StudentId, i64, i32, NaiveDate, i32, String, String, u8);

    fn natural_key(&self) -> Self::NaturalKey {
        let flags = u8::from(self.presence)
            | u8::from(self.absence) << 1
            | u8::from(self.lateness) << 2
            | u8::from(self.excused) << 3
            | u8::from(self.exemption) << 4;
        (
            self.student_id,
            self.diary_id,
            self.time_id,
            self.date,
            self.number,
            self.subject.clone(),
            self.name.clone(),
            flags,
        )
    }

    impl_row_id!();
}

impl_notifiable!(Attendance);

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub student_id: StudentId,
    pub mailbox_key: String,
    pub message_global_key: String,
    pub folder_id: i32,
    pub correspondents: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub unread: bool,
    pub has_attachments: bool,
    pub is_notified: bool,
}

impl CacheEntity for Message {
    type NaturalKey = (StudentId, String, String, i32);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.mailbox_key.clone(),
            self.message_global_key.clone(),
            self.folder_id,
        )
    }

    impl_row_id!();
}

impl_notifiable!(Message);

// ---------------------------------------------------------------------------
// School announcements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchoolAnnouncement {
    pub id: i64,
    pub user_login_id: i64,
    pub date: NaiveDate,
    pub subject: String,
    pub content: String,
    pub is_notified: bool,
}

impl CacheEntity for SchoolAnnouncement {
    type NaturalKey = (i64, NaiveDate, String, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.user_login_id,
            self.date,
            self.subject.clone(),
            self.content.clone(),
        )
    }

    impl_row_id!();
}

impl_notifiable!(SchoolAnnouncement);

// ---------------------------------------------------------------------------
// Lucky number
// ---------------------------------------------------------------------------

/// The register number exempt from being examined on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LuckyNumber {
    pub id: i64,
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub lucky_number: i32,
    pub is_notified: bool,
}

impl CacheEntity for LuckyNumber {
    type NaturalKey = (StudentId, NaiveDate, i32);

    fn natural_key(&self) -> Self::NaturalKey {
        (self.student_id, self.date, self.lucky_number)
    }

    impl_row_id!();
}

impl_notifiable!(LuckyNumber);

// ---------------------------------------------------------------------------
// Teachers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub student_id: StudentId,
    pub class_id: i64,
    pub subject: String,
    pub name: String,
    pub short_name: String,
}

impl CacheEntity for Teacher {
    type NaturalKey = (StudentId, i64, String, String, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.class_id,
            self.subject.clone(),
            self.name.clone(),
            self.short_name.clone(),
        )
    }

    impl_row_id!();
}

// ---------------------------------------------------------------------------
// Timetable
// ---------------------------------------------------------------------------

/// One lesson of the timetable. The `*_old` fields carry what a substitution
/// replaced and stay empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timetable {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    pub number: i32,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub subject: String,
    pub subject_old: String,
    pub group: String,
    pub room: String,
    pub room_old: String,
    pub teacher: String,
    pub teacher_old: String,
    pub info: String,
    pub changes: bool,
    pub canceled: bool,
    pub is_notified: bool,
}

impl CacheEntity for Timetable {
    type NaturalKey = (
        (StudentId, i64, NaiveDate, i32, NaiveTime, NaiveTime),
        (String, String, String, String, String),
        (String, String, String),
        (bool, bool),
    );

    fn natural_key(&self) -> Self::NaturalKey {
        (
            (
                self.student_id,
                self.diary_id,
                self.date,
                self.number,
                self.start,
                self.end,
            ),
            (
                self.subject.clone(),
                self.subject_old.clone(),
                self.group.clone(),
                self.room.clone(),
                self.room_old.clone(),
            ),
            (
                self.teacher.clone(),
                self.teacher_old.clone(),
                self.info.clone(),
            ),
            (self.changes, self.canceled),
        )
    }

    impl_row_id!();
}

impl_notifiable!(Timetable);

impl Timetable {
    /// Canceled or substituted.
    pub fn is_changed(&self) -> bool {
        self.canceled || self.changes
    }
}

// ---------------------------------------------------------------------------
// Homework
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Homework {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    /// Day the homework is due.
    pub date: NaiveDate,
    pub entry_date: NaiveDate,
    pub subject: String,
    pub content: String,
    pub teacher: String,
    /// Ticked off locally.
    pub is_done: bool,
    pub is_notified: bool,
}

impl CacheEntity for Homework {
    type NaturalKey = (StudentId, i64, NaiveDate, NaiveDate, String, String, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.diary_id,
            self.date,
            self.entry_date,
            self.subject.clone(),
            self.content.clone(),
            self.teacher.clone(),
        )
    }

    impl_row_id!();
}

impl_notifiable!(Homework);

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

/// Teacher's note (praise or reprimand) about a pupil.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub teacher: String,
    pub category: String,
    pub content: String,
    pub is_read: bool,
    pub is_notified: bool,
}

impl CacheEntity for Note {
    type NaturalKey = (StudentId, NaiveDate, String, String, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.date,
            self.teacher.clone(),
            self.category.clone(),
            self.content.clone(),
        )
    }

    impl_row_id!();
}

impl_notifiable!(Note);

// ---------------------------------------------------------------------------
// Conferences
// ---------------------------------------------------------------------------

/// Parent-teacher conference of a class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conference {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    pub date: DateTime<Utc>,
    pub title: String,
    pub subject: String,
    pub agenda: String,
    pub place: String,
    pub is_notified: bool,
}

impl CacheEntity for Conference {
    type NaturalKey = (StudentId, i64, DateTime<Utc>, String, String, String, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.diary_id,
            self.date,
            self.title.clone(),
            self.subject.clone(),
            self.agenda.clone(),
            self.place.clone(),
        )
    }

    impl_row_id!();
}

impl_notifiable!(Conference);

// ---------------------------------------------------------------------------
// Attendance summary
// ---------------------------------------------------------------------------

/// Monthly attendance counters of one subject; subject id `-1` stands for
/// every subject together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    pub subject_id: i64,
    pub month: u32,
    pub presence: i32,
    pub absence: i32,
    pub absence_excused: i32,
    pub absence_for_school_reasons: i32,
    pub lateness: i32,
    pub lateness_excused: i32,
    pub exemption: i32,
}

impl CacheEntity for AttendanceSummary {
    type NaturalKey = (StudentId, i64, i64, u32, [i32; 7]);

    fn natural_key(&self) -> Self::NaturalKey {
        (
            self.student_id,
            self.diary_id,
            self.subject_id,
            self.month,
            [
                self.presence,
                self.absence,
                self.absence_excused,
                self.absence_for_school_reasons,
                self.lateness,
                self.lateness_excused,
                self.exemption,
            ],
        )
    }

    impl_row_id!();
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub student_id: StudentId,
    pub diary_id: i64,
    /// Id the remote API knows the subject by.
    pub real_id: i64,
    pub name: String,
}

impl CacheEntity for Subject {
    type NaturalKey = (StudentId, i64, i64, String);

    fn natural_key(&self) -> Self::NaturalKey {
        (self.student_id, self.diary_id, self.real_id, self.name.clone())
    }

    impl_row_id!();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
