//! Remote data source collaborator.
//!
//! Implementations talk to the education API and map its payloads to cached
//! entities with zeroed row ids. Retries and timeouts are theirs to handle;
//! every failure comes back as a typed [`SyncError`].

use async_trait::async_trait;
use chrono::NaiveDate;

use schoolsync_core::{
    Attendance, AttendanceSummary, Conference, Exam, Grade, GradeSummary, Homework, LuckyNumber,
    Mailbox, Message, MessageFolder, Note, SchoolAnnouncement, Semester, Student, Subject,
    Teacher, Timetable,
};

use crate::error::SyncError;

#[async_trait]
pub trait SchoolApi: Send + Sync {
    /// Grade details and per-subject summaries of a term, fetched together.
    async fn grades(
        &self,
        student: &Student,
        semester: &Semester,
    ) -> Result<(Vec<Grade>, Vec<GradeSummary>), SyncError>;

    async fn exams(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Exam>, SyncError>;

    async fn attendance(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Attendance>, SyncError>;

    /// Messages of one folder; `None` reads every mailbox of the account.
    async fn messages(
        &self,
        student: &Student,
        mailbox: Option<&Mailbox>,
        folder: MessageFolder,
    ) -> Result<Vec<Message>, SyncError>;

    async fn school_announcements(
        &self,
        student: &Student,
    ) -> Result<Vec<SchoolAnnouncement>, SyncError>;

    /// Today's lucky number, if the school publishes one.
    async fn lucky_number(&self, student: &Student) -> Result<Option<LuckyNumber>, SyncError>;

    async fn teachers(
        &self,
        student: &Student,
        semester: &Semester,
    ) -> Result<Vec<Teacher>, SyncError>;

    async fn timetable(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Timetable>, SyncError>;

    async fn homework(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Homework>, SyncError>;

    /// Notes given during the term.
    async fn notes(&self, student: &Student, semester: &Semester)
        -> Result<Vec<Note>, SyncError>;

    async fn conferences(
        &self,
        student: &Student,
        semester: &Semester,
    ) -> Result<Vec<Conference>, SyncError>;

    /// Monthly counters of one subject; `-1` asks for all subjects summed.
    async fn attendance_summary(
        &self,
        student: &Student,
        semester: &Semester,
        subject_id: i64,
    ) -> Result<Vec<AttendanceSummary>, SyncError>;

    async fn subjects(
        &self,
        student: &Student,
        semester: &Semester,
    ) -> Result<Vec<Subject>, SyncError>;
}
