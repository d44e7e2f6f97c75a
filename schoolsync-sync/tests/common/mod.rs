#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};

use schoolsync_core::{
    Attendance, AttendanceSummary, Conference, Exam, Grade, GradeSummary, Homework, LuckyNumber,
    Mailbox, Message, MessageFolder, Note, SchoolAnnouncement, Semester, Student, StudentId,
    Subject, SyncConfig, Teacher, Timetable,
};
use schoolsync_sync::{
    Dao, MemoryDao, MemoryTimestampStore, Repositories, SchoolApi, Stores, SyncError,
};

// ---------------------------------------------------------------------------
// Scripted remote
// ---------------------------------------------------------------------------

/// One scripted endpoint: fixed response, optional latency, call counter.
pub struct Script<T> {
    response: Mutex<Result<T, SyncError>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl<T: Clone + Default> Default for Script<T> {
    fn default() -> Self {
        Self {
            response: Mutex::new(Ok(T::default())),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> Script<T> {
    pub fn respond(&self, response: Result<T, SyncError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<T, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub grades: Script<(Vec<Grade>, Vec<GradeSummary>)>,
    pub exams: Script<Vec<Exam>>,
    pub attendance: Script<Vec<Attendance>>,
    pub messages: Script<Vec<Message>>,
    pub school_announcements: Script<Vec<SchoolAnnouncement>>,
    pub lucky_number: Script<Option<LuckyNumber>>,
    pub teachers: Script<Vec<Teacher>>,
    pub timetable: Script<Vec<Timetable>>,
    pub homework: Script<Vec<Homework>>,
    pub notes: Script<Vec<Note>>,
    pub conferences: Script<Vec<Conference>>,
    pub attendance_summary: Script<Vec<AttendanceSummary>>,
    pub subjects: Script<Vec<Subject>>,
}

#[async_trait]
impl SchoolApi for FakeApi {
    async fn grades(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<(Vec<Grade>, Vec<GradeSummary>), SyncError> {
        self.grades.call().await
    }

    async fn exams(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Exam>, SyncError> {
        self.exams.call().await
    }

    async fn attendance(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Attendance>, SyncError> {
        self.attendance.call().await
    }

    async fn messages(
        &self,
        _student: &Student,
        _mailbox: Option<&Mailbox>,
        _folder: MessageFolder,
    ) -> Result<Vec<Message>, SyncError> {
        self.messages.call().await
    }

    async fn school_announcements(
        &self,
        _student: &Student,
    ) -> Result<Vec<SchoolAnnouncement>, SyncError> {
        self.school_announcements.call().await
    }

    async fn lucky_number(&self, _student: &Student) -> Result<Option<LuckyNumber>, SyncError> {
        self.lucky_number.call().await
    }

    async fn teachers(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<Vec<Teacher>, SyncError> {
        self.teachers.call().await
    }

    async fn timetable(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Timetable>, SyncError> {
        self.timetable.call().await
    }

    async fn homework(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Homework>, SyncError> {
        self.homework.call().await
    }

    async fn notes(&self, _student: &Student, _semester: &Semester) -> Result<Vec<Note>, SyncError> {
        self.notes.call().await
    }

    async fn conferences(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<Vec<Conference>, SyncError> {
        self.conferences.call().await
    }

    async fn attendance_summary(
        &self,
        _student: &Student,
        _semester: &Semester,
        _subject_id: i64,
    ) -> Result<Vec<AttendanceSummary>, SyncError> {
        self.attendance_summary.call().await
    }

    async fn subjects(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<Vec<Subject>, SyncError> {
        self.subjects.call().await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A Wednesday.
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 13).expect("date")
}

pub fn student() -> Student {
    Student {
        id: 1,
        user_login_id: 10,
        student_id: StudentId(100),
        user_name: "jan.kowalski".to_string(),
        student_name: "Jan Kowalski".to_string(),
        school_name: "SP 1".to_string(),
        class_name: "b".to_string(),
        registration_date: Utc.with_ymd_and_hms(2023, 9, 1, 8, 0, 0).unwrap(),
        is_parent: false,
    }
}

pub fn semester() -> Semester {
    Semester {
        student_id: StudentId(100),
        diary_id: 5,
        diary_name: "3b".to_string(),
        semester_id: 7,
        school_year: 2023,
        class_id: 3,
        start: NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"),
        end: NaiveDate::from_ymd_opt(2024, 6, 30).expect("date"),
    }
}

pub fn exam(subject: &str) -> Exam {
    exam_on(subject, day())
}

pub fn exam_on(subject: &str, date: NaiveDate) -> Exam {
    Exam {
        student_id: StudentId(100),
        diary_id: 5,
        date,
        entry_date: date,
        subject: subject.to_string(),
        type_name: "test".to_string(),
        teacher: "Nowak".to_string(),
        ..Exam::default()
    }
}

pub fn subjects(exams: &[Exam]) -> Vec<String> {
    let mut out: Vec<String> = exams.iter().map(|e| e.subject.clone()).collect();
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub exams: Arc<MemoryDao<Exam>>,
    pub timestamps: Arc<MemoryTimestampStore>,
    pub repos: Repositories,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_exam_dao(|dao| dao)
    }

    /// Build with the exam table wrapped by `wrap` (e.g. a failing store).
    pub fn with_exam_dao(
        wrap: impl FnOnce(Arc<dyn Dao<Exam>>) -> Arc<dyn Dao<Exam>>,
    ) -> Self {
        let api = Arc::new(FakeApi::default());
        let exams = Arc::new(MemoryDao::new());
        let timestamps = Arc::new(MemoryTimestampStore::new());
        let mut stores = Stores::in_memory();
        let exam_dao: Arc<dyn Dao<Exam>> = exams.clone();
        stores.exams = wrap(exam_dao);
        let repos = Repositories::new(
            api.clone(),
            stores,
            timestamps.clone(),
            &SyncConfig::default(),
        );
        Self {
            api,
            exams,
            timestamps,
            repos,
        }
    }

    pub async fn cached_exams(&self) -> Vec<Exam> {
        self.exams.load(Arc::new(|_: &Exam| true)).await.expect("load")
    }
}
