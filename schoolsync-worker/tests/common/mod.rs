#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};

use schoolsync_core::{
    Attendance, AttendanceSummary, Conference, Exam, Grade, GradeSummary, Homework, LuckyNumber,
    Mailbox, Message, MessageFolder, Note, SchoolAnnouncement, Semester, Student, StudentId,
    StudentWithCurrentSemester, Subject, SyncConfig, Teacher, Timetable,
};
use schoolsync_sync::{MemoryTimestampStore, Repositories, SchoolApi, Stores, SyncError};
use schoolsync_worker::{RecordingNotifier, WorkContext};

/// Remote answering every account with the same scripted data.
#[derive(Default)]
pub struct FakeApi {
    pub grades: Mutex<(Vec<Grade>, Vec<GradeSummary>)>,
    pub exams: Mutex<Vec<Exam>>,
    pub messages: Mutex<Vec<Message>>,
    pub lucky_number: Mutex<Option<LuckyNumber>>,
    pub timetable: Mutex<Vec<Timetable>>,
    pub homework: Mutex<Vec<Homework>>,
    pub notes: Mutex<Vec<Note>>,
    pub conferences: Mutex<Vec<Conference>>,
    pub subjects: Mutex<Vec<Subject>>,
    /// Subject ids the attendance summary was asked for, in call order.
    pub summary_requests: Mutex<Vec<i64>>,
    pub failure: Mutex<Option<SyncError>>,
    pub calls: AtomicUsize,
}

impl FakeApi {
    fn answer<T: Clone>(&self, value: &Mutex<T>) -> Result<T, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(value.lock().unwrap().clone())
    }

    pub fn fail_with(&self, err: SyncError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchoolApi for FakeApi {
    async fn grades(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<(Vec<Grade>, Vec<GradeSummary>), SyncError> {
        self.answer(&self.grades)
    }

    async fn exams(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Exam>, SyncError> {
        self.answer(&self.exams)
    }

    async fn attendance(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Attendance>, SyncError> {
        self.answer(&Mutex::new(Vec::new()))
    }

    async fn messages(
        &self,
        _student: &Student,
        _mailbox: Option<&Mailbox>,
        _folder: MessageFolder,
    ) -> Result<Vec<Message>, SyncError> {
        self.answer(&self.messages)
    }

    async fn school_announcements(
        &self,
        _student: &Student,
    ) -> Result<Vec<SchoolAnnouncement>, SyncError> {
        self.answer(&Mutex::new(Vec::new()))
    }

    async fn lucky_number(&self, _student: &Student) -> Result<Option<LuckyNumber>, SyncError> {
        self.answer(&self.lucky_number)
    }

    async fn teachers(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<Vec<Teacher>, SyncError> {
        self.answer(&Mutex::new(Vec::new()))
    }

    async fn timetable(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Timetable>, SyncError> {
        self.answer(&self.timetable)
    }

    async fn homework(
        &self,
        _student: &Student,
        _semester: &Semester,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Homework>, SyncError> {
        self.answer(&self.homework)
    }

    async fn notes(&self, _student: &Student, _semester: &Semester) -> Result<Vec<Note>, SyncError> {
        self.answer(&self.notes)
    }

    async fn conferences(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<Vec<Conference>, SyncError> {
        self.answer(&self.conferences)
    }

    async fn attendance_summary(
        &self,
        _student: &Student,
        _semester: &Semester,
        subject_id: i64,
    ) -> Result<Vec<AttendanceSummary>, SyncError> {
        self.summary_requests.lock().unwrap().push(subject_id);
        self.answer(&Mutex::new(vec![AttendanceSummary {
            student_id: StudentId(100),
            diary_id: 5,
            subject_id,
            month: 3,
            presence: 1,
            ..AttendanceSummary::default()
        }]))
    }

    async fn subjects(
        &self,
        _student: &Student,
        _semester: &Semester,
    ) -> Result<Vec<Subject>, SyncError> {
        self.answer(&self.subjects)
    }
}

/// A Wednesday.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 13).expect("date")
}

/// Account `login` observing pupil `pupil` (id 100 for every account, so
/// cached rows are shared the way one pupil's data is).
pub fn member(user: &str, login: i64, pupil: &str) -> StudentWithCurrentSemester {
    StudentWithCurrentSemester::new(
        Student {
            id: login,
            user_login_id: login,
            student_id: StudentId(100),
            user_name: user.to_string(),
            student_name: pupil.to_string(),
            school_name: "SP 1".to_string(),
            class_name: "b".to_string(),
            registration_date: Utc.with_ymd_and_hms(2023, 9, 1, 8, 0, 0).unwrap(),
            is_parent: user != pupil,
        },
        Semester {
            student_id: StudentId(100),
            diary_id: 5,
            diary_name: "3b".to_string(),
            semester_id: 7,
            school_year: 2023,
            class_id: 3,
            start: NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).expect("date"),
        },
    )
}

pub fn grade(subject: &str, entry: &str) -> Grade {
    Grade {
        student_id: StudentId(100),
        semester_id: 7,
        subject: subject.to_string(),
        entry: entry.to_string(),
        date: today(),
        ..Grade::default()
    }
}

pub fn exam(subject: &str) -> Exam {
    Exam {
        student_id: StudentId(100),
        diary_id: 5,
        date: today(),
        entry_date: today(),
        subject: subject.to_string(),
        type_name: "test".to_string(),
        ..Exam::default()
    }
}

pub fn lesson(number: i32, date: NaiveDate, subject: &str) -> Timetable {
    Timetable {
        student_id: StudentId(100),
        diary_id: 5,
        number,
        date,
        subject: subject.to_string(),
        ..Timetable::default()
    }
}

pub fn note(content: &str) -> Note {
    Note {
        student_id: StudentId(100),
        date: today(),
        teacher: "Nowak".to_string(),
        content: content.to_string(),
        ..Note::default()
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub notifier: Arc<RecordingNotifier>,
    pub repos: Repositories,
    pub ctx: WorkContext,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        let api = Arc::new(FakeApi::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let repos = Repositories::new(
            api.clone(),
            Stores::in_memory(),
            Arc::new(MemoryTimestampStore::new()),
            &config,
        );
        let ctx = WorkContext::new(repos.clone(), notifier.clone(), &config).with_today(today());
        Self {
            api,
            notifier,
            repos,
            ctx,
            config,
        }
    }
}
