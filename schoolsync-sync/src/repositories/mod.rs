//! Feature repositories.
//!
//! Each repository owns one [`FeatureSyncGate`] and binds a local-store query
//! to a remote fetch through [`network_bound_resource`](crate::bound::network_bound_resource).
//! Repositories are built once at startup via [`Repositories::new`] and shared
//! by reference.

use std::sync::Arc;

use schoolsync_core::{CacheEntity, Notifiable, SyncConfig};

use crate::diff::merge_plan;
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::staleness::FeatureSyncGate;
use crate::store::{Dao, RowFilter, Stores};
use crate::timestamp_store::TimestampStore;

pub mod attendance;
pub mod attendance_summary;
pub mod conference;
pub mod exam;
pub mod grade;
pub mod homework;
pub mod lucky_number;
pub mod message;
pub mod note;
pub mod school_announcement;
pub mod subject;
pub mod teacher;
pub mod timetable;

pub use attendance::AttendanceRepository;
pub use attendance_summary::AttendanceSummaryRepository;
pub use conference::ConferenceRepository;
pub use exam::ExamRepository;
pub use grade::GradeRepository;
pub use homework::HomeworkRepository;
pub use lucky_number::LuckyNumberRepository;
pub use message::MessageRepository;
pub use note::NoteRepository;
pub use school_announcement::SchoolAnnouncementRepository;
pub use subject::SubjectRepository;
pub use teacher::TeacherRepository;
pub use timetable::TimetableRepository;

/// Every feature repository, wired to one API client, one set of tables and
/// one timestamp store.
#[derive(Clone)]
pub struct Repositories {
    pub grades: Arc<GradeRepository>,
    pub exams: Arc<ExamRepository>,
    pub attendance: Arc<AttendanceRepository>,
    pub messages: Arc<MessageRepository>,
    pub school_announcements: Arc<SchoolAnnouncementRepository>,
    pub lucky_numbers: Arc<LuckyNumberRepository>,
    pub teachers: Arc<TeacherRepository>,
    pub timetable: Arc<TimetableRepository>,
    pub homework: Arc<HomeworkRepository>,
    pub notes: Arc<NoteRepository>,
    pub conferences: Arc<ConferenceRepository>,
    pub attendance_summary: Arc<AttendanceSummaryRepository>,
    pub subjects: Arc<SubjectRepository>,
}

impl Repositories {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        stores: Stores,
        timestamps: Arc<dyn TimestampStore>,
        config: &SyncConfig,
    ) -> Self {
        let gate = |feature: &str| {
            Arc::new(FeatureSyncGate::from_config(
                feature,
                timestamps.clone(),
                config,
            ))
        };
        Self {
            grades: Arc::new(GradeRepository::new(
                api.clone(),
                stores.grades,
                stores.grade_summaries,
                gate(grade::CACHE_KEY),
            )),
            exams: Arc::new(ExamRepository::new(
                api.clone(),
                stores.exams,
                gate(exam::CACHE_KEY),
            )),
            attendance: Arc::new(AttendanceRepository::new(
                api.clone(),
                stores.attendance,
                gate(attendance::CACHE_KEY),
            )),
            messages: Arc::new(MessageRepository::new(
                api.clone(),
                stores.messages,
                gate(message::CACHE_KEY),
            )),
            school_announcements: Arc::new(SchoolAnnouncementRepository::new(
                api.clone(),
                stores.school_announcements,
                gate(school_announcement::CACHE_KEY),
            )),
            lucky_numbers: Arc::new(LuckyNumberRepository::new(
                api.clone(),
                stores.lucky_numbers,
                gate(lucky_number::CACHE_KEY),
            )),
            teachers: Arc::new(TeacherRepository::new(
                api.clone(),
                stores.teachers,
                gate(teacher::CACHE_KEY),
            )),
            timetable: Arc::new(TimetableRepository::new(
                api.clone(),
                stores.timetable,
                gate(timetable::CACHE_KEY),
            )),
            homework: Arc::new(HomeworkRepository::new(
                api.clone(),
                stores.homework,
                gate(homework::CACHE_KEY),
            )),
            notes: Arc::new(NoteRepository::new(
                api.clone(),
                stores.notes,
                gate(note::CACHE_KEY),
            )),
            conferences: Arc::new(ConferenceRepository::new(
                api.clone(),
                stores.conferences,
                gate(conference::CACHE_KEY),
            )),
            attendance_summary: Arc::new(AttendanceSummaryRepository::new(
                api.clone(),
                stores.attendance_summary,
                gate(attendance_summary::CACHE_KEY),
            )),
            subjects: Arc::new(SubjectRepository::new(
                api,
                stores.subjects,
                gate(subject::CACHE_KEY),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared merge helpers
// ---------------------------------------------------------------------------

pub(crate) fn rows<E, F>(predicate: F) -> RowFilter<E>
where
    F: Fn(&E) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

/// Newly added records wait for a notification only when the caller asked
/// for notifications; otherwise they enter already notified.
pub(crate) fn stamp_added<E: Notifiable>(mut added: Vec<E>, notify: bool) -> Vec<E> {
    for item in &mut added {
        item.set_notified(!notify);
    }
    added
}

/// Replace `old` with `new`: delete what disappeared, insert what appeared,
/// leave matching rows (and their flags) alone.
pub(crate) async fn merge_notifiable<E>(
    dao: &dyn Dao<E>,
    old: &[E],
    new: &[E],
    notify: bool,
) -> Result<(), SyncError>
where
    E: CacheEntity + Notifiable,
{
    let plan = merge_plan(old, new);
    dao.replace(&plan.removed, stamp_added(plan.added, notify))
        .await
}

/// [`merge_notifiable`] for records without notification state.
pub(crate) async fn merge_plain<E: CacheEntity>(
    dao: &dyn Dao<E>,
    old: &[E],
    new: &[E],
) -> Result<(), SyncError> {
    let plan = merge_plan(old, new);
    dao.replace(&plan.removed, plan.added).await
}
