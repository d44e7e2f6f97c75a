//! Per-feature background works.
//!
//! Every scoped work follows the same shape: refresh the feature with
//! `force_refresh = true`, read back what still waits for a notification,
//! post one notification per scope group and flip the notified flags.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use schoolsync_core::{CacheEntity, Notifiable, SyncConfig};
use schoolsync_sync::{unique_subtract, Repositories};

use crate::notifier::Notifier;
use crate::scheduler::{Scoped, VerificationPolicy, Work};

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
pub mod teacher;
pub mod timetable;

pub use attendance::AttendanceWork;
pub use attendance_summary::AttendanceSummaryWork;
pub use conference::ConferenceWork;
pub use exam::ExamWork;
pub use grade::{GradeWork, NewGrades};
pub use homework::HomeworkWork;
pub use lucky_number::LuckyNumberWork;
pub use message::MessageWork;
pub use note::NoteWork;
pub use school_announcement::SchoolAnnouncementWork;
pub use teacher::TeacherWork;
pub use timetable::TimetableWork;

/// What every work needs: repositories, a notifier and the user's
/// notification preference.
#[derive(Clone)]
pub struct WorkContext {
    pub repos: Repositories,
    pub notifier: Arc<dyn Notifier>,
    /// Passed as `notify` to repositories; off means new rows enter
    /// already notified.
    pub notifications_enabled: bool,
    today: Option<NaiveDate>,
}

impl WorkContext {
    pub fn new(repos: Repositories, notifier: Arc<dyn Notifier>, config: &SyncConfig) -> Self {
        Self {
            repos,
            notifier,
            notifications_enabled: config.notifications_enabled,
            today: None,
        }
    }

    /// Pin the calendar day works treat as today.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Every registered work, scoped ones wrapped with `policy`.
pub fn all_works(ctx: &WorkContext, policy: VerificationPolicy) -> Vec<Arc<dyn Work>> {
    vec![
        Arc::new(Scoped::new(GradeWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(ExamWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(AttendanceWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(MessageWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(SchoolAnnouncementWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(LuckyNumberWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(TimetableWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(HomeworkWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(NoteWork::new(ctx.clone()), policy)),
        Arc::new(Scoped::new(ConferenceWork::new(ctx.clone()), policy)),
        Arc::new(TeacherWork::new(ctx.clone())),
        Arc::new(AttendanceSummaryWork::new(ctx.clone())),
    ]
}

/// Same records by natural key, ignoring order and local flags.
pub(crate) fn same_items<E: CacheEntity>(a: &[E], b: &[E]) -> bool {
    a.len() == b.len() && unique_subtract(a, b).is_empty()
}

/// Flip the notified flag on a batch about to be written back.
pub(crate) fn notified<E: Notifiable>(mut items: Vec<E>) -> Vec<E> {
    for item in &mut items {
        item.set_notified(true);
    }
    items
}
