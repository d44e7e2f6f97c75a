use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};

use schoolsync_core::{
    NotificationScope, NotificationType, Student, StudentWithCurrentSemester, Timetable,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Days ahead the work looks for lessons still waiting for a notification.
pub(crate) const LOOKAHEAD_DAYS: i64 = 7;

/// Refreshes the next school day's lessons; notifies about canceled or
/// substituted lessons of the coming week.
pub struct TimetableWork {
    ctx: WorkContext,
}

impl TimetableWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

/// `date` itself on weekdays, the following Monday on weekends.
pub fn next_or_same_school_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn describe(lesson: &Timetable) -> String {
    let change = if lesson.canceled {
        "canceled".to_string()
    } else if !lesson.subject_old.is_empty() && lesson.subject_old != lesson.subject {
        format!("{} instead of {}", lesson.subject, lesson.subject_old)
    } else {
        "changed".to_string()
    };
    format!(
        "{} lesson {} {}: {change}",
        lesson.date.format("%d.%m"),
        lesson.number,
        lesson.subject
    )
}

#[async_trait]
impl ScopedWork for TimetableWork {
    type Data = Vec<Timetable>;

    fn name(&self) -> &'static str {
        "timetable"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::ChangeTimetable.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Timetable>, SyncError> {
        let today = self.ctx.today();
        let school_day = next_or_same_school_day(today);
        let timetable = &self.ctx.repos.timetable;
        timetable
            .get_timetable(
                &member.student,
                &member.semester,
                school_day,
                school_day,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = timetable
            .timetable_from_store(
                &member.semester,
                today,
                today + Duration::days(LOOKAHEAD_DAYS),
            )
            .await?;
        pending.retain(|lesson| !lesson.is_notified);
        Ok(pending)
    }

    /// Regular lessons are marked notified without raising anything.
    async fn notify(&self, scope_key: &str, data: &Vec<Timetable>, recipients: &[Student]) {
        let lines: Vec<String> = data
            .iter()
            .filter(|lesson| lesson.is_changed())
            .map(describe)
            .collect();
        if lines.is_empty() {
            return;
        }
        let title = count_title(lines.len(), "timetable change", "timetable changes");
        let notification = Notification::new(NotificationType::ChangeTimetable, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Timetable>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx
            .repos
            .timetable
            .update_timetable(&notified(data))
            .await
    }

    fn same_data(&self, a: &Vec<Timetable>, b: &Vec<Timetable>) -> bool {
        same_items(a, b)
    }
}
