use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};

use schoolsync_core::{
    Attendance, NotificationScope, NotificationType, Student, StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Days back the work looks for attendance still waiting for a
/// notification.
const LOOKBACK_DAYS: i64 = 7;

/// Refreshes the last school day's attendance; notifies about absences and
/// lateness of the past week.
pub struct AttendanceWork {
    ctx: WorkContext,
}

impl AttendanceWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

/// `date` itself on weekdays, the preceding Friday on weekends.
pub fn previous_or_same_school_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

fn describe(entry: &Attendance) -> Option<&'static str> {
    if entry.absence && entry.excused {
        Some("excused absence")
    } else if entry.absence {
        Some("absence")
    } else if entry.lateness {
        Some("lateness")
    } else {
        None
    }
}

#[async_trait]
impl ScopedWork for AttendanceWork {
    type Data = Vec<Attendance>;

    fn name(&self) -> &'static str {
        "attendance"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewAttendance.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Attendance>, SyncError> {
        let today = self.ctx.today();
        let school_day = previous_or_same_school_day(today);
        let attendance = &self.ctx.repos.attendance;
        attendance
            .get_attendance(
                &member.student,
                &member.semester,
                school_day,
                school_day,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = attendance
            .attendance_from_store(
                &member.semester,
                today - Duration::days(LOOKBACK_DAYS),
                today,
            )
            .await?;
        pending.retain(|entry| !entry.is_notified);
        Ok(pending)
    }

    /// Plain presence is marked notified without raising anything.
    async fn notify(&self, scope_key: &str, data: &Vec<Attendance>, recipients: &[Student]) {
        let lines: Vec<String> = data
            .iter()
            .filter_map(|entry| {
                describe(entry).map(|kind| {
                    format!(
                        "{} lesson {} {}: {kind}",
                        entry.date.format("%d.%m"),
                        entry.number,
                        entry.subject
                    )
                })
            })
            .collect();
        if lines.is_empty() {
            return;
        }
        let title = count_title(lines.len(), "attendance entry", "attendance entries");
        let notification = Notification::new(NotificationType::NewAttendance, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Attendance>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx
            .repos
            .attendance
            .update_attendance(&notified(data))
            .await
    }

    fn same_data(&self, a: &Vec<Attendance>, b: &Vec<Attendance>) -> bool {
        same_items(a, b)
    }
}
