use async_trait::async_trait;
use chrono::Duration;

use schoolsync_core::{
    Homework, NotificationScope, NotificationType, Student, StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::timetable::{next_or_same_school_day, LOOKAHEAD_DAYS};
use crate::works::{notified, same_items, WorkContext};

/// Refreshes homework due on the next school day; notifies about homework
/// due within a week that was not announced yet.
pub struct HomeworkWork {
    ctx: WorkContext,
}

impl HomeworkWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for HomeworkWork {
    type Data = Vec<Homework>;

    fn name(&self) -> &'static str {
        "homework"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewHomework.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Homework>, SyncError> {
        let today = self.ctx.today();
        let school_day = next_or_same_school_day(today);
        let homework = &self.ctx.repos.homework;
        homework
            .get_homework(
                &member.student,
                &member.semester,
                school_day,
                school_day,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = homework
            .homework_from_store(
                &member.semester,
                today,
                today + Duration::days(LOOKAHEAD_DAYS),
            )
            .await?;
        pending.retain(|item| !item.is_notified);
        Ok(pending)
    }

    async fn notify(&self, scope_key: &str, data: &Vec<Homework>, recipients: &[Student]) {
        if data.is_empty() {
            return;
        }
        let lines = data
            .iter()
            .map(|h| format!("{} {}: {}", h.date.format("%d.%m"), h.subject, h.content))
            .collect();
        let title = count_title(data.len(), "homework", "homework");
        let notification = Notification::new(NotificationType::NewHomework, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Homework>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx
            .repos
            .homework
            .update_homework(&notified(data))
            .await
    }

    fn same_data(&self, a: &Vec<Homework>, b: &Vec<Homework>) -> bool {
        same_items(a, b)
    }
}
