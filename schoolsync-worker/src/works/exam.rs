use async_trait::async_trait;

use schoolsync_core::types::{monday_of, sunday_of};
use schoolsync_core::{
    Exam, NotificationScope, NotificationType, Student, StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Refreshes today's exams; notifies about exams of the current week not
/// announced yet.
pub struct ExamWork {
    ctx: WorkContext,
}

impl ExamWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for ExamWork {
    type Data = Vec<Exam>;

    fn name(&self) -> &'static str {
        "exams"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewExam.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Exam>, SyncError> {
        let today = self.ctx.today();
        let exams = &self.ctx.repos.exams;
        exams
            .get_exams(
                &member.student,
                &member.semester,
                today,
                today,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = exams
            .exams_from_store(&member.semester, monday_of(today), sunday_of(today))
            .await?;
        pending.retain(|exam| !exam.is_notified);
        Ok(pending)
    }

    async fn notify(&self, scope_key: &str, data: &Vec<Exam>, recipients: &[Student]) {
        if data.is_empty() {
            return;
        }
        let lines = data
            .iter()
            .map(|e| format!("{} {}: {}", e.date.format("%d.%m"), e.subject, e.type_name))
            .collect();
        let title = count_title(data.len(), "exam", "exams");
        let notification = Notification::new(NotificationType::NewExam, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Exam>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx.repos.exams.update_exams(&notified(data)).await
    }

    fn same_data(&self, a: &Vec<Exam>, b: &Vec<Exam>) -> bool {
        same_items(a, b)
    }
}
