use async_trait::async_trait;

use schoolsync_core::{
    Conference, NotificationScope, NotificationType, Student, StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Refreshes the term's conferences; notifies about ones not announced yet.
pub struct ConferenceWork {
    ctx: WorkContext,
}

impl ConferenceWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for ConferenceWork {
    type Data = Vec<Conference>;

    fn name(&self) -> &'static str {
        "conferences"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewConference.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Conference>, SyncError> {
        let conferences = &self.ctx.repos.conferences;
        conferences
            .get_conferences(
                &member.student,
                &member.semester,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = conferences.conferences_from_store(&member.semester).await?;
        pending.retain(|conference| !conference.is_notified);
        Ok(pending)
    }

    async fn notify(&self, scope_key: &str, data: &Vec<Conference>, recipients: &[Student]) {
        if data.is_empty() {
            return;
        }
        let lines = data
            .iter()
            .map(|c| format!("{} {}: {}", c.date.format("%d.%m %H:%M"), c.place, c.title))
            .collect();
        let title = count_title(data.len(), "conference", "conferences");
        let notification = Notification::new(NotificationType::NewConference, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Conference>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx
            .repos
            .conferences
            .update_conferences(&notified(data))
            .await
    }

    fn same_data(&self, a: &Vec<Conference>, b: &Vec<Conference>) -> bool {
        same_items(a, b)
    }
}
