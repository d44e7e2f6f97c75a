use async_trait::async_trait;

use schoolsync_core::{
    NotificationScope, NotificationType, SchoolAnnouncement, Student,
    StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

pub struct SchoolAnnouncementWork {
    ctx: WorkContext,
}

impl SchoolAnnouncementWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for SchoolAnnouncementWork {
    type Data = Vec<SchoolAnnouncement>;

    fn name(&self) -> &'static str {
        "school_announcements"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewAnnouncement.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<SchoolAnnouncement>, SyncError> {
        let announcements = &self.ctx.repos.school_announcements;
        announcements
            .get_school_announcements(&member.student, true, self.ctx.notifications_enabled)
            .wait_for_result()
            .await?;

        let mut pending = announcements
            .school_announcements_from_store(&member.student)
            .await?;
        pending.retain(|announcement| !announcement.is_notified);
        Ok(pending)
    }

    async fn notify(
        &self,
        scope_key: &str,
        data: &Vec<SchoolAnnouncement>,
        recipients: &[Student],
    ) {
        if data.is_empty() {
            return;
        }
        let lines = data.iter().map(|a| a.subject.clone()).collect();
        let title = count_title(data.len(), "school announcement", "school announcements");
        let notification = Notification::new(NotificationType::NewAnnouncement, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<SchoolAnnouncement>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx
            .repos
            .school_announcements
            .update_school_announcements(&notified(data))
            .await
    }

    fn same_data(&self, a: &Vec<SchoolAnnouncement>, b: &Vec<SchoolAnnouncement>) -> bool {
        same_items(a, b)
    }
}
