use async_trait::async_trait;

use schoolsync_core::{
    Message, MessageFolder, NotificationScope, NotificationType, Student,
    StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Refreshes the received folder of every mailbox; notifies about unread
/// messages.
pub struct MessageWork {
    ctx: WorkContext,
}

impl MessageWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for MessageWork {
    type Data = Vec<Message>;

    fn name(&self) -> &'static str {
        "messages"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewMessage.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Message>, SyncError> {
        let messages = &self.ctx.repos.messages;
        messages
            .get_messages(
                &member.student,
                None,
                MessageFolder::Received,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = messages
            .messages_from_store(&member.student, None, MessageFolder::Received)
            .await?;
        pending.retain(|message| !message.is_notified && message.unread);
        Ok(pending)
    }

    async fn notify(&self, scope_key: &str, data: &Vec<Message>, recipients: &[Student]) {
        if data.is_empty() {
            return;
        }
        let lines = data
            .iter()
            .map(|m| format!("{}: {}", m.correspondents, m.subject))
            .collect();
        let title = count_title(data.len(), "message", "messages");
        let notification = Notification::new(NotificationType::NewMessage, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Message>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx.repos.messages.update_messages(&notified(data)).await
    }

    fn same_data(&self, a: &Vec<Message>, b: &Vec<Message>) -> bool {
        same_items(a, b)
    }
}
