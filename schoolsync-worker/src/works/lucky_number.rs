use async_trait::async_trait;

use schoolsync_core::{
    CacheEntity, LuckyNumber, NotificationScope, NotificationType, Student,
    StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::Notification;
use crate::scheduler::ScopedWork;
use crate::works::WorkContext;

pub struct LuckyNumberWork {
    ctx: WorkContext,
}

impl LuckyNumberWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for LuckyNumberWork {
    type Data = Option<LuckyNumber>;

    fn name(&self) -> &'static str {
        "lucky_number"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewLuckyNumber.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Option<LuckyNumber>, SyncError> {
        let today = self.ctx.today();
        let lucky_numbers = &self.ctx.repos.lucky_numbers;
        lucky_numbers
            .get_lucky_number(&member.student, today, true, self.ctx.notifications_enabled)
            .wait_for_result()
            .await?;
        lucky_numbers
            .not_notified_lucky_number(&member.student, today)
            .await
    }

    async fn notify(&self, scope_key: &str, data: &Option<LuckyNumber>, recipients: &[Student]) {
        let Some(number) = data else {
            return;
        };
        let notification = Notification::new(
            NotificationType::NewLuckyNumber,
            format!("Today's lucky number: {}", number.lucky_number),
            vec![number.lucky_number.to_string()],
        );
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Option<LuckyNumber>) -> Result<(), SyncError> {
        let Some(number) = data else {
            return Ok(());
        };
        let number = LuckyNumber {
            is_notified: true,
            ..number
        };
        self.ctx
            .repos
            .lucky_numbers
            .update_lucky_number(&number)
            .await
    }

    fn same_data(&self, a: &Option<LuckyNumber>, b: &Option<LuckyNumber>) -> bool {
        a.as_ref().map(LuckyNumber::natural_key) == b.as_ref().map(LuckyNumber::natural_key)
    }
}
