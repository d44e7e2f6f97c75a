use async_trait::async_trait;

use schoolsync_core::StudentWithCurrentSemester;
use schoolsync_sync::ResourceStreamExt;

use crate::scheduler::{Work, WorkReport};
use crate::works::WorkContext;

/// Refreshes every account's teacher list. Raises no notifications, so
/// there is nothing to group.
pub struct TeacherWork {
    ctx: WorkContext,
}

impl TeacherWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Work for TeacherWork {
    fn name(&self) -> &'static str {
        "teachers"
    }

    async fn do_work(&self, members: &[StudentWithCurrentSemester]) -> WorkReport {
        let mut report = WorkReport::new(self.name());
        for member in members {
            report.groups += 1;
            let refreshed = self
                .ctx
                .repos
                .teachers
                .get_teachers(&member.student, &member.semester, true)
                .wait_for_result()
                .await;
            if let Err(err) = refreshed {
                report.record_failure(&member.student.user_name, &member.student, err);
            }
        }
        report
    }
}
