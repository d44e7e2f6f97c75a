use async_trait::async_trait;

use schoolsync_core::StudentWithCurrentSemester;
use schoolsync_sync::repositories::attendance_summary::ALL_SUBJECTS;
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::scheduler::{Work, WorkReport};
use crate::works::WorkContext;

/// Refreshes the attendance counters of every subject, plus the all-subjects
/// total. Raises no notifications.
pub struct AttendanceSummaryWork {
    ctx: WorkContext,
}

impl AttendanceSummaryWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }

    async fn refresh(&self, member: &StudentWithCurrentSemester) -> Result<(), SyncError> {
        let (student, semester) = (&member.student, &member.semester);
        let summaries = &self.ctx.repos.attendance_summary;
        summaries
            .get_attendance_summary(student, semester, ALL_SUBJECTS, true)
            .wait_for_result()
            .await?;

        let subjects = self
            .ctx
            .repos
            .subjects
            .get_subjects(student, semester, false)
            .wait_for_result()
            .await?;
        for subject in subjects {
            summaries
                .get_attendance_summary(student, semester, subject.real_id, true)
                .wait_for_result()
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Work for AttendanceSummaryWork {
    fn name(&self) -> &'static str {
        "attendance_summary"
    }

    async fn do_work(&self, members: &[StudentWithCurrentSemester]) -> WorkReport {
        let mut report = WorkReport::new(self.name());
        for member in members {
            report.groups += 1;
            if let Err(err) = self.refresh(member).await {
                report.record_failure(&member.student.user_name, &member.student, err);
            }
        }
        report
    }
}
