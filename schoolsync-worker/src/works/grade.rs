use std::collections::BTreeMap;

use async_trait::async_trait;

use schoolsync_core::{
    Grade, GradeSummary, NotificationScope, NotificationType, Student,
    StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Grade details, predicted and final grades still waiting for a
/// notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewGrades {
    pub details: Vec<Grade>,
    pub predicted: Vec<GradeSummary>,
    pub final_grades: Vec<GradeSummary>,
}

impl NewGrades {
    pub fn is_empty(&self) -> bool {
        self.details.is_empty() && self.predicted.is_empty() && self.final_grades.is_empty()
    }
}

pub struct GradeWork {
    ctx: WorkContext,
}

impl GradeWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ScopedWork for GradeWork {
    type Data = NewGrades;

    fn name(&self) -> &'static str {
        "grades"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewGradeDetails.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<NewGrades, SyncError> {
        let grades = &self.ctx.repos.grades;
        grades
            .get_grades(
                &member.student,
                &member.semester,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let details = grades
            .grades_from_store(&member.semester)
            .await?
            .into_iter()
            .filter(|grade| !grade.is_notified)
            .collect();
        let summaries = grades.grade_summaries_from_store(&member.semester).await?;
        let predicted = summaries
            .iter()
            .filter(|s| !s.is_predicted_grade_notified)
            .cloned()
            .collect();
        let final_grades = summaries
            .into_iter()
            .filter(|s| !s.is_final_grade_notified)
            .collect();

        Ok(NewGrades {
            details,
            predicted,
            final_grades,
        })
    }

    async fn notify(&self, scope_key: &str, data: &NewGrades, recipients: &[Student]) {
        let notifier = &self.ctx.notifier;
        if !data.details.is_empty() {
            let lines = data
                .details
                .iter()
                .map(|g| format!("{}: {}", g.subject, g.entry))
                .collect();
            let title = count_title(data.details.len(), "grade", "grades");
            let notification = Notification::new(NotificationType::NewGradeDetails, title, lines);
            notifier.notify(&notification, scope_key, recipients).await;
        }
        if !data.predicted.is_empty() {
            let lines = data
                .predicted
                .iter()
                .map(|s| format!("{}: {}", s.subject, s.predicted_grade))
                .collect();
            let title = count_title(data.predicted.len(), "predicted grade", "predicted grades");
            let notification =
                Notification::new(NotificationType::NewGradePredicted, title, lines);
            notifier.notify(&notification, scope_key, recipients).await;
        }
        if !data.final_grades.is_empty() {
            let lines = data
                .final_grades
                .iter()
                .map(|s| format!("{}: {}", s.subject, s.final_grade))
                .collect();
            let title = count_title(data.final_grades.len(), "final grade", "final grades");
            let notification = Notification::new(NotificationType::NewGradeFinal, title, lines);
            notifier.notify(&notification, scope_key, recipients).await;
        }
    }

    async fn mark_notified(&self, data: NewGrades) -> Result<(), SyncError> {
        let grades = &self.ctx.repos.grades;
        if !data.details.is_empty() {
            grades.update_grades(&notified(data.details)).await?;
        }

        // One summary row can be pending for both its predicted and final
        // grade; merge by row id so neither write clobbers the other.
        let mut summaries: BTreeMap<i64, GradeSummary> = BTreeMap::new();
        for mut summary in data.predicted {
            summary.is_predicted_grade_notified = true;
            summaries.insert(summary.id, summary);
        }
        for summary in data.final_grades {
            summaries
                .entry(summary.id)
                .or_insert(summary)
                .is_final_grade_notified = true;
        }
        if summaries.is_empty() {
            return Ok(());
        }
        let summaries: Vec<GradeSummary> = summaries.into_values().collect();
        grades.update_grade_summaries(&summaries).await
    }

    fn same_data(&self, a: &NewGrades, b: &NewGrades) -> bool {
        same_items(&a.details, &b.details)
            && same_items(&a.predicted, &b.predicted)
            && same_items(&a.final_grades, &b.final_grades)
    }
}
