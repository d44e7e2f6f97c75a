//! Grades of a term: grade details and per-subject summaries, fetched and
//! merged together.
//!
//! # Merge rules
//!
//! Details:
//! - the *break date* is the newest cached grade date, or the account's
//!   registration date when nothing is cached yet;
//! - added grades dated on or after the break date arrive unread and, when
//!   notifying, pending notification;
//! - older added grades arrive read and notified (back-filled history).
//!
//! Summaries:
//! - predicted/final flags are reset only when that value changed and is
//!   non-empty;
//! - last-change timestamps move only when that value changed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;

use schoolsync_core::{Grade, GradeSummary, Semester, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::diff::merge_plan;
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::rows;
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "grade";

pub type GradesWithSummaries = (Vec<Grade>, Vec<GradeSummary>);

pub struct GradeRepository {
    api: Arc<dyn SchoolApi>,
    grades: Arc<dyn Dao<Grade>>,
    summaries: Arc<dyn Dao<GradeSummary>>,
    gate: Arc<FeatureSyncGate>,
}

impl GradeRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        grades: Arc<dyn Dao<Grade>>,
        summaries: Arc<dyn Dao<GradeSummary>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self {
            api,
            grades,
            summaries,
            gate,
        }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_grades(
        &self,
        student: &Student,
        semester: &Semester,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<GradesWithSummaries>> {
        let source = GradeSource {
            api: self.api.clone(),
            grades: self.grades.clone(),
            summaries: self.summaries.clone(),
            student: student.clone(),
            semester: semester.clone(),
            notify,
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_term(CACHE_KEY, semester),
            force_refresh,
        )
    }

    pub async fn grades_from_store(&self, semester: &Semester) -> Result<Vec<Grade>, SyncError> {
        self.grades.load(term_grades(semester)).await
    }

    pub async fn unread_grades(&self, semester: &Semester) -> Result<Vec<Grade>, SyncError> {
        let mut grades = self.grades_from_store(semester).await?;
        grades.retain(|grade| !grade.is_read);
        Ok(grades)
    }

    pub async fn grade_summaries_from_store(
        &self,
        semester: &Semester,
    ) -> Result<Vec<GradeSummary>, SyncError> {
        self.summaries.load(term_summaries(semester)).await
    }

    pub async fn update_grades(&self, grades: &[Grade]) -> Result<(), SyncError> {
        self.grades.update_all(grades).await
    }

    pub async fn update_grade_summaries(
        &self,
        summaries: &[GradeSummary],
    ) -> Result<(), SyncError> {
        self.summaries.update_all(summaries).await
    }
}

fn term_grades(semester: &Semester) -> RowFilter<Grade> {
    let (student_id, semester_id) = (semester.student_id, semester.semester_id);
    rows(move |grade: &Grade| grade.student_id == student_id && grade.semester_id == semester_id)
}

fn term_summaries(semester: &Semester) -> RowFilter<GradeSummary> {
    let (student_id, semester_id) = (semester.student_id, semester.semester_id);
    rows(move |summary: &GradeSummary| {
        summary.student_id == student_id && summary.semester_id == semester_id
    })
}

/// Added grade details with read/notified flags set.
pub(crate) fn stamp_new_grades(
    student: &Student,
    old: &[Grade],
    mut added: Vec<Grade>,
    notify: bool,
) -> Vec<Grade> {
    let break_date = old
        .iter()
        .map(|grade| grade.date)
        .max()
        .unwrap_or_else(|| student.registration_date.date_naive());
    for grade in &mut added {
        let recent = grade.date >= break_date;
        grade.is_read = !recent;
        grade.is_notified = !(recent && notify);
    }
    added
}

/// Added summaries with notified flags and last-change timestamps set.
pub(crate) fn stamp_new_summaries(
    old: &[GradeSummary],
    mut added: Vec<GradeSummary>,
    notify: bool,
) -> Vec<GradeSummary> {
    let now = Utc::now();
    for summary in &mut added {
        let previous = old.iter().find(|o| o.subject == summary.subject);
        let predicted_changed = previous.map_or(true, |o| o.predicted_grade != summary.predicted_grade);
        let final_changed = previous.map_or(true, |o| o.final_grade != summary.final_grade);

        summary.is_predicted_grade_notified =
            summary.predicted_grade.is_empty() || !(notify && predicted_changed);
        summary.is_final_grade_notified =
            summary.final_grade.is_empty() || !(notify && final_changed);

        summary.predicted_grade_last_change = match previous {
            Some(o) if !predicted_changed => o.predicted_grade_last_change,
            _ => now,
        };
        summary.final_grade_last_change = match previous {
            Some(o) if !final_changed => o.final_grade_last_change,
            _ => now,
        };
    }
    added
}

struct GradeSource {
    api: Arc<dyn SchoolApi>,
    grades: Arc<dyn Dao<Grade>>,
    summaries: Arc<dyn Dao<GradeSummary>>,
    student: Student,
    semester: Semester,
    notify: bool,
}

#[async_trait]
impl BoundResource for GradeSource {
    type Output = GradesWithSummaries;
    type Fetched = GradesWithSummaries;

    async fn query(&self) -> Result<GradesWithSummaries, SyncError> {
        let grades = self.grades.load(term_grades(&self.semester)).await?;
        let summaries = self.summaries.load(term_summaries(&self.semester)).await?;
        Ok((grades, summaries))
    }

    async fn fetch(&self) -> Result<GradesWithSummaries, SyncError> {
        self.api.grades(&self.student, &self.semester).await
    }

    async fn save_fetch_result(
        &self,
        old: GradesWithSummaries,
        new: GradesWithSummaries,
    ) -> Result<(), SyncError> {
        let (old_grades, old_summaries) = old;
        let (new_grades, new_summaries) = new;
        let details = merge_plan(&old_grades, &new_grades);
        let added = stamp_new_grades(&self.student, &old_grades, details.added, self.notify);
        self.grades.replace(&details.removed, added).await?;

        let summaries = merge_plan(&old_summaries, &new_summaries);
        let added = stamp_new_summaries(&old_summaries, summaries.added, self.notify);
        self.summaries.replace(&summaries.removed, added).await
    }

    /// Emptiness is judged by grade details alone.
    fn is_result_empty(&self, data: &GradesWithSummaries) -> bool {
        data.0.is_empty()
    }

    /// Summaries missing from the cache are refetched even while fresh.
    fn should_fetch(&self, cached: &GradesWithSummaries) -> bool {
        cached.1.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};
    use schoolsync_core::StudentId;

    use super::*;

    fn student() -> Student {
        Student {
            id: 1,
            user_login_id: 10,
            student_id: StudentId(100),
            user_name: "jan".into(),
            student_name: "Jan Kowalski".into(),
            school_name: "SP 1".into(),
            class_name: "b".into(),
            registration_date: Utc.with_ymd_and_hms(2024, 9, 10, 8, 0, 0).unwrap(),
            is_parent: false,
        }
    }

    fn grade(day: u32) -> Grade {
        Grade {
            student_id: StudentId(100),
            semester_id: 7,
            subject: "Math".into(),
            entry: "5".into(),
            value: 5,
            date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            ..Grade::default()
        }
    }

    fn summary(subject: &str, predicted: &str, final_grade: &str) -> GradeSummary {
        GradeSummary {
            student_id: StudentId(100),
            semester_id: 7,
            subject: subject.into(),
            predicted_grade: predicted.into(),
            final_grade: final_grade.into(),
            ..GradeSummary::default()
        }
    }

    #[test]
    fn first_sync_breaks_at_registration_date() {
        let added = stamp_new_grades(&student(), &[], vec![grade(1), grade(15)], true);
        assert!(added[0].is_read && added[0].is_notified, "history before registration");
        assert!(!added[1].is_read && !added[1].is_notified, "new since registration");
    }

    #[test]
    fn later_sync_breaks_at_newest_cached_grade() {
        let old = vec![grade(20)];
        let added = stamp_new_grades(&student(), &old, vec![grade(19), grade(20), grade(21)], true);
        assert!(added[0].is_read);
        assert!(!added[1].is_read && !added[1].is_notified);
        assert!(!added[2].is_read && !added[2].is_notified);
    }

    #[test]
    fn without_notify_recent_grades_are_unread_but_notified() {
        let added = stamp_new_grades(&student(), &[], vec![grade(15)], false);
        assert!(!added[0].is_read);
        assert!(added[0].is_notified);
    }

    #[test]
    fn summary_flags_reset_only_for_changed_values() {
        let earlier = Utc::now() - Duration::days(3);
        let old = vec![GradeSummary {
            predicted_grade_last_change: earlier,
            final_grade_last_change: earlier,
            ..summary("Math", "4", "")
        }];
        let added = stamp_new_summaries(&old, vec![summary("Math", "4", "5")], true);

        assert!(added[0].is_predicted_grade_notified, "predicted unchanged");
        assert_eq!(added[0].predicted_grade_last_change, earlier);
        assert!(!added[0].is_final_grade_notified, "final changed");
        assert!(added[0].final_grade_last_change > earlier);
    }

    #[test]
    fn empty_summary_values_never_notify() {
        let added = stamp_new_summaries(&[], vec![summary("Art", "", "")], true);
        assert!(added[0].is_predicted_grade_notified);
        assert!(added[0].is_final_grade_notified);
    }
}
