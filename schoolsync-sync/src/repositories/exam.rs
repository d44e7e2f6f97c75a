//! Exams of a date window.
//!
//! The cache is read and fetched by whole weeks (Monday of `start` through
//! Sunday of `end`) and narrowed to `start..=end` before it is served.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;

use schoolsync_core::types::{monday_of, sunday_of};
use schoolsync_core::{Exam, Semester, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_notifiable, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{observe, Dao, RowFilter};

pub const CACHE_KEY: &str = "exam";

pub struct ExamRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Exam>>,
    gate: Arc<FeatureSyncGate>,
}

impl ExamRepository {
    pub fn new(api: Arc<dyn SchoolApi>, dao: Arc<dyn Dao<Exam>>, gate: Arc<FeatureSyncGate>) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_exams(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Exam>>> {
        let source = ExamSource {
            api: self.api.clone(),
            dao: self.dao.clone(),
            student: student.clone(),
            semester: semester.clone(),
            start,
            end,
            notify,
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_term_window(CACHE_KEY, semester, start, end),
            force_refresh,
        )
    }

    /// Cached exams dated `start..=end`, without touching the network.
    pub async fn exams_from_store(
        &self,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Exam>, SyncError> {
        self.dao.load(window(semester, start, end)).await
    }

    pub fn observe_exams(
        &self,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxStream<'static, Result<Vec<Exam>, SyncError>> {
        observe(self.dao.clone(), window(semester, start, end))
    }

    pub async fn update_exams(&self, exams: &[Exam]) -> Result<(), SyncError> {
        self.dao.update_all(exams).await
    }
}

fn window(semester: &Semester, start: NaiveDate, end: NaiveDate) -> RowFilter<Exam> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |exam: &Exam| {
        exam.student_id == student_id
            && exam.diary_id == diary_id
            && (start..=end).contains(&exam.date)
    })
}

struct ExamSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Exam>>,
    student: Student,
    semester: Semester,
    start: NaiveDate,
    end: NaiveDate,
    notify: bool,
}

#[async_trait]
impl BoundResource for ExamSource {
    type Output = Vec<Exam>;
    type Fetched = Vec<Exam>;

    async fn query(&self) -> Result<Vec<Exam>, SyncError> {
        let filter = window(&self.semester, monday_of(self.start), sunday_of(self.end));
        self.dao.load(filter).await
    }

    async fn fetch(&self) -> Result<Vec<Exam>, SyncError> {
        self.api
            .exams(
                &self.student,
                &self.semester,
                monday_of(self.start),
                sunday_of(self.end),
            )
            .await
    }

    async fn save_fetch_result(&self, old: Vec<Exam>, new: Vec<Exam>) -> Result<(), SyncError> {
        merge_notifiable(self.dao.as_ref(), &old, &new, self.notify).await
    }

    fn is_result_empty(&self, data: &Vec<Exam>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, data: Vec<Exam>) -> Vec<Exam> {
        data.into_iter()
            .filter(|exam| (self.start..=self.end).contains(&exam.date))
            .collect()
    }
}
