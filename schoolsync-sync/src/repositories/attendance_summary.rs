use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{AttendanceSummary, Semester, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_plain, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "attendance_summary";

/// Subject id asking for the counters of every subject together.
pub const ALL_SUBJECTS: i64 = -1;

/// Monthly attendance counters per subject. Every subject has its own refresh
/// key, so refreshing one does not hide the staleness of another.
pub struct AttendanceSummaryRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<AttendanceSummary>>,
    gate: Arc<FeatureSyncGate>,
}

impl AttendanceSummaryRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<AttendanceSummary>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_attendance_summary(
        &self,
        student: &Student,
        semester: &Semester,
        subject_id: i64,
        force_refresh: bool,
    ) -> BoxStream<'static, Resource<Vec<AttendanceSummary>>> {
        let source = SummarySource {
            api: self.api.clone(),
            dao: self.dao.clone(),
            student: student.clone(),
            semester: semester.clone(),
            subject_id,
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_term_subject(CACHE_KEY, semester, subject_id),
            force_refresh,
        )
    }

    pub async fn attendance_summary_from_store(
        &self,
        semester: &Semester,
        subject_id: i64,
    ) -> Result<Vec<AttendanceSummary>, SyncError> {
        self.dao.load(subject_rows(semester, subject_id)).await
    }
}

fn subject_rows(semester: &Semester, subject_id: i64) -> RowFilter<AttendanceSummary> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |summary: &AttendanceSummary| {
        summary.student_id == student_id
            && summary.diary_id == diary_id
            && summary.subject_id == subject_id
    })
}

struct SummarySource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<AttendanceSummary>>,
    student: Student,
    semester: Semester,
    subject_id: i64,
}

#[async_trait]
impl BoundResource for SummarySource {
    type Output = Vec<AttendanceSummary>;
    type Fetched = Vec<AttendanceSummary>;

    async fn query(&self) -> Result<Vec<AttendanceSummary>, SyncError> {
        self.dao
            .load(subject_rows(&self.semester, self.subject_id))
            .await
    }

    async fn fetch(&self) -> Result<Vec<AttendanceSummary>, SyncError> {
        self.api
            .attendance_summary(&self.student, &self.semester, self.subject_id)
            .await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<AttendanceSummary>,
        new: Vec<AttendanceSummary>,
    ) -> Result<(), SyncError> {
        merge_plain(self.dao.as_ref(), &old, &new).await
    }

    fn is_result_empty(&self, data: &Vec<AttendanceSummary>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, mut data: Vec<AttendanceSummary>) -> Vec<AttendanceSummary> {
        data.sort_by_key(|summary| summary.month);
        data
    }
}
