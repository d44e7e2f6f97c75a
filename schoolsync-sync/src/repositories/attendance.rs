use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;

use schoolsync_core::types::{monday_of, sunday_of};
use schoolsync_core::{Attendance, Semester, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_notifiable, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "attendance";

/// Attendance entries of a date window, cached by whole weeks.
pub struct AttendanceRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Attendance>>,
    gate: Arc<FeatureSyncGate>,
}

impl AttendanceRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Attendance>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_attendance(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Attendance>>> {
        let source = AttendanceSource {
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

    pub async fn attendance_from_store(
        &self,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Attendance>, SyncError> {
        self.dao.load(window(semester, start, end)).await
    }

    pub async fn update_attendance(&self, attendance: &[Attendance]) -> Result<(), SyncError> {
        self.dao.update_all(attendance).await
    }
}

fn window(semester: &Semester, start: NaiveDate, end: NaiveDate) -> RowFilter<Attendance> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |entry: &Attendance| {
        entry.student_id == student_id
            && entry.diary_id == diary_id
            && (start..=end).contains(&entry.date)
    })
}

struct AttendanceSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Attendance>>,
    student: Student,
    semester: Semester,
    start: NaiveDate,
    end: NaiveDate,
    notify: bool,
}

#[async_trait]
impl BoundResource for AttendanceSource {
    type Output = Vec<Attendance>;
    type Fetched = Vec<Attendance>;

    async fn query(&self) -> Result<Vec<Attendance>, SyncError> {
        let filter = window(&self.semester, monday_of(self.start), sunday_of(self.end));
        self.dao.load(filter).await
    }

    async fn fetch(&self) -> Result<Vec<Attendance>, SyncError> {
        self.api
            .attendance(
                &self.student,
                &self.semester,
                monday_of(self.start),
                sunday_of(self.end),
            )
            .await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<Attendance>,
        new: Vec<Attendance>,
    ) -> Result<(), SyncError> {
        merge_notifiable(self.dao.as_ref(), &old, &new, self.notify).await
    }

    fn is_result_empty(&self, data: &Vec<Attendance>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, data: Vec<Attendance>) -> Vec<Attendance> {
        data.into_iter()
            .filter(|entry| (self.start..=self.end).contains(&entry.date))
            .collect()
    }
}
