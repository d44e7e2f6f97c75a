use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;

use schoolsync_core::types::{monday_of, sunday_of};
use schoolsync_core::{Homework, Semester, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_notifiable, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "homework";

/// Homework due in a date window, cached by whole weeks.
pub struct HomeworkRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Homework>>,
    gate: Arc<FeatureSyncGate>,
}

impl HomeworkRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Homework>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_homework(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Homework>>> {
        let source = HomeworkSource {
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

    pub async fn homework_from_store(
        &self,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Homework>, SyncError> {
        self.dao.load(window(semester, start, end)).await
    }

    /// Write back local flags (done, notified).
    pub async fn update_homework(&self, homework: &[Homework]) -> Result<(), SyncError> {
        self.dao.update_all(homework).await
    }
}

fn window(semester: &Semester, start: NaiveDate, end: NaiveDate) -> RowFilter<Homework> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |homework: &Homework| {
        homework.student_id == student_id
            && homework.diary_id == diary_id
            && (start..=end).contains(&homework.date)
    })
}

struct HomeworkSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Homework>>,
    student: Student,
    semester: Semester,
    start: NaiveDate,
    end: NaiveDate,
    notify: bool,
}

#[async_trait]
impl BoundResource for HomeworkSource {
    type Output = Vec<Homework>;
    type Fetched = Vec<Homework>;

    async fn query(&self) -> Result<Vec<Homework>, SyncError> {
        let filter = window(&self.semester, monday_of(self.start), sunday_of(self.end));
        self.dao.load(filter).await
    }

    async fn fetch(&self) -> Result<Vec<Homework>, SyncError> {
        self.api
            .homework(
                &self.student,
                &self.semester,
                monday_of(self.start),
                sunday_of(self.end),
            )
            .await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<Homework>,
        new: Vec<Homework>,
    ) -> Result<(), SyncError> {
        merge_notifiable(self.dao.as_ref(), &old, &new, self.notify).await
    }

    fn is_result_empty(&self, data: &Vec<Homework>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, data: Vec<Homework>) -> Vec<Homework> {
        data.into_iter()
            .filter(|homework| (self.start..=self.end).contains(&homework.date))
            .collect()
    }
}
