//! Lessons of a date window.
//!
//! Like exams, the cache is read and fetched by whole weeks and narrowed to
//! `start..=end` before it is served. Substitutions and cancellations show up
//! as new lesson records, so they pass through the notified flag like any
//! other addition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;

use schoolsync_core::types::{monday_of, sunday_of};
use schoolsync_core::{Semester, Student, Timetable};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_notifiable, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{observe, Dao, RowFilter};

pub const CACHE_KEY: &str = "timetable";

pub struct TimetableRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Timetable>>,
    gate: Arc<FeatureSyncGate>,
}

impl TimetableRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Timetable>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_timetable(
        &self,
        student: &Student,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Timetable>>> {
        let source = TimetableSource {
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

    /// Cached lessons dated `start..=end`, ordered by day and lesson number.
    pub async fn timetable_from_store(
        &self,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Timetable>, SyncError> {
        let mut lessons = self.dao.load(window(semester, start, end)).await?;
        lessons.sort_by_key(|lesson| (lesson.date, lesson.number));
        Ok(lessons)
    }

    pub fn observe_timetable(
        &self,
        semester: &Semester,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxStream<'static, Result<Vec<Timetable>, SyncError>> {
        observe(self.dao.clone(), window(semester, start, end))
    }

    pub async fn update_timetable(&self, lessons: &[Timetable]) -> Result<(), SyncError> {
        self.dao.update_all(lessons).await
    }
}

fn window(semester: &Semester, start: NaiveDate, end: NaiveDate) -> RowFilter<Timetable> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |lesson: &Timetable| {
        lesson.student_id == student_id
            && lesson.diary_id == diary_id
            && (start..=end).contains(&lesson.date)
    })
}

struct TimetableSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Timetable>>,
    student: Student,
    semester: Semester,
    start: NaiveDate,
    end: NaiveDate,
    notify: bool,
}

#[async_trait]
impl BoundResource for TimetableSource {
    type Output = Vec<Timetable>;
    type Fetched = Vec<Timetable>;

    async fn query(&self) -> Result<Vec<Timetable>, SyncError> {
        let filter = window(&self.semester, monday_of(self.start), sunday_of(self.end));
        self.dao.load(filter).await
    }

    async fn fetch(&self) -> Result<Vec<Timetable>, SyncError> {
        self.api
            .timetable(
                &self.student,
                &self.semester,
                monday_of(self.start),
                sunday_of(self.end),
            )
            .await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<Timetable>,
        new: Vec<Timetable>,
    ) -> Result<(), SyncError> {
        merge_notifiable(self.dao.as_ref(), &old, &new, self.notify).await
    }

    fn is_result_empty(&self, data: &Vec<Timetable>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, data: Vec<Timetable>) -> Vec<Timetable> {
        let mut lessons: Vec<Timetable> = data
            .into_iter()
            .filter(|lesson| (self.start..=self.end).contains(&lesson.date))
            .collect();
        lessons.sort_by_key(|lesson| (lesson.date, lesson.number));
        lessons
    }
}
