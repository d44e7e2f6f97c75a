use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{Conference, Semester, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_notifiable, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "conference";

/// Parent-teacher conferences of the term's class.
pub struct ConferenceRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Conference>>,
    gate: Arc<FeatureSyncGate>,
}

impl ConferenceRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Conference>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_conferences(
        &self,
        student: &Student,
        semester: &Semester,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Conference>>> {
        let source = ConferenceSource {
            api: self.api.clone(),
            dao: self.dao.clone(),
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

    pub async fn conferences_from_store(
        &self,
        semester: &Semester,
    ) -> Result<Vec<Conference>, SyncError> {
        self.dao.load(diary_rows(semester)).await
    }

    pub async fn update_conferences(&self, conferences: &[Conference]) -> Result<(), SyncError> {
        self.dao.update_all(conferences).await
    }
}

fn diary_rows(semester: &Semester) -> RowFilter<Conference> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |conference: &Conference| {
        conference.student_id == student_id && conference.diary_id == diary_id
    })
}

struct ConferenceSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Conference>>,
    student: Student,
    semester: Semester,
    notify: bool,
}

#[async_trait]
impl BoundResource for ConferenceSource {
    type Output = Vec<Conference>;
    type Fetched = Vec<Conference>;

    async fn query(&self) -> Result<Vec<Conference>, SyncError> {
        self.dao.load(diary_rows(&self.semester)).await
    }

    async fn fetch(&self) -> Result<Vec<Conference>, SyncError> {
        self.api.conferences(&self.student, &self.semester).await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<Conference>,
        new: Vec<Conference>,
    ) -> Result<(), SyncError> {
        merge_notifiable(self.dao.as_ref(), &old, &new, self.notify).await
    }

    fn is_result_empty(&self, data: &Vec<Conference>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, mut data: Vec<Conference>) -> Vec<Conference> {
        data.sort_by(|a, b| b.date.cmp(&a.date));
        data
    }
}
