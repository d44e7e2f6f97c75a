use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{SchoolAnnouncement, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_notifiable, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "school_announcement";

/// Announcements from the school principal, cached per login.
pub struct SchoolAnnouncementRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<SchoolAnnouncement>>,
    gate: Arc<FeatureSyncGate>,
}

impl SchoolAnnouncementRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<SchoolAnnouncement>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_school_announcements(
        &self,
        student: &Student,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<SchoolAnnouncement>>> {
        let source = AnnouncementSource {
            api: self.api.clone(),
            dao: self.dao.clone(),
            student: student.clone(),
            notify,
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_account(CACHE_KEY, student),
            force_refresh,
        )
    }

    pub async fn school_announcements_from_store(
        &self,
        student: &Student,
    ) -> Result<Vec<SchoolAnnouncement>, SyncError> {
        self.dao.load(login_rows(student)).await
    }

    pub async fn update_school_announcements(
        &self,
        announcements: &[SchoolAnnouncement],
    ) -> Result<(), SyncError> {
        self.dao.update_all(announcements).await
    }
}

fn login_rows(student: &Student) -> RowFilter<SchoolAnnouncement> {
    let login = student.user_login_id;
    rows(move |announcement: &SchoolAnnouncement| announcement.user_login_id == login)
}

struct AnnouncementSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<SchoolAnnouncement>>,
    student: Student,
    notify: bool,
}

#[async_trait]
impl BoundResource for AnnouncementSource {
    type Output = Vec<SchoolAnnouncement>;
    type Fetched = Vec<SchoolAnnouncement>;

    async fn query(&self) -> Result<Vec<SchoolAnnouncement>, SyncError> {
        self.dao.load(login_rows(&self.student)).await
    }

    async fn fetch(&self) -> Result<Vec<SchoolAnnouncement>, SyncError> {
        self.api.school_announcements(&self.student).await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<SchoolAnnouncement>,
        new: Vec<SchoolAnnouncement>,
    ) -> Result<(), SyncError> {
        merge_notifiable(self.dao.as_ref(), &old, &new, self.notify).await
    }

    fn is_result_empty(&self, data: &Vec<SchoolAnnouncement>) -> bool {
        data.is_empty()
    }
}
