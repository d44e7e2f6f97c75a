//! Lucky number of a day: at most one cached value per pupil and date.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;

use schoolsync_core::{CacheEntity, LuckyNumber, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::rows;
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "lucky_number";

pub struct LuckyNumberRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<LuckyNumber>>,
    gate: Arc<FeatureSyncGate>,
}

impl LuckyNumberRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<LuckyNumber>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_lucky_number(
        &self,
        student: &Student,
        date: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Option<LuckyNumber>>> {
        let source = LuckyNumberSource {
            api: self.api.clone(),
            dao: self.dao.clone(),
            student: student.clone(),
            date,
            notify,
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_account(CACHE_KEY, student),
            force_refresh,
        )
    }

    pub async fn lucky_number_from_store(
        &self,
        student: &Student,
        date: NaiveDate,
    ) -> Result<Option<LuckyNumber>, SyncError> {
        Ok(self.dao.load(day_rows(student, date)).await?.into_iter().next())
    }

    /// The day's number if it still waits for a notification.
    pub async fn not_notified_lucky_number(
        &self,
        student: &Student,
        date: NaiveDate,
    ) -> Result<Option<LuckyNumber>, SyncError> {
        Ok(self
            .lucky_number_from_store(student, date)
            .await?
            .filter(|number| !number.is_notified))
    }

    pub async fn update_lucky_number(&self, number: &LuckyNumber) -> Result<(), SyncError> {
        self.dao.update_all(std::slice::from_ref(number)).await
    }
}

fn day_rows(student: &Student, date: NaiveDate) -> RowFilter<LuckyNumber> {
    let student_id = student.student_id;
    rows(move |number: &LuckyNumber| number.student_id == student_id && number.date == date)
}

struct LuckyNumberSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<LuckyNumber>>,
    student: Student,
    date: NaiveDate,
    notify: bool,
}

#[async_trait]
impl BoundResource for LuckyNumberSource {
    type Output = Option<LuckyNumber>;
    type Fetched = Option<LuckyNumber>;

    async fn query(&self) -> Result<Option<LuckyNumber>, SyncError> {
        Ok(self
            .dao
            .load(day_rows(&self.student, self.date))
            .await?
            .into_iter()
            .next())
    }

    async fn fetch(&self) -> Result<Option<LuckyNumber>, SyncError> {
        self.api.lucky_number(&self.student).await
    }

    async fn save_fetch_result(
        &self,
        old: Option<LuckyNumber>,
        new: Option<LuckyNumber>,
    ) -> Result<(), SyncError> {
        let Some(mut new) = new else {
            return Ok(());
        };
        if old.as_ref().map(LuckyNumber::natural_key) == Some(new.natural_key()) {
            return Ok(());
        }
        new.is_notified = !self.notify;
        let removed: Vec<LuckyNumber> = old.into_iter().collect();
        self.dao.replace(&removed, vec![new]).await
    }

    fn is_result_empty(&self, data: &Option<LuckyNumber>) -> bool {
        data.is_none()
    }
}
