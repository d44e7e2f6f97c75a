use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{Semester, Student, Teacher};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_plain, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "teachers";

/// Teachers of the account's class. Nothing here raises notifications.
pub struct TeacherRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Teacher>>,
    gate: Arc<FeatureSyncGate>,
}

impl TeacherRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Teacher>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_teachers(
        &self,
        student: &Student,
        semester: &Semester,
        force_refresh: bool,
    ) -> BoxStream<'static, Resource<Vec<Teacher>>> {
        let source = TeacherSource {
            api: self.api.clone(),
            dao: self.dao.clone(),
            student: student.clone(),
            semester: semester.clone(),
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_term(CACHE_KEY, semester),
            force_refresh,
        )
    }

    pub async fn teachers_from_store(&self, semester: &Semester) -> Result<Vec<Teacher>, SyncError> {
        self.dao.load(class_rows(semester)).await
    }
}

fn class_rows(semester: &Semester) -> RowFilter<Teacher> {
    let (student_id, class_id) = (semester.student_id, semester.class_id);
    rows(move |teacher: &Teacher| teacher.student_id == student_id && teacher.class_id == class_id)
}

struct TeacherSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Teacher>>,
    student: Student,
    semester: Semester,
}

#[async_trait]
impl BoundResource for TeacherSource {
    type Output = Vec<Teacher>;
    type Fetched = Vec<Teacher>;

    async fn query(&self) -> Result<Vec<Teacher>, SyncError> {
        self.dao.load(class_rows(&self.semester)).await
    }

    async fn fetch(&self) -> Result<Vec<Teacher>, SyncError> {
        self.api.teachers(&self.student, &self.semester).await
    }

    async fn save_fetch_result(&self, old: Vec<Teacher>, new: Vec<Teacher>) -> Result<(), SyncError> {
        merge_plain(self.dao.as_ref(), &old, &new).await
    }

    fn is_result_empty(&self, data: &Vec<Teacher>) -> bool {
        data.is_empty()
    }
}
