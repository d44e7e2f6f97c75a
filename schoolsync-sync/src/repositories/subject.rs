use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{Semester, Student, Subject};

use crate::bound::{network_bound_resource, BoundResource};
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::{merge_plain, rows};
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "subject";

/// Subjects taught in the term's class.
pub struct SubjectRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Subject>>,
    gate: Arc<FeatureSyncGate>,
}

impl SubjectRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Subject>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_subjects(
        &self,
        student: &Student,
        semester: &Semester,
        force_refresh: bool,
    ) -> BoxStream<'static, Resource<Vec<Subject>>> {
        let source = SubjectSource {
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
}

fn diary_rows(semester: &Semester) -> RowFilter<Subject> {
    let (student_id, diary_id) = (semester.student_id, semester.diary_id);
    rows(move |subject: &Subject| subject.student_id == student_id && subject.diary_id == diary_id)
}

struct SubjectSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Subject>>,
    student: Student,
    semester: Semester,
}

#[async_trait]
impl BoundResource for SubjectSource {
    type Output = Vec<Subject>;
    type Fetched = Vec<Subject>;

    async fn query(&self) -> Result<Vec<Subject>, SyncError> {
        self.dao.load(diary_rows(&self.semester)).await
    }

    async fn fetch(&self) -> Result<Vec<Subject>, SyncError> {
        self.api.subjects(&self.student, &self.semester).await
    }

    async fn save_fetch_result(&self, old: Vec<Subject>, new: Vec<Subject>) -> Result<(), SyncError> {
        merge_plain(self.dao.as_ref(), &old, &new).await
    }

    fn is_result_empty(&self, data: &Vec<Subject>) -> bool {
        data.is_empty()
    }
}
