//! Teachers' notes.
//!
//! Notes are fetched per term but served for the whole pupil, newest first.
//! Notes dated before the account was registered enter already read and
//! notified, so a first sync does not replay a pupil's history.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{Note, Semester, Student, StudentId};

use crate::bound::{network_bound_resource, BoundResource};
use crate::diff::merge_plan;
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::rows;
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "note";

pub struct NoteRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Note>>,
    gate: Arc<FeatureSyncGate>,
}

impl NoteRepository {
    pub fn new(api: Arc<dyn SchoolApi>, dao: Arc<dyn Dao<Note>>, gate: Arc<FeatureSyncGate>) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    pub fn get_notes(
        &self,
        student: &Student,
        semester: &Semester,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Note>>> {
        let source = NoteSource {
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

    pub async fn notes_from_store(&self, student: &Student) -> Result<Vec<Note>, SyncError> {
        let mut notes = self.dao.load(pupil_notes(student.student_id)).await?;
        newest_first(&mut notes);
        Ok(notes)
    }

    pub async fn update_notes(&self, notes: &[Note]) -> Result<(), SyncError> {
        self.dao.update_all(notes).await
    }
}

fn pupil_notes(student_id: StudentId) -> RowFilter<Note> {
    rows(move |note: &Note| note.student_id == student_id)
}

fn newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Added notes with read/notified flags set against the registration day.
pub(crate) fn stamp_new_notes(student: &Student, mut added: Vec<Note>, notify: bool) -> Vec<Note> {
    let registered = student.registration_date.date_naive();
    for note in &mut added {
        let recent = note.date >= registered;
        note.is_read = !recent;
        note.is_notified = !(recent && notify);
    }
    added
}

struct NoteSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Note>>,
    student: Student,
    semester: Semester,
    notify: bool,
}

#[async_trait]
impl BoundResource for NoteSource {
    type Output = Vec<Note>;
    type Fetched = Vec<Note>;

    async fn query(&self) -> Result<Vec<Note>, SyncError> {
        self.dao.load(pupil_notes(self.student.student_id)).await
    }

    async fn fetch(&self) -> Result<Vec<Note>, SyncError> {
        self.api.notes(&self.student, &self.semester).await
    }

    async fn save_fetch_result(&self, old: Vec<Note>, new: Vec<Note>) -> Result<(), SyncError> {
        let plan = merge_plan(&old, &new);
        let added = stamp_new_notes(&self.student, plan.added, self.notify);
        self.dao.replace(&plan.removed, added).await
    }

    fn is_result_empty(&self, data: &Vec<Note>) -> bool {
        data.is_empty()
    }

    fn filter_result(&self, mut data: Vec<Note>) -> Vec<Note> {
        newest_first(&mut data);
        data
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn student() -> Student {
        Student {
            id: 1,
            user_login_id: 10,
            student_id: StudentId(100),
            user_name: "jan".into(),
            student_name: "Jan Kowalski".into(),
            school_name: "SP 1".into(),
            class_name: "b".into(),
            registration_date: Utc.with_ymd_and_hms(2024, 9, 10, 8, 0, 0).unwrap(),
            is_parent: false,
        }
    }

    fn note(day: u32) -> Note {
        Note {
            student_id: StudentId(100),
            date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            content: format!("note {day}"),
            ..Note::default()
        }
    }

    #[test]
    fn notes_before_registration_enter_settled() {
        let stamped = stamp_new_notes(&student(), vec![note(2), note(10), note(20)], true);
        let flags: Vec<_> = stamped.iter().map(|n| (n.is_read, n.is_notified)).collect();
        assert_eq!(flags, vec![(true, true), (false, false), (false, false)]);
    }

    #[test]
    fn silent_sync_marks_recent_notes_notified_but_unread() {
        let stamped = stamp_new_notes(&student(), vec![note(20)], false);
        assert!(!stamped[0].is_read);
        assert!(stamped[0].is_notified);
    }
}
