use std::collections::HashSet;

use async_trait::async_trait;

use schoolsync_core::{
    CacheEntity, Note, NotificationScope, NotificationType, Student, StudentWithCurrentSemester,
};
use schoolsync_sync::{ResourceStreamExt, SyncError};

use crate::notifier::{count_title, Notification};
use crate::scheduler::ScopedWork;
use crate::works::{notified, same_items, WorkContext};

/// Refreshes the term's notes; notifies about every note not announced yet.
pub struct NoteWork {
    ctx: WorkContext,
}

impl NoteWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self { ctx }
    }
}

/// One note per natural key, first occurrence kept.
fn distinct(notes: &[Note]) -> Vec<&Note> {
    let mut seen = HashSet::new();
    notes
        .iter()
        .filter(|note| seen.insert(note.natural_key()))
        .collect()
}

#[async_trait]
impl ScopedWork for NoteWork {
    type Data = Vec<Note>;

    fn name(&self) -> &'static str {
        "notes"
    }

    fn scope(&self) -> NotificationScope {
        NotificationType::NewNote.scope()
    }

    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Vec<Note>, SyncError> {
        let notes = &self.ctx.repos.notes;
        notes
            .get_notes(
                &member.student,
                &member.semester,
                true,
                self.ctx.notifications_enabled,
            )
            .wait_for_result()
            .await?;

        let mut pending = notes.notes_from_store(&member.student).await?;
        pending.retain(|note| !note.is_notified);
        Ok(pending)
    }

    /// Identical notes are listed once; every copy is marked notified.
    async fn notify(&self, scope_key: &str, data: &Vec<Note>, recipients: &[Student]) {
        let unique = distinct(data);
        if unique.is_empty() {
            return;
        }
        let lines = unique
            .iter()
            .map(|n| format!("{} {}: {}", n.date.format("%d.%m"), n.teacher, n.content))
            .collect();
        let title = count_title(unique.len(), "note", "notes");
        let notification = Notification::new(NotificationType::NewNote, title, lines);
        self.ctx
            .notifier
            .notify(&notification, scope_key, recipients)
            .await;
    }

    async fn mark_notified(&self, data: Vec<Note>) -> Result<(), SyncError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ctx.repos.notes.update_notes(&notified(data)).await
    }

    fn same_data(&self, a: &Vec<Note>, b: &Vec<Note>) -> bool {
        same_items(a, b)
    }
}
