//! Local store collaborator.
//!
//! [`Dao`] is the table-level interface repositories read and write through.
//! [`MemoryDao`] keeps rows in memory and backs tests and ephemeral sessions;
//! a relational backend plugs in by implementing the same trait.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;

use schoolsync_core::{
    Attendance, AttendanceSummary, CacheEntity, Conference, Exam, Grade, GradeSummary, Homework,
    LuckyNumber, Message, Note, SchoolAnnouncement, Subject, Teacher, Timetable,
};

use crate::error::SyncError;

/// Row predicate used by [`Dao::load`].
pub type RowFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// One table of cached records.
#[async_trait]
pub trait Dao<E: CacheEntity>: Send + Sync {
    /// Rows matching `filter`, in insertion order.
    async fn load(&self, filter: RowFilter<E>) -> Result<Vec<E>, SyncError>;

    /// Insert rows, assigning fresh row ids; returns the stored rows.
    async fn insert_all(&self, items: Vec<E>) -> Result<Vec<E>, SyncError>;

    /// Delete rows by row id.
    async fn delete_all(&self, items: &[E]) -> Result<(), SyncError>;

    /// Overwrite rows by row id.
    async fn update_all(&self, items: &[E]) -> Result<(), SyncError>;

    /// Delete `removed` and insert `added` as one write.
    async fn replace(&self, removed: &[E], added: Vec<E>) -> Result<(), SyncError> {
        self.delete_all(removed).await?;
        self.insert_all(added).await?;
        Ok(())
    }

    /// Bumped after every committed write.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// Live view of a table: the current rows, then the rows after every write.
pub fn observe<E: CacheEntity>(
    dao: Arc<dyn Dao<E>>,
    filter: RowFilter<E>,
) -> BoxStream<'static, Result<Vec<E>, SyncError>> {
    let stream = async_stream::stream! {
        let mut changes = dao.changes();
        loop {
            changes.borrow_and_update();
            yield dao.load(filter.clone()).await;
            if changes.changed().await.is_err() {
                break;
            }
        }
    };
    stream.boxed()
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

struct Table<E> {
    rows: Vec<E>,
    next_id: i64,
}

/// Vec-backed table; every write happens under one lock.
pub struct MemoryDao<E> {
    table: Mutex<Table<E>>,
    changes: watch::Sender<u64>,
}

impl<E: CacheEntity> Default for MemoryDao<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CacheEntity> MemoryDao<E> {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            table: Mutex::new(Table {
                rows: Vec::new(),
                next_id: 1,
            }),
            changes,
        }
    }

    fn table(&self) -> MutexGuard<'_, Table<E>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn committed(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    pub fn len(&self) -> usize {
        self.table().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_rows<E: CacheEntity>(table: &mut Table<E>, items: Vec<E>) -> Vec<E> {
    let mut stored = Vec::with_capacity(items.len());
    for mut item in items {
        item.set_row_id(table.next_id);
        table.next_id += 1;
        table.rows.push(item.clone());
        stored.push(item);
    }
    stored
}

fn delete_rows<E: CacheEntity>(table: &mut Table<E>, items: &[E]) {
    table
        .rows
        .retain(|row| !items.iter().any(|item| item.row_id() == row.row_id()));
}

#[async_trait]
impl<E: CacheEntity> Dao<E> for MemoryDao<E> {
    async fn load(&self, filter: RowFilter<E>) -> Result<Vec<E>, SyncError> {
        Ok(self
            .table()
            .rows
            .iter()
            .filter(|row| filter(row))
            .cloned()
            .collect())
    }

    async fn insert_all(&self, items: Vec<E>) -> Result<Vec<E>, SyncError> {
        if items.is_empty() {
            return Ok(items);
        }
        let stored = insert_rows(&mut self.table(), items);
        self.committed();
        Ok(stored)
    }

    async fn delete_all(&self, items: &[E]) -> Result<(), SyncError> {
        if items.is_empty() {
            return Ok(());
        }
        delete_rows(&mut self.table(), items);
        self.committed();
        Ok(())
    }

    async fn update_all(&self, items: &[E]) -> Result<(), SyncError> {
        if items.is_empty() {
            return Ok(());
        }
        {
            let mut table = self.table();
            for item in items {
                if let Some(row) = table.rows.iter_mut().find(|r| r.row_id() == item.row_id()) {
                    *row = item.clone();
                }
            }
        }
        self.committed();
        Ok(())
    }

    async fn replace(&self, removed: &[E], added: Vec<E>) -> Result<(), SyncError> {
        if removed.is_empty() && added.is_empty() {
            return Ok(());
        }
        {
            let mut table = self.table();
            delete_rows(&mut table, removed);
            insert_rows(&mut table, added);
        }
        self.committed();
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Store bundle
// ---------------------------------------------------------------------------

/// Every table the repositories need.
#[derive(Clone)]
pub struct Stores {
    pub grades: Arc<dyn Dao<Grade>>,
    pub grade_summaries: Arc<dyn Dao<GradeSummary>>,
    pub exams: Arc<dyn Dao<Exam>>,
    pub attendance: Arc<dyn Dao<Attendance>>,
    pub messages: Arc<dyn Dao<Message>>,
    pub school_announcements: Arc<dyn Dao<SchoolAnnouncement>>,
    pub lucky_numbers: Arc<dyn Dao<LuckyNumber>>,
    pub teachers: Arc<dyn Dao<Teacher>>,
    pub timetable: Arc<dyn Dao<Timetable>>,
    pub homework: Arc<dyn Dao<Homework>>,
    pub notes: Arc<dyn Dao<Note>>,
    pub conferences: Arc<dyn Dao<Conference>>,
    pub attendance_summary: Arc<dyn Dao<AttendanceSummary>>,
    pub subjects: Arc<dyn Dao<Subject>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            grades: Arc::new(MemoryDao::new()),
            grade_summaries: Arc::new(MemoryDao::new()),
            exams: Arc::new(MemoryDao::new()),
            attendance: Arc::new(MemoryDao::new()),
            messages: Arc::new(MemoryDao::new()),
            school_announcements: Arc::new(MemoryDao::new()),
            lucky_numbers: Arc::new(MemoryDao::new()),
            teachers: Arc::new(MemoryDao::new()),
            timetable: Arc::new(MemoryDao::new()),
            homework: Arc::new(MemoryDao::new()),
            notes: Arc::new(MemoryDao::new()),
            conferences: Arc::new(MemoryDao::new()),
            attendance_summary: Arc::new(MemoryDao::new()),
            subjects: Arc::new(MemoryDao::new()),
        }
    }
}
