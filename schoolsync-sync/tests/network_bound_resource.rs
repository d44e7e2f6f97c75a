mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use tokio::sync::watch;

use schoolsync_core::{Exam, Notifiable};
use schoolsync_sync::store::RowFilter;
use schoolsync_sync::{Dao, RefreshKey, ResourceStreamExt, Status, SyncError, TimestampStore};

use common::{day, exam, semester, student, subjects, Harness};

fn exam_key() -> RefreshKey {
    RefreshKey::for_term_window("exam", &semester(), day(), day())
}

#[tokio::test]
async fn empty_cache_emits_loading_then_inserts_pending_items() {
    let h = Harness::new();
    h.api
        .exams
        .respond(Ok(vec![exam("Math"), exam("Physics"), exam("Biology")]));

    let items: Vec<_> = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), false, true)
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].status(), Status::Loading);
    assert!(items[0].data().is_none(), "empty cache loads without data");
    assert_eq!(items[1].status(), Status::Success);
    assert_eq!(items[1].data().map(Vec::len), Some(3));

    let cached = h.cached_exams().await;
    assert_eq!(cached.len(), 3);
    assert!(cached.iter().all(|e| !e.is_notified()));
}

#[tokio::test]
async fn merge_replaces_removed_and_keeps_survivor_flags() {
    let h = Harness::new();
    let seeded: Vec<Exam> = ["a", "b", "c"]
        .iter()
        .map(|s| Exam {
            is_notified: true,
            ..exam(s)
        })
        .collect();
    h.exams.insert_all(seeded).await.expect("seed");
    h.api
        .exams
        .respond(Ok(vec![exam("a"), exam("b"), exam("d")]));

    let result = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), true, true)
        .wait_for_result()
        .await
        .expect("success");

    assert_eq!(subjects(&result), vec!["a", "b", "d"]);
    let cached = h.cached_exams().await;
    for exam in &cached {
        let expected_notified = exam.subject != "d";
        assert_eq!(exam.is_notified, expected_notified, "{}", exam.subject);
    }
}

#[tokio::test]
async fn fresh_cache_is_served_without_fetching() {
    let h = Harness::new();
    h.exams.insert_all(vec![exam("a")]).await.expect("seed");
    h.timestamps
        .put_millis(exam_key().as_str(), chrono::Utc::now().timestamp_millis())
        .expect("stamp");

    let items: Vec<_> = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), false, false)
        .collect()
        .await;

    assert_eq!(h.api.exams.calls(), 0);
    assert_eq!(items[0].status(), Status::Loading);
    assert_eq!(items[0].data().map(Vec::len), Some(1));
    assert_eq!(items.last().map(|r| r.status()), Some(Status::Success));
}

#[tokio::test]
async fn stale_cache_is_refetched() {
    let h = Harness::new();
    h.exams.insert_all(vec![exam("a")]).await.expect("seed");
    let two_hours_ago = chrono::Utc::now().timestamp_millis() - 2 * 60 * 60 * 1000;
    h.timestamps
        .put_millis(exam_key().as_str(), two_hours_ago)
        .expect("stamp");
    h.api.exams.respond(Ok(vec![exam("b")]));

    let result = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), false, false)
        .wait_for_result()
        .await
        .expect("success");

    assert_eq!(h.api.exams.calls(), 1);
    assert_eq!(subjects(&result), vec!["b"]);
}

#[tokio::test]
async fn concurrent_forced_refreshes_share_one_fetch() {
    let h = Harness::new();
    h.api.exams.delay(Duration::from_millis(50));
    h.api.exams.respond(Ok(vec![exam("a"), exam("b")]));

    let requests = (0..5).map(|_| {
        h.repos
            .exams
            .get_exams(&student(), &semester(), day(), day(), true, true)
            .wait_for_result()
    });
    let results = join_all(requests).await;

    assert_eq!(h.api.exams.calls(), 1);
    for result in results {
        assert_eq!(subjects(&result.expect("success")), vec!["a", "b"]);
    }
    assert_eq!(h.cached_exams().await.len(), 2, "merged once, no duplicates");
}

#[tokio::test]
async fn fetch_failure_keeps_cache_and_attaches_it() {
    let h = Harness::new();
    h.exams
        .insert_all(vec![exam("a"), exam("b")])
        .await
        .expect("seed");
    h.api
        .exams
        .respond(Err(SyncError::network("connection reset")));

    let items: Vec<_> = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), true, true)
        .collect()
        .await;

    let loading = &items[0];
    let last = items.last().expect("terminal");
    assert_eq!(last.status(), Status::Error);
    assert!(matches!(last.sync_error(), Some(SyncError::Network { .. })));
    assert_eq!(
        last.data().map(|d| subjects(d)),
        loading.data().map(|d| subjects(d))
    );
    assert_eq!(h.cached_exams().await.len(), 2, "nothing deleted");
    assert!(h.repos.exams.gate().last_refresh(&exam_key()).is_none());
}

#[tokio::test]
async fn empty_remote_on_empty_cache_stamps_the_key() {
    let h = Harness::new();
    h.api.exams.respond(Ok(vec![]));

    let result = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), false, true)
        .wait_for_result()
        .await
        .expect("success");

    assert!(result.is_empty());
    assert!(h.repos.exams.gate().last_refresh(&exam_key()).is_some());
}

#[tokio::test]
async fn duplicate_cached_rows_collapse_on_refresh() {
    let h = Harness::new();
    h.exams
        .insert_all(vec![exam("a"), exam("a"), exam("b")])
        .await
        .expect("seed");
    h.api.exams.respond(Ok(vec![exam("a"), exam("b")]));

    h.repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), true, false)
        .wait_for_result()
        .await
        .expect("success");

    assert_eq!(subjects(&h.cached_exams().await), vec!["a", "b"]);
}

#[tokio::test]
async fn dropped_subscription_does_not_abandon_the_merge() {
    let h = Harness::new();
    h.api.exams.delay(Duration::from_millis(100));
    h.api.exams.respond(Ok(vec![exam("a"), exam("b"), exam("c")]));

    let mut stream = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), true, true);
    let first = stream.next().await.expect("loading");
    assert!(first.is_loading());
    let pending = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
    assert!(pending.is_err(), "fetch still in flight");
    drop(stream);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(h.api.exams.calls(), 1);
    assert_eq!(h.cached_exams().await.len(), 3, "merge ran to completion");

    let lock = tokio::time::timeout(Duration::from_millis(50), h.repos.exams.gate().lock()).await;
    assert!(lock.is_ok(), "feature lock released");
}

// ---------------------------------------------------------------------------
// Local store failures
// ---------------------------------------------------------------------------

/// Reads pass through; every write fails.
struct ReadOnlyDao {
    inner: Arc<dyn Dao<Exam>>,
}

#[async_trait]
impl Dao<Exam> for ReadOnlyDao {
    async fn load(&self, filter: RowFilter<Exam>) -> Result<Vec<Exam>, SyncError> {
        self.inner.load(filter).await
    }

    async fn insert_all(&self, _items: Vec<Exam>) -> Result<Vec<Exam>, SyncError> {
        Err(SyncError::LocalStore("disk full".into()))
    }

    async fn delete_all(&self, _items: &[Exam]) -> Result<(), SyncError> {
        Err(SyncError::LocalStore("disk full".into()))
    }

    async fn update_all(&self, _items: &[Exam]) -> Result<(), SyncError> {
        Err(SyncError::LocalStore("disk full".into()))
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes()
    }
}

#[tokio::test]
async fn local_store_failure_surfaces_as_error_and_releases_lock() {
    let h = Harness::with_exam_dao(|inner| Arc::new(ReadOnlyDao { inner }));
    h.exams.insert_all(vec![exam("a")]).await.expect("seed");
    h.api.exams.respond(Ok(vec![exam("b")]));

    let outcome = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), true, true)
        .to_first_result()
        .await;

    assert!(matches!(outcome.sync_error(), Some(SyncError::LocalStore(_))));
    assert_eq!(outcome.data().map(|d| subjects(d)), Some(vec!["a".to_string()]));
    assert!(h.repos.exams.gate().last_refresh(&exam_key()).is_none());

    let lock = tokio::time::timeout(Duration::from_millis(50), h.repos.exams.gate().lock()).await;
    assert!(lock.is_ok(), "feature lock released after failed merge");
}

/// Every read fails; writes never happen.
struct UnreadableDao {
    inner: Arc<dyn Dao<Exam>>,
}

#[async_trait]
impl Dao<Exam> for UnreadableDao {
    async fn load(&self, _filter: RowFilter<Exam>) -> Result<Vec<Exam>, SyncError> {
        Err(SyncError::LocalStore("disk".into()))
    }

    async fn insert_all(&self, items: Vec<Exam>) -> Result<Vec<Exam>, SyncError> {
        self.inner.insert_all(items).await
    }

    async fn delete_all(&self, items: &[Exam]) -> Result<(), SyncError> {
        self.inner.delete_all(items).await
    }

    async fn update_all(&self, items: &[Exam]) -> Result<(), SyncError> {
        self.inner.update_all(items).await
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes()
    }
}

#[tokio::test]
async fn unreadable_cache_still_reports_loading_first() {
    let h = Harness::with_exam_dao(|inner| Arc::new(UnreadableDao { inner }));
    h.api.exams.respond(Ok(vec![exam("a")]));

    let items: Vec<_> = h
        .repos
        .exams
        .get_exams(&student(), &semester(), day(), day(), true, true)
        .collect()
        .await;

    let statuses: Vec<Status> = items.iter().map(|r| r.status()).collect();
    assert_eq!(statuses, vec![Status::Loading, Status::Error]);
    assert!(items[0].data().is_none());
    assert!(matches!(items[1].sync_error(), Some(SyncError::LocalStore(_))));
    assert_eq!(h.api.exams.calls(), 0, "no fetch without a readable cache");
}
