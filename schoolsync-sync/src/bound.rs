//! Network-bound resource: serve the cache, refetch when warranted, merge,
//! serve the merged cache.
//!
//! # Stream shape
//!
//! ```text
//! query err ─► Loading(none) ─► Error(cause, none)
//!
//! Loading(cached?) ─┬─ no fetch needed ──────────────► Success(cached)
//!                   └─ fetch needed ─► [feature lock]
//!                                        re-read old
//!                                        fetch ──── err ─► Error(cause, old)
//!                                        save(old, new) ─ err ─► Error(cause, old)
//!                                        stamp refresh key
//!                                      [unlock] re-query ─► Success(merged)
//! ```
//!
//! The locked section runs on its own task: dropping the stream cancels the
//! subscription, never a half-written merge.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use crate::error::SyncError;
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey, RefreshTicket};

/// One cached query bound to its remote source.
#[async_trait]
pub trait BoundResource: Send + Sync + 'static {
    /// What the local cache returns for this query.
    type Output: Clone + Send + Sync + 'static;
    /// What the remote source returns.
    type Fetched: Send + 'static;

    async fn query(&self) -> Result<Self::Output, SyncError>;

    async fn fetch(&self) -> Result<Self::Fetched, SyncError>;

    /// Persist the merge of `new` into `old`.
    async fn save_fetch_result(
        &self,
        old: Self::Output,
        new: Self::Fetched,
    ) -> Result<(), SyncError>;

    fn is_result_empty(&self, data: &Self::Output) -> bool;

    /// Extra reason to fetch beyond emptiness, forcing and staleness.
    fn should_fetch(&self, _cached: &Self::Output) -> bool {
        false
    }

    /// Projection applied to whatever the query returns before it is served.
    fn filter_result(&self, data: Self::Output) -> Self::Output {
        data
    }
}

struct MergeFailure<T> {
    error: SyncError,
    old: Option<T>,
}

/// Drive `source` through the cache-then-network cycle for `key`.
pub fn network_bound_resource<R: BoundResource>(
    source: Arc<R>,
    gate: Arc<FeatureSyncGate>,
    key: RefreshKey,
    force_refresh: bool,
) -> BoxStream<'static, Resource<R::Output>> {
    let stream = async_stream::stream! {
        // Refreshes completed after this point satisfy this subscription.
        let ticket = gate.watch(&key);

        let cached = match source.query().await {
            Ok(cached) => cached,
            Err(error) => {
                tracing::warn!(feature = %gate.feature(), key = %key, error = %error, "cache query failed");
                yield Resource::Loading(None);
                yield Resource::error(error, None);
                return;
            }
        };
        let shown = visible(&*source, cached.clone());
        yield Resource::Loading(shown.clone());

        let empty = source.is_result_empty(&cached);
        let fetch = empty
            || force_refresh
            || gate.should_be_refreshed(&key)
            || source.should_fetch(&cached);
        if !fetch {
            yield Resource::Success(source.filter_result(cached));
            return;
        }

        let task = tokio::spawn(fetch_and_merge(
            source.clone(),
            gate.clone(),
            key.clone(),
            ticket,
        ));
        match task.await {
            Ok(Ok(merged)) => {
                yield Resource::Success(source.filter_result(merged));
            }
            Ok(Err(MergeFailure { error, old })) => {
                let data = match old {
                    Some(old) => visible(&*source, old),
                    None => shown,
                };
                yield Resource::error(error, data);
            }
            Err(join) => {
                yield Resource::error(SyncError::from(join), shown);
            }
        }
    };
    stream.boxed()
}

/// Cached data as served alongside a non-success state: filtered, and
/// absent when empty.
fn visible<R: BoundResource>(source: &R, data: R::Output) -> Option<R::Output> {
    let filtered = source.filter_result(data);
    if source.is_result_empty(&filtered) {
        None
    } else {
        Some(filtered)
    }
}

async fn fetch_and_merge<R: BoundResource>(
    source: Arc<R>,
    gate: Arc<FeatureSyncGate>,
    key: RefreshKey,
    ticket: RefreshTicket,
) -> Result<R::Output, MergeFailure<R::Output>> {
    let guard = gate.lock().await;

    if ticket.refreshed_since() {
        drop(guard);
        tracing::debug!(feature = %gate.feature(), key = %key, "joined a refresh completed while waiting");
        return source
            .query()
            .await
            .map_err(|error| MergeFailure { error, old: None });
    }

    let old = source
        .query()
        .await
        .map_err(|error| MergeFailure { error, old: None })?;

    tracing::debug!(feature = %gate.feature(), key = %key, "fetching");
    let fetched = match source.fetch().await {
        Ok(fetched) => fetched,
        Err(error) => {
            tracing::warn!(feature = %gate.feature(), key = %key, error = %error, "fetch failed");
            return Err(MergeFailure {
                error,
                old: Some(old),
            });
        }
    };

    if let Err(error) = source.save_fetch_result(old.clone(), fetched).await {
        tracing::error!(feature = %gate.feature(), key = %key, error = %error, "merge failed");
        return Err(MergeFailure {
            error,
            old: Some(old),
        });
    }
    if let Err(error) = gate.update_last_refresh_timestamp(&key) {
        tracing::warn!(feature = %gate.feature(), key = %key, error = %error, "could not stamp refresh key");
    }
    gate.mark_refreshed(&key);
    drop(guard);
    tracing::info!(feature = %gate.feature(), key = %key, "refreshed");

    source.query().await.map_err(|error| MergeFailure {
        error,
        old: Some(old),
    })
}
