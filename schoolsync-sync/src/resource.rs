//! `Resource<T>` — the outcome of every cached query and fetch.
//!
//! Data is authoritative whenever present, regardless of status: `Loading`
//! and `Error` may carry the last cached value.

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::SyncError;

/// Coarse status of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub enum Resource<T> {
    /// A refresh is in flight; carries cached data if there is any.
    Loading(Option<T>),
    Success(T),
    /// The refresh failed; cached data stays visible.
    Error { error: SyncError, data: Option<T> },
}

impl<T> Resource<T> {
    pub fn error(error: SyncError, data: Option<T>) -> Self {
        Resource::Error { error, data }
    }

    pub fn status(&self) -> Status {
        match self {
            Resource::Loading(_) => Status::Loading,
            Resource::Success(_) => Status::Success,
            Resource::Error { .. } => Status::Error,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Resource::Loading(data) | Resource::Error { data, .. } => data.as_ref(),
            Resource::Success(data) => Some(data),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Resource::Loading(data) | Resource::Error { data, .. } => data,
            Resource::Success(data) => Some(data),
        }
    }

    pub fn sync_error(&self) -> Option<&SyncError> {
        match self {
            Resource::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// `Ok` for success, `Err` for errors and for a bare loading state.
    pub fn into_result(self) -> Result<T, SyncError> {
        match self {
            Resource::Success(data) => Ok(data),
            Resource::Error { error, .. } => Err(error),
            Resource::Loading(_) => Err(SyncError::NoResult),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Resource::Loading(data) => Resource::Loading(data.map(f)),
            Resource::Success(data) => Resource::Success(f(data)),
            Resource::Error { error, data } => Resource::Error {
                error,
                data: data.map(f),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

/// Terminal-result helpers for resource streams.
pub trait ResourceStreamExt<T>: Stream<Item = Resource<T>> + Send + Sized + 'static
where
    T: Send + 'static,
{
    /// First non-loading item. A stream that ends early yields
    /// [`SyncError::NoResult`] with whatever the last loading item carried.
    fn to_first_result(self) -> BoxFuture<'static, Resource<T>> {
        Box::pin(async move {
            let mut stream = Box::pin(self);
            let mut cached = None;
            while let Some(item) = stream.next().await {
                match item {
                    Resource::Loading(data) => cached = data,
                    terminal => return terminal,
                }
            }
            Resource::error(SyncError::NoResult, cached)
        })
    }

    /// Drain to the terminal item and unwrap it into a `Result`.
    fn wait_for_result(self) -> BoxFuture<'static, Result<T, SyncError>> {
        Box::pin(async move { self.to_first_result().await.into_result() })
    }
}

impl<T, S> ResourceStreamExt<T> for S
where
    S: Stream<Item = Resource<T>> + Send + 'static,
    T: Send + 'static,
{
}

enum Side<A, B> {
    Left(Resource<A>),
    Right(Resource<B>),
}

/// Fan two resource streams into one.
///
/// Nothing is emitted until both inputs produced an item; after that every
/// new item from either side yields a combined resource built from the
/// latest pair.
pub fn combine_resources<A, B>(
    left: impl Stream<Item = Resource<A>> + Send + 'static,
    right: impl Stream<Item = Resource<B>> + Send + 'static,
) -> BoxStream<'static, Resource<(A, B)>>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let merged = stream::select(left.map(Side::Left), right.map(Side::Right));
    let combined = async_stream::stream! {
        let mut merged = Box::pin(merged);
        let mut last_left: Option<Resource<A>> = None;
        let mut last_right: Option<Resource<B>> = None;
        while let Some(side) = merged.next().await {
            match side {
                Side::Left(item) => last_left = Some(item),
                Side::Right(item) => last_right = Some(item),
            }
            if let (Some(left), Some(right)) = (&last_left, &last_right) {
                yield combine_pair(left, right);
            }
        }
    };
    combined.boxed()
}

fn combine_pair<A: Clone, B: Clone>(left: &Resource<A>, right: &Resource<B>) -> Resource<(A, B)> {
    let data = left.data().cloned().zip(right.data().cloned());
    if let Some(error) = left.sync_error().or_else(|| right.sync_error()) {
        return Resource::error(error.clone(), data);
    }
    if left.is_loading() || right.is_loading() {
        return Resource::Loading(data);
    }
    match data {
        Some(pair) => Resource::Success(pair),
        None => Resource::Loading(None),
    }
}
