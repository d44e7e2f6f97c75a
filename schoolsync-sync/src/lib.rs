//! # schoolsync-sync
//!
//! Offline-first cache/sync engine.
//!
//! Every feature repository serves its data through
//! [`network_bound_resource`]: cached rows first, then (when the cache is
//! empty, stale or a refresh is forced) one fetch per feature at a time,
//! a multiset merge into the local store, and the merged rows.
//!
//! Public API surface:
//! - [`resource`] — [`Resource`] and stream helpers
//! - [`diff`] — [`unique_subtract`] / [`merge_plan`]
//! - [`timestamp_store`] — durable refresh timestamps
//! - [`staleness`] — [`FeatureSyncGate`] and [`RefreshKey`]
//! - [`bound`] — the orchestrator and its [`BoundResource`] trait
//! - [`store`] / [`remote`] — local-store and remote-API collaborators
//! - [`repositories`] — one repository per cached feature

pub mod bound;
pub mod diff;
pub mod error;
pub mod remote;
pub mod repositories;
pub mod resource;
pub mod staleness;
pub mod store;
pub mod timestamp_store;

pub use bound::{network_bound_resource, BoundResource};
pub use diff::{merge_plan, unique_subtract, MergePlan};
pub use error::{AuthFailure, SyncError};
pub use remote::SchoolApi;
pub use repositories::Repositories;
pub use resource::{combine_resources, Resource, ResourceStreamExt, Status};
pub use staleness::{FeatureSyncGate, RefreshKey};
pub use store::{Dao, MemoryDao, Stores};
pub use timestamp_store::{JsonTimestampStore, MemoryTimestampStore, TimestampStore};
