//! Background sync: scoped scheduler, per-feature works and the run driver.
//!
//! A host (timer, job scheduler, CLI) builds a [`SyncWorker`] once and calls
//! [`SyncWorker::run`] with the registered accounts on every tick.

pub mod notifier;
mod runtime;
pub mod scheduler;
pub mod works;

pub use notifier::{Delivered, Notification, Notifier, RecordingNotifier, TracingNotifier};
pub use runtime::{init_tracing, SyncReport, SyncWorker, CAPTCHA_NOTIFICATION_COOLDOWN};
pub use scheduler::{
    group_by_scope, run_scoped, ConsistencyAnomaly, Scoped, ScopeGroup, ScopedWork,
    VerificationPolicy, Work, WorkFailure, WorkReport,
};
pub use works::{all_works, WorkContext};
