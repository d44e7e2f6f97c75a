use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use schoolsync_core::{StudentWithCurrentSemester, SyncConfig};

use crate::notifier::Notifier;
use crate::scheduler::{ConsistencyAnomaly, VerificationPolicy, Work, WorkFailure, WorkReport};
use crate::works::{all_works, WorkContext};

/// Minimum time between two CAPTCHA prompts for the same account.
pub const CAPTCHA_NOTIFICATION_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Outcome of one [`SyncWorker::run`].
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// One report per work, in registration order.
    pub works: Vec<WorkReport>,
    pub captcha_prompts: usize,
    pub duration_ms: u128,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &WorkFailure> {
        self.works.iter().flat_map(|report| report.failures.iter())
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &ConsistencyAnomaly> {
        self.works.iter().flat_map(|report| report.anomalies.iter())
    }

    pub fn is_success(&self) -> bool {
        self.works.iter().all(WorkReport::is_success)
    }
}

/// Runs every registered work over the current accounts with a bounded
/// number of works in flight.
pub struct SyncWorker {
    works: Vec<Arc<dyn Work>>,
    notifier: Arc<dyn Notifier>,
    max_concurrent_works: usize,
    captcha_cooldown: Duration,
    /// Last CAPTCHA prompt per account (`user_login_id`).
    last_captcha: Mutex<HashMap<i64, Instant>>,
}

impl SyncWorker {
    /// Worker with every feature work registered.
    pub fn new(ctx: WorkContext, config: &SyncConfig) -> Self {
        let policy = VerificationPolicy::from_rate(config.verification_rate);
        let notifier = ctx.notifier.clone();
        Self::with_works(all_works(&ctx, policy), notifier, config.max_concurrent_works)
    }

    pub fn with_works(
        works: Vec<Arc<dyn Work>>,
        notifier: Arc<dyn Notifier>,
        max_concurrent_works: usize,
    ) -> Self {
        Self {
            works,
            notifier,
            max_concurrent_works: max_concurrent_works.max(1),
            captcha_cooldown: CAPTCHA_NOTIFICATION_COOLDOWN,
            last_captcha: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_captcha_cooldown(mut self, cooldown: Duration) -> Self {
        self.captcha_cooldown = cooldown;
        self
    }

    pub fn work_names(&self) -> Vec<&'static str> {
        self.works.iter().map(|work| work.name()).collect()
    }

    pub async fn run(&self, members: &[StudentWithCurrentSemester]) -> SyncReport {
        let started = Instant::now();
        tracing::info!(
            accounts = members.len(),
            works = self.works.len(),
            max_concurrent = self.max_concurrent_works,
            "sync run started",
        );

        let mut reports: Vec<(usize, WorkReport)> = stream::iter(self.works.iter().enumerate())
            .map(|(index, work)| async move { (index, work.do_work(members).await) })
            .buffer_unordered(self.max_concurrent_works)
            .collect()
            .await;
        reports.sort_by_key(|(index, _)| *index);
        let works: Vec<WorkReport> = reports.into_iter().map(|(_, report)| report).collect();

        let captcha_prompts = self.prompt_for_captcha(&works).await;
        let report = SyncReport {
            works,
            captcha_prompts,
            duration_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            failures = report.failures().count(),
            anomalies = report.anomalies().count(),
            captcha_prompts,
            duration_ms = report.duration_ms,
            "sync run finished",
        );
        report
    }

    /// One CAPTCHA prompt per affected account, throttled per account.
    async fn prompt_for_captcha(&self, works: &[WorkReport]) -> usize {
        let mut prompted: Vec<i64> = Vec::new();
        let mut sent = 0;
        for failure in works.iter().flat_map(|report| report.failures.iter()) {
            let Some(url) = failure.error.captcha_url() else {
                continue;
            };
            let account = failure.student.user_login_id;
            if prompted.contains(&account) {
                continue;
            }
            prompted.push(account);

            if !self.claim_captcha_slot(account) {
                tracing::debug!(
                    account = %failure.student.user_name,
                    "captcha prompt suppressed, too soon after the previous one",
                );
                continue;
            }
            self.notifier
                .notify_captcha_required(&failure.student, url)
                .await;
            sent += 1;
        }
        sent
    }

    fn claim_captcha_slot(&self, account: i64) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_captcha
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last.get(&account) {
            Some(previous) if now.duration_since(*previous) < self.captcha_cooldown => false,
            _ => {
                last.insert(account, now);
                true
            }
        }
    }
}

/// Install the fmt subscriber (`RUST_LOG` wins, `info` otherwise). Safe to
/// call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
