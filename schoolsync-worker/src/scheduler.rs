//! Scoped sync scheduler.
//!
//! A scoped work runs once per *group* of accounts sharing a notification
//! scope key (one pupil seen from a guardian and a pupil account is one
//! `Person` group), so every new item raises one notification per group
//! rather than one per account.
//!
//! Per group:
//! 1. decide (per [`VerificationPolicy`]) whether to verify;
//! 2. verifying: fetch for every member, compare the results and report a
//!    [`ConsistencyAnomaly`] when they differ; the first member's result is
//!    delivered either way;
//! 3. otherwise fetch for the first member only;
//! 4. notify once with every member as recipient, then persist the
//!    notified flags.
//!
//! A failing group is recorded in the [`WorkReport`] and the remaining
//! groups still run.

use async_trait::async_trait;

use schoolsync_core::{NotificationScope, Student, StudentWithCurrentSemester};
use schoolsync_sync::SyncError;

// ---------------------------------------------------------------------------
// Verification policy
// ---------------------------------------------------------------------------

/// How often a group is verified by fetching for every member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerificationPolicy {
    Never,
    Always,
    /// Verify with the given probability (`0 < p < 1`).
    Sampled(f64),
}

impl VerificationPolicy {
    pub fn from_rate(rate: f64) -> Self {
        if rate <= 0.0 || rate.is_nan() {
            VerificationPolicy::Never
        } else if rate >= 1.0 {
            VerificationPolicy::Always
        } else {
            VerificationPolicy::Sampled(rate)
        }
    }

    pub fn should_verify(self) -> bool {
        match self {
            VerificationPolicy::Never => false,
            VerificationPolicy::Always => true,
            VerificationPolicy::Sampled(rate) => rand::random::<f64>() < rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Accounts sharing one scope key, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeGroup {
    pub key: String,
    pub members: Vec<StudentWithCurrentSemester>,
}

impl ScopeGroup {
    pub fn recipients(&self) -> Vec<Student> {
        self.members.iter().map(|m| m.student.clone()).collect()
    }
}

/// Group `members` by their key under `scope`. Groups keep the order in
/// which their key first appears; members keep input order.
pub fn group_by_scope(
    scope: NotificationScope,
    members: &[StudentWithCurrentSemester],
) -> Vec<ScopeGroup> {
    let mut groups: Vec<ScopeGroup> = Vec::new();
    for member in members {
        let key = scope.key_for(&member.student, &member.semester);
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.members.push(member.clone()),
            None => groups.push(ScopeGroup {
                key,
                members: vec![member.clone()],
            }),
        }
    }
    groups
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Members of one group fetched different data during verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyAnomaly {
    pub work: &'static str,
    pub scope: NotificationScope,
    pub scope_key: String,
    pub members: usize,
    pub distinct_results: usize,
}

#[derive(Debug, Clone)]
pub struct WorkFailure {
    pub work: &'static str,
    pub scope_key: String,
    pub student: Student,
    pub error: SyncError,
}

/// Outcome of one work over one set of accounts.
#[derive(Debug, Clone, Default)]
pub struct WorkReport {
    pub work: &'static str,
    pub groups: usize,
    pub verified_groups: usize,
    pub notified_groups: usize,
    pub failures: Vec<WorkFailure>,
    pub anomalies: Vec<ConsistencyAnomaly>,
}

impl WorkReport {
    pub fn new(work: &'static str) -> Self {
        Self {
            work,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record_failure(
        &mut self,
        scope_key: &str,
        student: &Student,
        error: SyncError,
    ) {
        if error.is_should_be_reported() {
            tracing::error!(
                work = self.work,
                scope_key,
                account = %student.user_name,
                error = %error,
                "work failed",
            );
        } else {
            tracing::warn!(
                work = self.work,
                scope_key,
                account = %student.user_name,
                error = %error,
                "work skipped",
            );
        }
        self.failures.push(WorkFailure {
            work: self.work,
            scope_key: scope_key.to_string(),
            student: student.clone(),
            error,
        });
    }
}

// ---------------------------------------------------------------------------
// Work traits
// ---------------------------------------------------------------------------

/// A unit of background sync run over every registered account.
#[async_trait]
pub trait Work: Send + Sync {
    fn name(&self) -> &'static str;

    async fn do_work(&self, members: &[StudentWithCurrentSemester]) -> WorkReport;
}

/// A work whose notifications are deduplicated per scope group.
#[async_trait]
pub trait ScopedWork: Send + Sync {
    type Data: Send + Sync;

    fn name(&self) -> &'static str;

    fn scope(&self) -> NotificationScope;

    /// Refresh the feature for `member` and return what still waits for a
    /// notification.
    async fn fetch_new_data(
        &self,
        member: &StudentWithCurrentSemester,
    ) -> Result<Self::Data, SyncError>;

    async fn notify(&self, scope_key: &str, data: &Self::Data, recipients: &[Student]);

    /// Persist the notified flag of everything in `data`.
    async fn mark_notified(&self, data: Self::Data) -> Result<(), SyncError>;

    /// Whether two members fetched the same data.
    fn same_data(&self, a: &Self::Data, b: &Self::Data) -> bool;
}

/// Adapts a [`ScopedWork`] to [`Work`].
pub struct Scoped<W> {
    work: W,
    policy: VerificationPolicy,
}

impl<W: ScopedWork> Scoped<W> {
    pub fn new(work: W, policy: VerificationPolicy) -> Self {
        Self { work, policy }
    }

    pub fn inner(&self) -> &W {
        &self.work
    }
}

#[async_trait]
impl<W: ScopedWork + 'static> Work for Scoped<W> {
    fn name(&self) -> &'static str {
        self.work.name()
    }

    async fn do_work(&self, members: &[StudentWithCurrentSemester]) -> WorkReport {
        run_scoped(&self.work, members, self.policy).await
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub async fn run_scoped<W: ScopedWork + ?Sized>(
    work: &W,
    members: &[StudentWithCurrentSemester],
    policy: VerificationPolicy,
) -> WorkReport {
    let mut report = WorkReport::new(work.name());
    for group in group_by_scope(work.scope(), members) {
        report.groups += 1;
        let Some(first) = group.members.first() else {
            continue;
        };

        let fetched = if policy.should_verify() {
            report.verified_groups += 1;
            verify_group(work, &group, &mut report).await
        } else {
            work.fetch_new_data(first).await
        };

        let data = match fetched {
            Ok(data) => data,
            Err(err) => {
                report.record_failure(&group.key, &first.student, err);
                continue;
            }
        };

        work.notify(&group.key, &data, &group.recipients()).await;
        match work.mark_notified(data).await {
            Ok(()) => report.notified_groups += 1,
            Err(err) => report.record_failure(&group.key, &first.student, err),
        }
    }

    tracing::debug!(
        work = report.work,
        groups = report.groups,
        verified = report.verified_groups,
        failures = report.failures.len(),
        "scoped work finished",
    );
    report
}

/// Fetch for every member and compare. Returns the first member's result;
/// failures of the other members are recorded but do not fail the group.
async fn verify_group<W: ScopedWork + ?Sized>(
    work: &W,
    group: &ScopeGroup,
    report: &mut WorkReport,
) -> Result<W::Data, SyncError> {
    let mut results: Vec<W::Data> = Vec::with_capacity(group.members.len());
    let mut first_error = None;

    for (index, member) in group.members.iter().enumerate() {
        match work.fetch_new_data(member).await {
            Ok(data) => results.push(data),
            Err(err) if index == 0 => first_error = Some(err),
            Err(err) => report.record_failure(&group.key, &member.student, err),
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let distinct_results = results
        .iter()
        .enumerate()
        .filter(|(i, data)| !results[..*i].iter().any(|seen| work.same_data(seen, data)))
        .count();
    if distinct_results > 1 {
        let anomaly = ConsistencyAnomaly {
            work: work.name(),
            scope: work.scope(),
            scope_key: group.key.clone(),
            members: group.members.len(),
            distinct_results,
        };
        tracing::error!(
            work = anomaly.work,
            scope = %anomaly.scope,
            scope_key = %anomaly.scope_key,
            members = anomaly.members,
            distinct_results,
            "data differs inside scope",
        );
        report.anomalies.push(anomaly);
    }

    results.into_iter().next().ok_or(SyncError::NoResult)
}
