//! Presentation-side notification sink.
//!
//! Works build a [`Notification`] per group and hand it to a [`Notifier`]
//! together with the scope key and every account in the group. Delivery is
//! fire-and-forget: a notifier never reports failure back to the sync run.

use std::sync::Mutex;

use async_trait::async_trait;

use schoolsync_core::{NotificationType, Student};

/// One grouped notification: a summary line plus one line per new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationType,
    pub title: String,
    pub lines: Vec<String>,
}

impl Notification {
    pub fn new(kind: NotificationType, title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            lines,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.kind.channel()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification, scope_key: &str, recipients: &[Student]);

    /// The remote API wants a CAPTCHA solved for `student` before it answers.
    async fn notify_captcha_required(&self, student: &Student, url: &str);
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// Writes notifications to the log. Used when no presentation layer is
/// attached (headless runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification, scope_key: &str, recipients: &[Student]) {
        let names: Vec<&str> = recipients.iter().map(|s| s.user_name.as_str()).collect();
        tracing::info!(
            channel = notification.channel(),
            scope = %notification.kind.scope(),
            scope_key,
            recipients = ?names,
            items = notification.lines.len(),
            "{}",
            notification.title,
        );
        for line in &notification.lines {
            tracing::debug!(channel = notification.channel(), "{line}");
        }
    }

    async fn notify_captcha_required(&self, student: &Student, url: &str) {
        tracing::warn!(
            account = %student.user_name,
            url,
            "captcha required, open the register in a browser to continue syncing",
        );
    }
}

/// What a [`RecordingNotifier`] received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Notification {
        notification: Notification,
        scope_key: String,
        recipients: Vec<String>,
    },
    CaptchaRequired {
        account: String,
        url: String,
    },
}

/// Keeps every delivery in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Delivered>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.lock().clone()
    }

    /// Notifications only, without CAPTCHA prompts.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter_map(|d| match d {
                Delivered::Notification { notification, .. } => Some(notification.clone()),
                Delivered::CaptchaRequired { .. } => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Delivered>> {
        self.delivered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification, scope_key: &str, recipients: &[Student]) {
        self.lock().push(Delivered::Notification {
            notification: notification.clone(),
            scope_key: scope_key.to_string(),
            recipients: recipients.iter().map(|s| s.user_name.clone()).collect(),
        });
    }

    async fn notify_captcha_required(&self, student: &Student, url: &str) {
        self.lock().push(Delivered::CaptchaRequired {
            account: student.user_name.clone(),
            url: url.to_string(),
        });
    }
}

/// `"1 new grade"` / `"3 new grades"`.
pub(crate) fn count_title(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 new {singular}")
    } else {
        format!("{count} new {plural}")
    }
}

#[cfg(test)]
mod tests {
    use schoolsync_core::StudentId;

    use super::*;

    #[test]
    fn count_title_picks_plural() {
        assert_eq!(count_title(1, "exam", "exams"), "1 new exam");
        assert_eq!(count_title(4, "exam", "exams"), "4 new exams");
    }

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let student = Student {
            id: 1,
            user_login_id: 1,
            student_id: StudentId(1),
            user_name: "parent".into(),
            student_name: "Jan".into(),
            school_name: "SP 1".into(),
            class_name: "b".into(),
            registration_date: chrono::Utc::now(),
            is_parent: true,
        };
        let exam = Notification::new(NotificationType::NewExam, "1 new exam", vec!["Math".into()]);

        notifier.notify(&exam, "3b", std::slice::from_ref(&student)).await;
        notifier.notify_captcha_required(&student, "https://example.test").await;

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(notifier.notifications(), vec![exam]);
        assert!(matches!(&delivered[1], Delivered::CaptchaRequired { account, .. } if account == "parent"));
    }
}
