//! Error types for schoolsync-sync.
//!
//! `SyncError` is `Clone` because one failure is delivered to every
//! subscriber waiting on the same fetch; wrapped foreign errors are kept
//! behind `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use schoolsync_core::ConfigError;

/// Why the remote API refused the account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("account is not logged in")]
    NotLoggedIn,

    #[error("password change required")]
    PasswordChangeRequired,

    /// The API wants a human to solve a CAPTCHA at `url` before it answers.
    #[error("captcha verification required at {url}")]
    CaptchaRequired { url: String },
}

/// All errors that can arise from cache/sync operations.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Connectivity failure or timeout talking to the remote API.
    #[error("network error: {message}")]
    Network { message: String },

    /// Expired or invalid credentials, or a CAPTCHA challenge.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthFailure),

    /// The remote API answered with an unexpected shape.
    #[error("unexpected remote response: {0}")]
    Parse(String),

    /// The school disabled the feature for this account.
    #[error("feature disabled by the school: {0}")]
    FeatureDisabled(String),

    /// The local store rejected a write.
    #[error("local store error: {0}")]
    LocalStore(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// JSON serialization/deserialization error (timestamp store).
    #[error("timestamp store JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    #[error("config error: {0}")]
    Config(#[source] Arc<ConfigError>),

    /// A spawned fetch task panicked or was aborted.
    #[error("sync task failed: {0}")]
    TaskJoin(String),

    /// A resource stream finished without a terminal item.
    #[error("resource stream ended without a result")]
    NoResult,
}

impl SyncError {
    pub fn network(message: impl Into<String>) -> Self {
        SyncError::Network {
            message: message.into(),
        }
    }

    /// Whether the failure is worth a diagnostic report.
    ///
    /// Connectivity problems and school-side feature toggles are part of
    /// normal operation and are not.
    pub fn is_should_be_reported(&self) -> bool {
        !matches!(
            self,
            SyncError::Network { .. } | SyncError::FeatureDisabled(_)
        )
    }

    /// CAPTCHA url when the API demands one.
    pub fn captcha_url(&self) -> Option<&str> {
        match self {
            SyncError::Auth(AuthFailure::CaptchaRequired { url }) => Some(url),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Json(Arc::new(err))
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        SyncError::Config(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::TaskJoin(err.to_string())
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source: Arc::new(source),
    }
}
