//! Raw access to per-bucket notification configurations.

use thiserror::Error;

use crate::remote::config::NotificationConfiguration;

/// Failures reported by a notification backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Credentials were rejected.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The stored configuration could not be decoded.
    #[error("malformed notification configuration: {0}")]
    MalformedConfiguration(String),

    /// The bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Returns true if the same call may succeed later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Whole-document access to bucket notification configurations.
///
/// `set_configuration` replaces the full configuration of a bucket. There is
/// no compare-and-swap: concurrent writers race and the last write wins.
pub trait NotificationBackend: Send + Sync {
    /// Names of all buckets.
    fn list_buckets(&self) -> Result<Vec<String>, BackendError>;

    /// Returns true if `bucket` exists.
    fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError>;

    /// Current notification configuration of `bucket`.
    fn get_configuration(&self, bucket: &str) -> Result<NotificationConfiguration, BackendError>;

    /// Replace the notification configuration of `bucket`.
    fn set_configuration(&self, bucket: &str, config: &NotificationConfiguration) -> Result<(), BackendError>;
}
