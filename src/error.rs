//! Error types for bucketcast.
//!
//! All errors are strongly typed using thiserror, one enum per concern plus
//! the top-level [`NotifyError`]. Remote backend failures are always wrapped
//! into a single [`RemoteError`] that carries the underlying cause.

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::BackendError;
use crate::rule::RuleId;
use crate::storage::StorageError;

/// Validation errors raised before any store or remote call.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("A rule needs at least one action")]
    EmptyActions,

    #[error("Unknown event type '{action}'")]
    UnknownAction {
        action: String,
    },

    #[error("Invalid bucket name '{bucket}': {reason}")]
    InvalidBucketName {
        bucket: String,
        reason: String,
    },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong {
        field: String,
        max_length: usize,
    },

    #[error("Invalid command: {reason}")]
    InvalidCommand {
        reason: String,
    },
}

/// Failure talking to the remote notification backend.
///
/// Carries the operation, the bucket when known, and the backend cause.
#[derive(Debug, Error)]
#[error("Remote {operation} failed{}: {source}", bucket_suffix(.bucket))]
pub struct RemoteError {
    operation: &'static str,
    bucket: Option<String>,
    #[source]
    source: BackendError,
}

fn bucket_suffix(bucket: &Option<String>) -> String {
    bucket
        .as_ref()
        .map(|b| format!(" for bucket '{b}'"))
        .unwrap_or_default()
}

impl RemoteError {
    /// Wraps a backend failure for an operation on `bucket`.
    #[must_use]
    pub fn new(operation: &'static str, bucket: Option<&str>, source: BackendError) -> Self {
        Self {
            operation,
            bucket: bucket.map(str::to_string),
            source,
        }
    }

    /// Name of the bridge operation that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Bucket the operation targeted, if any.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// The underlying backend failure.
    #[must_use]
    pub const fn cause(&self) -> &BackendError {
        &self.source
    }

    /// Returns true if the backend failure is transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.source.is_transient()
    }
}

/// Message transport errors (publish/subscribe and inbound payloads).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport disconnected: {reason}")]
    Disconnected {
        reason: String,
    },

    #[error("Publish to '{destination}' timed out after {timeout_ms}ms")]
    Timeout {
        destination: String,
        timeout_ms: u64,
    },

    #[error("Publish to '{destination}' failed: {message}")]
    PublishFailed {
        destination: String,
        message: String,
    },

    #[error("Subscribe to '{topic}' failed: {message}")]
    SubscribeFailed {
        topic: String,
        message: String,
    },

    #[error("Malformed inbound payload: {message}")]
    MalformedPayload {
        message: String,
    },
}

/// Top-level error type for bucketcast.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] ValidationError),

    #[error("No such bucket: {bucket}")]
    NoSuchBucket {
        bucket: String,
    },

    #[error("No such rule {id} in bucket '{bucket}'")]
    NoSuchRule {
        bucket: String,
        id: RuleId,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl NotifyError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the request itself was invalid.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRule(_))
    }

    /// Returns true for unknown buckets or rules.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. } | Self::NoSuchRule { .. })
    }

    /// Returns true if the remote backend failed.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Returns true if re-running the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            Self::Transport(e) => matches!(
                e,
                TransportError::Disconnected { .. } | TransportError::Timeout { .. }
            ),
            _ => false,
        }
    }
}

/// Result type alias for bucketcast operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_unknown_action() {
        let err = ValidationError::UnknownAction {
            action: "s3:Nope".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("s3:Nope"));
    }

    #[test]
    fn test_remote_error_carries_cause_and_bucket() {
        let err = RemoteError::new(
            "register_rule",
            Some("photos"),
            BackendError::Connection("refused".to_string()),
        );
        let msg = format!("{err}");
        assert!(msg.contains("register_rule"));
        assert!(msg.contains("photos"));
        assert!(msg.contains("refused"));
        assert_eq!(err.bucket(), Some("photos"));
        assert!(err.is_retryable());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_remote_error_without_bucket() {
        let err = RemoteError::new(
            "list_buckets",
            None,
            BackendError::AccessDenied("bad key".to_string()),
        );
        let msg = format!("{err}");
        assert!(!msg.contains("for bucket"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_notify_error_from_validation() {
        let err: NotifyError = ValidationError::EmptyActions.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_notify_error_not_found() {
        let err = NotifyError::NoSuchRule {
            bucket: "photos".to_string(),
            id: RuleId::new(),
        };
        assert!(err.is_not_found());
        let err = NotifyError::NoSuchBucket {
            bucket: "photos".to_string(),
        };
        assert!(err.to_string().contains("photos"));
    }

    #[test]
    fn test_notify_error_transport_retryable() {
        let err: NotifyError = TransportError::Timeout {
            destination: "bucketcast/photos/ev-00".to_string(),
            timeout_ms: 500,
        }
        .into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("500ms"));

        let err: NotifyError = TransportError::MalformedPayload {
            message: "not json".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_notify_error_internal() {
        let err = NotifyError::internal("worker spawn failed");
        assert!(err.to_string().contains("worker spawn failed"));
    }
}
