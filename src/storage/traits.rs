//! Abstract rule storage.
//!
//! Implementations own id generation and audit fields. Every lookup is scoped
//! by bucket: asking for a rule id under the wrong bucket behaves exactly like
//! asking for an unknown id.

use thiserror::Error;

use crate::rule::{Origin, PersistedRule, Rule, RuleId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Rule not found (or found under another bucket).
    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Storage trait for rule descriptions, keyed by bucket.
///
/// # Concurrency
/// Implementations must be safe for concurrent readers and writers. Reads
/// are snapshots; no isolation is promised across separate calls.
pub trait RuleStore: Send + Sync {
    /// Persist a new rule, assigning its id and audit fields.
    fn create(&self, rule: Rule, origin: Origin, actor: Option<&str>) -> Result<PersistedRule, StorageError>;

    /// Get a rule by bucket and id.
    fn get(&self, bucket: &str, id: RuleId) -> Result<Option<PersistedRule>, StorageError>;

    /// Delete a rule by bucket and id, returning it. Returns error if not found.
    fn delete(&self, bucket: &str, id: RuleId) -> Result<PersistedRule, StorageError>;

    /// All rules of a bucket, in creation order.
    fn list_by_bucket(&self, bucket: &str) -> Result<Vec<PersistedRule>, StorageError>;

    /// Number of rules in a bucket.
    fn count_by_bucket(&self, bucket: &str) -> Result<usize, StorageError>;

    /// Remove every rule of a bucket, returning what was removed.
    fn delete_by_bucket(&self, bucket: &str) -> Result<Vec<PersistedRule>, StorageError>;
}
