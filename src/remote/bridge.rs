//! Queue-scoped view over a [`NotificationBackend`].
//!
//! Every mutation is a fetch-modify-write of the whole bucket configuration.
//! Entries whose queue differs from ours are carried through unchanged.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::RemoteError;
use crate::fingerprint::Fingerprint;
use crate::remote::backend::NotificationBackend;
use crate::remote::config::{NotificationConfiguration, QueueEntry};
use crate::rule::Rule;

/// Result of [`RemoteRegistryBridge::register_rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new entry was written.
    Registered,
    /// An entry with the same fingerprint already existed; nothing written.
    AlreadyPresent,
}

/// Result of [`RemoteRegistryBridge::bulk_set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSetOutcome {
    /// Our entries dropped before adding.
    pub cleared: usize,
    /// Entries appended.
    pub added: usize,
}

/// Remote rule registry restricted to one queue id.
#[derive(Clone)]
pub struct RemoteRegistryBridge {
    backend: Arc<dyn NotificationBackend>,
    queue_id: String,
}

impl std::fmt::Debug for RemoteRegistryBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRegistryBridge")
            .field("queue_id", &self.queue_id)
            .finish_non_exhaustive()
    }
}

impl RemoteRegistryBridge {
    /// Creates a bridge writing entries for `queue_id`.
    pub fn new(backend: Arc<dyn NotificationBackend>, queue_id: impl Into<String>) -> Self {
        Self {
            backend,
            queue_id: queue_id.into(),
        }
    }

    /// The queue id this bridge owns.
    #[must_use]
    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    fn fetch(&self, operation: &'static str, bucket: &str) -> Result<NotificationConfiguration, RemoteError> {
        self.backend
            .get_configuration(bucket)
            .map_err(|e| RemoteError::new(operation, Some(bucket), e))
    }

    fn store(
        &self,
        operation: &'static str,
        bucket: &str,
        config: &NotificationConfiguration,
    ) -> Result<(), RemoteError> {
        self.backend
            .set_configuration(bucket, config)
            .map_err(|e| RemoteError::new(operation, Some(bucket), e))
    }

    fn owned_fingerprints(&self, bucket: &str, config: &NotificationConfiguration) -> HashSet<Fingerprint> {
        config
            .entries_for(&self.queue_id)
            .map(|e| e.to_rule(bucket).fingerprint())
            .collect()
    }

    /// Rules registered for our queue on `bucket`, one per fingerprint.
    pub fn list_remote_rules(&self, bucket: &str) -> Result<Vec<Rule>, RemoteError> {
        let config = self.fetch("list_remote_rules", bucket)?;
        let mut seen = HashSet::new();
        Ok(config
            .entries_for(&self.queue_id)
            .map(|e| e.to_rule(bucket))
            .filter(|r| seen.insert(r.fingerprint()))
            .collect())
    }

    /// Add an entry for `rule` unless one with the same fingerprint exists.
    pub fn register_rule(&self, rule: &Rule) -> Result<RegisterOutcome, RemoteError> {
        let bucket = rule.bucket.as_str();
        let mut config = self.fetch("register_rule", bucket)?;

        if self.owned_fingerprints(bucket, &config).contains(&rule.fingerprint()) {
            debug!(bucket = %bucket, topic = %rule.topic(), "remote entry already present");
            return Ok(RegisterOutcome::AlreadyPresent);
        }

        config.queues.push(QueueEntry::for_rule(&self.queue_id, rule));
        self.store("register_rule", bucket, &config)?;
        debug!(bucket = %bucket, topic = %rule.topic(), "remote entry registered");
        Ok(RegisterOutcome::Registered)
    }

    /// Remove every entry of ours matching the rule's fingerprint.
    ///
    /// Returns the number of removed entries. Nothing matching is not an
    /// error, and no write is issued in that case.
    pub fn unregister_rule(&self, rule: &Rule) -> Result<usize, RemoteError> {
        let bucket = rule.bucket.as_str();
        let target = rule.fingerprint();
        let mut config = self.fetch("unregister_rule", bucket)?;

        let before = config.queues.len();
        config
            .queues
            .retain(|e| e.queue != self.queue_id || e.to_rule(bucket).fingerprint() != target);
        let removed = before - config.queues.len();

        if removed > 0 {
            self.store("unregister_rule", bucket, &config)?;
        }
        debug!(bucket = %bucket, topic = %rule.topic(), removed, "remote entries unregistered");
        Ok(removed)
    }

    /// Replace or extend our entries on `bucket` with `rules` in one write.
    ///
    /// With `clear_existing`, all of our entries are dropped first. Input
    /// rules are de-duplicated by fingerprint and only the ones missing
    /// remotely are appended.
    pub fn bulk_set(&self, bucket: &str, rules: &[Rule], clear_existing: bool) -> Result<BulkSetOutcome, RemoteError> {
        let mut config = self.fetch("bulk_set", bucket)?;
        let mut outcome = BulkSetOutcome::default();

        if clear_existing {
            let before = config.queues.len();
            config.queues.retain(|e| e.queue != self.queue_id);
            outcome.cleared = before - config.queues.len();
        }

        let mut present = self.owned_fingerprints(bucket, &config);
        for rule in rules {
            if present.insert(rule.fingerprint()) {
                config.queues.push(QueueEntry::for_rule(&self.queue_id, rule));
                outcome.added += 1;
            }
        }

        self.store("bulk_set", bucket, &config)?;
        debug!(
            bucket = %bucket,
            cleared = outcome.cleared,
            added = outcome.added,
            "remote entries bulk set"
        );
        Ok(outcome)
    }

    /// All bucket names known to the backend.
    pub fn list_buckets(&self) -> Result<Vec<String>, RemoteError> {
        self.backend
            .list_buckets()
            .map_err(|e| RemoteError::new("list_buckets", None, e))
    }

    /// Returns true if the backend knows `bucket`.
    pub fn has_bucket(&self, bucket: &str) -> Result<bool, RemoteError> {
        self.backend
            .bucket_exists(bucket)
            .map_err(|e| RemoteError::new("has_bucket", Some(bucket), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::InMemoryNotificationBackend;

    const QUEUE: &str = "arn:minio:sqs::bucketcast:mqtt";

    fn setup() -> (Arc<InMemoryNotificationBackend>, RemoteRegistryBridge) {
        let backend = Arc::new(InMemoryNotificationBackend::with_buckets(["photos"]));
        let bridge = RemoteRegistryBridge::new(backend.clone(), QUEUE);
        (backend, bridge)
    }

    fn put_rule(prefix: &str) -> Rule {
        Rule::new("photos", ["s3:ObjectCreated:Put"], prefix, "")
    }

    fn seed_foreign(backend: &InMemoryNotificationBackend) -> QueueEntry {
        let foreign = QueueEntry::for_rule("arn:other:queue", &put_rule("img/"));
        backend
            .set_configuration(
                "photos",
                &NotificationConfiguration {
                    queues: vec![foreign.clone()],
                },
            )
            .unwrap();
        foreign
    }

    #[test]
    fn register_is_idempotent() {
        let (backend, bridge) = setup();
        let rule = put_rule("img/");
        assert_eq!(bridge.register_rule(&rule).unwrap(), RegisterOutcome::Registered);
        assert_eq!(bridge.register_rule(&rule).unwrap(), RegisterOutcome::AlreadyPresent);

        let config = backend.configuration("photos").unwrap();
        assert_eq!(config.queues.len(), 1);
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn unregister_without_match_skips_write() {
        let (backend, bridge) = setup();
        assert_eq!(bridge.unregister_rule(&put_rule("img/")).unwrap(), 0);
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn unregister_removes_all_duplicates() {
        let (backend, bridge) = setup();
        let rule = put_rule("img/");
        let entry = QueueEntry::for_rule(QUEUE, &rule);
        backend
            .set_configuration(
                "photos",
                &NotificationConfiguration {
                    queues: vec![entry.clone(), entry],
                },
            )
            .unwrap();

        assert_eq!(bridge.unregister_rule(&rule).unwrap(), 2);
        assert!(backend.configuration("photos").unwrap().queues.is_empty());
    }

    #[test]
    fn foreign_queue_entries_are_never_touched() {
        let (backend, bridge) = setup();
        let foreign = seed_foreign(&backend);

        // Same fingerprint as the foreign entry, but it is not ours.
        assert!(bridge.list_remote_rules("photos").unwrap().is_empty());
        assert_eq!(bridge.register_rule(&put_rule("img/")).unwrap(), RegisterOutcome::Registered);
        bridge.unregister_rule(&put_rule("img/")).unwrap();
        bridge.bulk_set("photos", &[put_rule("a/")], true).unwrap();

        let config = backend.configuration("photos").unwrap();
        assert_eq!(config.queues[0], foreign);
        assert_eq!(config.entries_for(QUEUE).count(), 1);
    }

    #[test]
    fn bulk_set_dedups_input_and_skips_present() {
        let (backend, bridge) = setup();
        bridge.register_rule(&put_rule("a/")).unwrap();

        let outcome = bridge
            .bulk_set("photos", &[put_rule("a/"), put_rule("b/"), put_rule("b/")], false)
            .unwrap();
        assert_eq!(outcome, BulkSetOutcome { cleared: 0, added: 1 });
        assert_eq!(backend.configuration("photos").unwrap().queues.len(), 2);
    }

    #[test]
    fn bulk_set_clear_replaces_our_entries() {
        let (_backend, bridge) = setup();
        bridge.register_rule(&put_rule("a/")).unwrap();
        bridge.register_rule(&put_rule("b/")).unwrap();

        let outcome = bridge.bulk_set("photos", &[put_rule("c/")], true).unwrap();
        assert_eq!(outcome, BulkSetOutcome { cleared: 2, added: 1 });
        let remote = bridge.list_remote_rules("photos").unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].prefix, "c/");
    }

    #[test]
    fn backend_failures_become_remote_errors() {
        let (backend, bridge) = setup();
        backend.set_unavailable(true);
        let err = bridge.register_rule(&put_rule("")).unwrap_err();
        assert_eq!(err.operation(), "register_rule");
        assert_eq!(err.bucket(), Some("photos"));
        assert!(err.is_retryable());

        let err = bridge.list_buckets().unwrap_err();
        assert_eq!(err.bucket(), None);
    }

    #[test]
    fn unknown_bucket_is_remote_error() {
        let (_backend, bridge) = setup();
        assert!(!bridge.has_bucket("videos").unwrap());
        assert!(bridge.list_remote_rules("videos").is_err());
    }
}
