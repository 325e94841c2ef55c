//! Administrative notification service.
//!
//! Owns the rule write path: validation, bucket check, store, then the
//! reconciler hooks (register after create, unregister before delete).

use std::sync::Arc;

use tracing::info;

use crate::error::{NotifyError, NotifyResult};
use crate::event_type::EventType;
use crate::reconciler::{BucketSyncSummary, Reconciler};
use crate::remote::{NotificationBackend, RemoteRegistryBridge};
use crate::rule::{Origin, PersistedRule, Rule, RuleId};
use crate::storage::{InMemoryRuleStore, RuleStore, StorageError};

/// Rule administration and sync entry points.
#[derive(Clone)]
pub struct NotificationService {
    rules: Arc<dyn RuleStore>,
    reconciler: Reconciler,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl NotificationService {
    /// Create a service over the given store and remote backend.
    pub fn new(rules: Arc<dyn RuleStore>, backend: Arc<dyn NotificationBackend>, queue_id: impl Into<String>) -> Self {
        let bridge = RemoteRegistryBridge::new(backend, queue_id);
        let reconciler = Reconciler::new(Arc::clone(&rules), bridge);
        Self { rules, reconciler }
    }

    /// Create a service with a fresh in-memory rule store.
    pub fn in_memory(backend: Arc<dyn NotificationBackend>, queue_id: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemoryRuleStore::new()), backend, queue_id)
    }

    /// The rule store, shared with the router.
    #[must_use]
    pub fn rule_store(&self) -> Arc<dyn RuleStore> {
        Arc::clone(&self.rules)
    }

    /// The reconciler behind the sync operations.
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Validate, store and remotely register a new rule.
    ///
    /// A remote registration failure does not fail the call; the rule is
    /// stored and the failure is logged.
    pub fn add_rule(&self, rule: Rule, actor: Option<&str>) -> NotifyResult<PersistedRule> {
        rule.validate()?;
        if !self.reconciler.bridge().has_bucket(&rule.bucket)? {
            return Err(NotifyError::NoSuchBucket { bucket: rule.bucket });
        }

        let persisted = self.rules.create(rule, Origin::Local, actor)?;
        self.reconciler.on_rule_created(&persisted);
        info!(
            bucket = %persisted.bucket(),
            rule_id = %persisted.id,
            topic = %persisted.topic(),
            "rule added"
        );
        Ok(persisted)
    }

    /// Fetch one rule.
    pub fn get_rule(&self, bucket: &str, id: RuleId) -> NotifyResult<PersistedRule> {
        self.rules
            .get(bucket, id)?
            .ok_or_else(|| NotifyError::NoSuchRule {
                bucket: bucket.to_string(),
                id,
            })
    }

    /// Unregister (when last of its fingerprint) and delete a rule.
    pub fn delete_rule(&self, bucket: &str, id: RuleId) -> NotifyResult<PersistedRule> {
        let rule = self.get_rule(bucket, id)?;
        self.reconciler.on_rule_deleted(&rule);

        let removed = self.rules.delete(bucket, id).map_err(|e| match e {
            StorageError::RuleNotFound(id) => NotifyError::NoSuchRule {
                bucket: bucket.to_string(),
                id,
            },
            other => other.into(),
        })?;
        info!(bucket = %bucket, rule_id = %id, "rule deleted");
        Ok(removed)
    }

    /// Rules of `bucket`, in creation order.
    pub fn list_rules(&self, bucket: &str) -> NotifyResult<Vec<PersistedRule>> {
        Ok(self.rules.list_by_bucket(bucket)?)
    }

    /// Number of rules in `bucket`.
    pub fn count_rules(&self, bucket: &str) -> NotifyResult<usize> {
        Ok(self.rules.count_by_bucket(bucket)?)
    }

    /// See [`Reconciler::export_bucket`].
    pub fn export_bucket(&self, bucket: &str, clear_remote: bool) -> NotifyResult<Vec<PersistedRule>> {
        self.reconciler.export_bucket(bucket, clear_remote)
    }

    /// See [`Reconciler::import_bucket`].
    pub fn import_bucket(&self, bucket: &str, clear_local: bool) -> NotifyResult<Vec<PersistedRule>> {
        self.reconciler.import_bucket(bucket, clear_local)
    }

    /// See [`Reconciler::export_all`].
    pub fn export_all(&self, clear_remote: bool) -> NotifyResult<Vec<BucketSyncSummary>> {
        self.reconciler.export_all(clear_remote)
    }

    /// See [`Reconciler::import_all`].
    pub fn import_all(&self, clear_local: bool) -> NotifyResult<Vec<BucketSyncSummary>> {
        self.reconciler.import_all(clear_local)
    }

    /// Names accepted in a rule's action set.
    #[must_use]
    pub fn list_known_action_types(&self) -> Vec<&'static str> {
        EventType::known_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryNotificationBackend;

    fn service() -> (Arc<InMemoryNotificationBackend>, NotificationService) {
        let backend = Arc::new(InMemoryNotificationBackend::with_buckets(["photos"]));
        let service = NotificationService::in_memory(backend.clone(), "q");
        (backend, service)
    }

    fn put(prefix: &str) -> Rule {
        Rule::new("photos", ["s3:ObjectCreated:Put"], prefix, "")
    }

    #[test]
    fn add_rule_registers_remotely() {
        let (backend, service) = service();
        let rule = service.add_rule(put("img/"), Some("alice")).unwrap();
        assert_eq!(rule.origin, Origin::Local);
        assert_eq!(backend.configuration("photos").unwrap().queues.len(), 1);
    }

    #[test]
    fn invalid_rule_never_reaches_backend() {
        let (backend, service) = service();
        let err = service
            .add_rule(Rule::new("photos", Vec::<String>::new(), "", ""), None)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.write_count(), 0);
        assert_eq!(service.count_rules("photos").unwrap(), 0);
    }

    #[test]
    fn unknown_bucket_is_rejected() {
        let (_backend, service) = service();
        let err = service
            .add_rule(Rule::new("videos", ["s3:ObjectCreated:Put"], "", ""), None)
            .unwrap_err();
        assert!(matches!(err, NotifyError::NoSuchBucket { bucket } if bucket == "videos"));
    }

    #[test]
    fn add_rule_survives_remote_outage_after_bucket_check() {
        let (backend, service) = service();
        let rule = service.add_rule(put("a/"), None).unwrap();
        backend.set_unavailable(true);
        // Bucket check hits the backend, so the outage surfaces here.
        assert!(service.add_rule(put("b/"), None).unwrap_err().is_remote());
        backend.set_unavailable(false);
        assert_eq!(service.get_rule("photos", rule.id).unwrap().id, rule.id);
    }

    #[test]
    fn get_and_delete_are_bucket_scoped() {
        let (_backend, service) = service();
        let rule = service.add_rule(put("img/"), None).unwrap();
        assert!(service.get_rule("videos", rule.id).unwrap_err().is_not_found());
        assert!(service.delete_rule("videos", rule.id).unwrap_err().is_not_found());
        assert_eq!(service.delete_rule("photos", rule.id).unwrap().id, rule.id);
        assert!(service.get_rule("photos", rule.id).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_unregisters_remote_entry() {
        let (backend, service) = service();
        let rule = service.add_rule(put("img/"), None).unwrap();
        service.delete_rule("photos", rule.id).unwrap();
        assert!(backend.configuration("photos").unwrap().queues.is_empty());
    }

    #[test]
    fn delete_survives_remote_outage() {
        let (backend, service) = service();
        let rule = service.add_rule(put("img/"), None).unwrap();
        backend.set_unavailable(true);
        service.delete_rule("photos", rule.id).unwrap();
        assert_eq!(service.count_rules("photos").unwrap(), 0);
    }

    #[test]
    fn known_action_types_are_listed() {
        let (_backend, service) = service();
        let names = service.list_known_action_types();
        assert!(names.contains(&"s3:ObjectCreated:Put"));
        assert!(names.contains(&"s3:ObjectRemoved:*"));
    }
}
