//! Local/remote rule reconciliation.
//!
//! The reconciler moves rules between the local [`RuleStore`] and the remote
//! registry, and carries the post-create / pre-delete hooks of the service
//! write path.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::NotifyResult;
use crate::remote::RemoteRegistryBridge;
use crate::rule::{Origin, PersistedRule, Rule};
use crate::storage::RuleStore;

/// What a sync did to one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSyncSummary {
    /// Bucket name.
    pub bucket: String,
    /// Rules exported to, or imported from, the remote registry.
    pub rules: usize,
    /// Entries (export) or local rules (import) cleared first.
    pub cleared: usize,
}

/// Keeps the local rule store and the remote registry in step.
#[derive(Clone)]
pub struct Reconciler {
    rules: Arc<dyn RuleStore>,
    bridge: RemoteRegistryBridge,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler over `rules` and `bridge`.
    pub fn new(rules: Arc<dyn RuleStore>, bridge: RemoteRegistryBridge) -> Self {
        Self { rules, bridge }
    }

    /// The remote bridge.
    #[must_use]
    pub const fn bridge(&self) -> &RemoteRegistryBridge {
        &self.bridge
    }

    /// Push local rules of `bucket` to the remote registry.
    ///
    /// Returns the local rules unchanged.
    pub fn export_bucket(&self, bucket: &str, clear_remote: bool) -> NotifyResult<Vec<PersistedRule>> {
        Ok(self.export_bucket_inner(bucket, clear_remote)?.0)
    }

    fn export_bucket_inner(
        &self,
        bucket: &str,
        clear_remote: bool,
    ) -> NotifyResult<(Vec<PersistedRule>, BucketSyncSummary)> {
        let local = self.rules.list_by_bucket(bucket)?;
        let rules: Vec<Rule> = local.iter().map(|r| r.rule.clone()).collect();
        let outcome = self.bridge.bulk_set(bucket, &rules, clear_remote)?;

        info!(
            bucket = %bucket,
            local = local.len(),
            added = outcome.added,
            cleared = outcome.cleared,
            "exported bucket rules"
        );
        let summary = BucketSyncSummary {
            bucket: bucket.to_string(),
            rules: local.len(),
            cleared: outcome.cleared,
        };
        Ok((local, summary))
    }

    /// Materialize remote rules of `bucket` missing locally.
    ///
    /// With `clear_local`, local rules of the bucket are deleted first, without
    /// touching the remote registry. Returns only the newly imported rules, so
    /// a second call with nothing changed returns an empty list.
    pub fn import_bucket(&self, bucket: &str, clear_local: bool) -> NotifyResult<Vec<PersistedRule>> {
        Ok(self.import_bucket_inner(bucket, clear_local)?.0)
    }

    fn import_bucket_inner(
        &self,
        bucket: &str,
        clear_local: bool,
    ) -> NotifyResult<(Vec<PersistedRule>, BucketSyncSummary)> {
        let cleared = if clear_local {
            self.rules.delete_by_bucket(bucket)?.len()
        } else {
            0
        };

        let mut known: HashSet<_> = self
            .rules
            .list_by_bucket(bucket)?
            .iter()
            .map(PersistedRule::fingerprint)
            .collect();

        let mut imported = Vec::new();
        for rule in self.bridge.list_remote_rules(bucket)? {
            if !known.insert(rule.fingerprint()) {
                continue;
            }
            if let Err(err) = rule.validate() {
                warn!(bucket = %bucket, error = %err, "skipping invalid remote rule");
                continue;
            }
            imported.push(self.rules.create(rule, Origin::Imported, None)?);
        }

        info!(
            bucket = %bucket,
            imported = imported.len(),
            cleared,
            "imported bucket rules"
        );
        let summary = BucketSyncSummary {
            bucket: bucket.to_string(),
            rules: imported.len(),
            cleared,
        };
        Ok((imported, summary))
    }

    /// [`export_bucket`](Self::export_bucket) for every backend bucket.
    ///
    /// The first failing bucket aborts the batch.
    pub fn export_all(&self, clear_remote: bool) -> NotifyResult<Vec<BucketSyncSummary>> {
        let mut summaries = Vec::new();
        for bucket in self.bridge.list_buckets()? {
            summaries.push(self.export_bucket_inner(&bucket, clear_remote)?.1);
        }
        Ok(summaries)
    }

    /// [`import_bucket`](Self::import_bucket) for every backend bucket.
    ///
    /// The first failing bucket aborts the batch.
    pub fn import_all(&self, clear_local: bool) -> NotifyResult<Vec<BucketSyncSummary>> {
        let mut summaries = Vec::new();
        for bucket in self.bridge.list_buckets()? {
            summaries.push(self.import_bucket_inner(&bucket, clear_local)?.1);
        }
        Ok(summaries)
    }

    /// Post-create hook: register locally created rules remotely.
    ///
    /// Imported rules are never pushed back. Remote failures are logged and
    /// swallowed; the local rule stays.
    pub fn on_rule_created(&self, rule: &PersistedRule) {
        if rule.origin != Origin::Local {
            return;
        }
        if let Err(err) = self.bridge.register_rule(&rule.rule) {
            warn!(
                bucket = %rule.bucket(),
                rule_id = %rule.id,
                error = %err,
                "remote registration failed"
            );
        }
    }

    /// Pre-delete hook: unregister the remote entry if `rule` is the last
    /// local rule carrying its fingerprint.
    ///
    /// The count includes `rule` itself, which is still stored at this point.
    /// Failures are logged and swallowed.
    pub fn on_rule_deleted(&self, rule: &PersistedRule) {
        let target = rule.fingerprint();
        let sharers = match self.rules.list_by_bucket(rule.bucket()) {
            Ok(local) => local.iter().filter(|r| r.fingerprint() == target).count(),
            Err(err) => {
                warn!(
                    bucket = %rule.bucket(),
                    rule_id = %rule.id,
                    error = %err,
                    "could not count fingerprint sharers; remote entry kept"
                );
                return;
            }
        };

        if sharers > 1 {
            debug!(bucket = %rule.bucket(), sharers, "fingerprint still shared; remote entry kept");
            return;
        }
        if let Err(err) = self.bridge.unregister_rule(&rule.rule) {
            warn!(
                bucket = %rule.bucket(),
                rule_id = %rule.id,
                error = %err,
                "remote unregistration failed"
            );
        }
    }
}
