//! In-memory storage backend.
//!
//! Thread-safe implementation of [`RuleStore`] for embedded usage and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::rule::{AuditInfo, Origin, PersistedRule, Rule, RuleId};
use crate::storage::traits::{RuleStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct RuleState {
    by_id: HashMap<RuleId, PersistedRule>,
    // Creation order per bucket.
    by_bucket: HashMap<String, Vec<RuleId>>,
}

/// In-memory rule store.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    state: RwLock<RuleState>,
}

impl InMemoryRuleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rules across all buckets.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("rules.read"))?;
        Ok(state.by_id.len())
    }

    /// Returns true when no rule is stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl RuleStore for InMemoryRuleStore {
    fn create(&self, rule: Rule, origin: Origin, actor: Option<&str>) -> Result<PersistedRule, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("rules.write"))?;

        let id = RuleId::new();
        if state.by_id.contains_key(&id) {
            return Err(StorageError::DuplicateKey(id.to_string()));
        }

        let persisted = PersistedRule {
            id,
            rule,
            origin,
            audit: AuditInfo::created_now(actor),
        };
        state
            .by_bucket
            .entry(persisted.rule.bucket.clone())
            .or_default()
            .push(id);
        state.by_id.insert(id, persisted.clone());
        Ok(persisted)
    }

    fn get(&self, bucket: &str, id: RuleId) -> Result<Option<PersistedRule>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("rules.read"))?;
        Ok(state
            .by_id
            .get(&id)
            .filter(|r| r.bucket() == bucket)
            .cloned())
    }

    fn delete(&self, bucket: &str, id: RuleId) -> Result<PersistedRule, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("rules.write"))?;

        match state.by_id.get(&id) {
            Some(r) if r.bucket() == bucket => {}
            _ => return Err(StorageError::RuleNotFound(id)),
        }

        let removed = state
            .by_id
            .remove(&id)
            .ok_or(StorageError::RuleNotFound(id))?;
        if let Some(ids) = state.by_bucket.get_mut(bucket) {
            ids.retain(|x| *x != id);
            if ids.is_empty() {
                state.by_bucket.remove(bucket);
            }
        }
        Ok(removed)
    }

    fn list_by_bucket(&self, bucket: &str) -> Result<Vec<PersistedRule>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("rules.read"))?;
        let Some(ids) = state.by_bucket.get(bucket) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.by_id.get(id))
            .cloned()
            .collect())
    }

    fn count_by_bucket(&self, bucket: &str) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("rules.read"))?;
        Ok(state.by_bucket.get(bucket).map_or(0, Vec::len))
    }

    fn delete_by_bucket(&self, bucket: &str) -> Result<Vec<PersistedRule>, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("rules.write"))?;
        let Some(ids) = state.by_bucket.remove(bucket) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .into_iter()
            .filter_map(|id| state.by_id.remove(&id))
            .collect())
    }
}
