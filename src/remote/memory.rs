//! In-memory notification backend.
//!
//! Stands in for the object store in embedded mode and tests. It can be put
//! into an unavailable state to exercise remote failure paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use crate::remote::backend::{BackendError, NotificationBackend};
use crate::remote::config::NotificationConfiguration;

fn lock_err(context: &'static str) -> BackendError {
    BackendError::Other(format!("poisoned lock: {context}"))
}

/// In-memory notification backend keyed by bucket name.
#[derive(Debug, Default)]
pub struct InMemoryNotificationBackend {
    buckets: RwLock<BTreeMap<String, NotificationConfiguration>>,
    writes: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryNotificationBackend {
    /// Create a backend with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend holding the given empty buckets.
    #[must_use]
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map = buckets
            .into_iter()
            .map(|b| (b.into(), NotificationConfiguration::default()))
            .collect();
        Self {
            buckets: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Snapshot of the stored configuration, bypassing availability.
    pub fn configuration(&self, bucket: &str) -> Option<NotificationConfiguration> {
        self.buckets.read().ok()?.get(bucket).cloned()
    }

    /// Number of successful `set_configuration` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Make every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(BackendError::Connection("backend unavailable".to_string()));
        }
        Ok(())
    }
}

impl NotificationBackend for InMemoryNotificationBackend {
    fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        self.check_available()?;
        let buckets = self.buckets.read().map_err(|_| lock_err("buckets.read"))?;
        Ok(buckets.keys().cloned().collect())
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError> {
        self.check_available()?;
        let buckets = self.buckets.read().map_err(|_| lock_err("buckets.read"))?;
        Ok(buckets.contains_key(bucket))
    }

    fn get_configuration(&self, bucket: &str) -> Result<NotificationConfiguration, BackendError> {
        self.check_available()?;
        let buckets = self.buckets.read().map_err(|_| lock_err("buckets.read"))?;
        buckets
            .get(bucket)
            .cloned()
            .ok_or_else(|| BackendError::BucketNotFound(bucket.to_string()))
    }

    fn set_configuration(&self, bucket: &str, config: &NotificationConfiguration) -> Result<(), BackendError> {
        self.check_available()?;
        let mut buckets = self.buckets.write().map_err(|_| lock_err("buckets.write"))?;
        let slot = buckets
            .get_mut(bucket)
            .ok_or_else(|| BackendError::BucketNotFound(bucket.to_string()))?;
        *slot = config.clone();
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::config::QueueEntry;
    use crate::rule::Rule;

    #[test]
    fn buckets_are_listed_sorted() {
        let backend = InMemoryNotificationBackend::with_buckets(["videos", "photos", "audio"]);
        assert_eq!(backend.list_buckets().unwrap(), vec!["audio", "photos", "videos"]);
        assert!(backend.bucket_exists("photos").unwrap());
        assert!(!backend.bucket_exists("docs").unwrap());
    }

    #[test]
    fn set_replaces_whole_configuration() {
        let backend = InMemoryNotificationBackend::with_buckets(["photos"]);
        let rule = Rule::new("photos", ["s3:ObjectCreated:Put"], "", "");
        let config = NotificationConfiguration {
            queues: vec![QueueEntry::for_rule("q", &rule)],
        };
        backend.set_configuration("photos", &config).unwrap();
        assert_eq!(backend.get_configuration("photos").unwrap(), config);
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn unknown_bucket_is_an_error() {
        let backend = InMemoryNotificationBackend::new();
        assert!(matches!(
            backend.get_configuration("photos"),
            Err(BackendError::BucketNotFound(_))
        ));
    }

    #[test]
    fn unavailable_backend_fails_every_call() {
        let backend = InMemoryNotificationBackend::with_buckets(["photos"]);
        backend.set_unavailable(true);
        assert!(backend.list_buckets().unwrap_err().is_transient());
        assert!(backend.get_configuration("photos").is_err());
        backend.set_unavailable(false);
        assert!(backend.get_configuration("photos").is_ok());
    }
}
