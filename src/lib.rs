//! # bucketcast - bucket notification fan-out
//!
//! An object store emits bucket events to a single queue. bucketcast keeps a
//! set of fine-grained rules (bucket, actions, key prefix/suffix), registers
//! them with the store's notification configuration, and re-publishes every
//! incoming event to one topic per matching rule.
//!
//! ## Core Concepts
//!
//! - **Rule**: interest in events of one bucket, filtered by action and key
//! - **Fingerprint**: the canonical identity of a rule, also its topic segment
//! - **Bridge**: the queue-scoped view over remote notification configurations
//! - **Reconciler**: export/import between the local store and the remote registry
//! - **Router**: per-record matching and de-duplicated delivery
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bucketcast::remote::InMemoryNotificationBackend;
//! use bucketcast::{NotificationService, Rule};
//!
//! let backend = Arc::new(InMemoryNotificationBackend::with_buckets(["photos"]));
//! let service = NotificationService::in_memory(backend, "arn:minio:sqs::bucketcast:mqtt");
//!
//! let rule = service
//!     .add_rule(Rule::new("photos", ["s3:ObjectCreated:Put"], "img/", ".jpg"), None)
//!     .unwrap();
//! assert!(rule.topic().starts_with("photos/ev-"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod event_type;
pub mod fingerprint;
pub mod rule;

// Storage and remote registry
pub mod remote;
pub mod storage;

// Sync and administration
pub mod admin;
pub mod config;
pub mod reconciler;
pub mod service;
pub mod startup;

// Event routing and transports
pub mod router;
pub mod transport;

// Re-export primary types at crate root for convenience
pub use error::{NotifyError, NotifyResult, RemoteError, TransportError, ValidationError};
pub use event_type::EventType;
pub use fingerprint::{fingerprint, Fingerprint};
pub use rule::{Origin, PersistedRule, Rule, RuleId};

pub use config::{ConfigError, ServerConfig};
pub use reconciler::{BucketSyncSummary, Reconciler};
pub use remote::{NotificationBackend, RemoteRegistryBridge};
pub use router::{Router, RouterSystem};
pub use service::NotificationService;
pub use startup::{run_startup_sync, StartupSync};
pub use storage::{RuleStore, StorageError};
