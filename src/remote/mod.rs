//! Remote notification registry.
//!
//! The object store keeps one notification configuration per bucket: a list
//! of queue entries, each naming a destination queue, event names and a key
//! filter. [`NotificationBackend`] is the raw read/write boundary;
//! [`RemoteRegistryBridge`] restricts every operation to the entries of one
//! queue id and speaks in [`Rule`](crate::rule::Rule)s.

mod backend;
mod bridge;
mod config;
mod memory;

pub use backend::{BackendError, NotificationBackend};
pub use bridge::{BulkSetOutcome, RegisterOutcome, RemoteRegistryBridge};
pub use config::{FilterRule, KeyFilter, NotificationConfiguration, QueueEntry};
pub use memory::InMemoryNotificationBackend;
