//! Rule storage for bucketcast.
//!
//! The [`RuleStore`] trait is the boundary to durable persistence. The
//! in-memory implementation backs tests and embedded mode.

mod memory;
mod traits;

pub use memory::InMemoryRuleStore;
pub use traits::{RuleStore, StorageError};
