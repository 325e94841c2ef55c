//! Event routing.
//!
//! Inbound bucket event envelopes are split per record, matched against the
//! bucket's rules and re-published once per distinct rule topic.
//!
//! - [`envelope`]: inbound decoding and one-record outbound envelopes
//! - [`matcher`]: action/prefix/suffix matching of a record against a rule
//! - [`publisher`]: outbound delivery boundary
//! - [`dispatcher`]: [`Router`], the per-envelope routing pass
//! - [`system`]: [`RouterSystem`], the bounded queue and worker pool

pub mod dispatcher;
pub mod envelope;
pub mod matcher;
pub mod publisher;
pub mod system;

pub use dispatcher::{RouteReport, Router, RouterConfig};
pub use envelope::{EventEnvelope, EventRecord};
pub use matcher::{action_matches, evaluate, MatchOutput};
pub use publisher::{ChannelPublisher, Delivery, Publisher};
pub use system::RouterSystem;
