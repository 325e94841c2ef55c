//! Network transports.
//!
//! - `mqtt` (feature `transport-mqtt`): inbound event subscription and the
//!   outbound [`Publisher`](crate::router::Publisher)
//! - `grpc` (feature `transport-grpc`): the admin command service

#[cfg(feature = "transport-grpc")]
pub mod grpc;

#[cfg(feature = "transport-mqtt")]
pub mod mqtt;
