//! Outbound delivery.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};

use crate::error::TransportError;

/// Publishes one payload to one destination.
///
/// Implementations must bound every call by `timeout` and must not retain
/// the message on the destination.
pub trait Publisher: Send + Sync {
    /// Publish `payload` to `destination`.
    fn publish(&self, destination: &str, payload: &[u8], timeout: Duration) -> Result<(), TransportError>;
}

/// A message handed to a [`ChannelPublisher`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub payload: Vec<u8>,
}

/// In-process publisher backed by a bounded channel.
///
/// Used for embedded consumers and tests.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: Sender<Delivery>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<Delivery>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, destination: &str, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let delivery = Delivery {
            destination: destination.to_string(),
            payload: payload.to_vec(),
        };
        self.tx.send_timeout(delivery, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => TransportError::Timeout {
                destination: destination.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            SendTimeoutError::Disconnected(_) => TransportError::Disconnected {
                reason: "delivery channel closed".to_string(),
            },
        })
    }
}
