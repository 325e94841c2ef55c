//! MQTT transport.
//!
//! Two broker connections: `<client_id>-recv` subscribes to the base topic and
//! feeds the [`RouterSystem`]; `<client_id>-send` backs the outbound
//! [`MqttPublisher`]. Each connection is driven by its own event-loop task.
//! rumqttc reconnects on the next poll after an error; the inbound connection
//! resubscribes on every `ConnAck`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::router::{Publisher, RouterSystem};

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Map a configured QoS level to rumqttc's enum.
#[must_use]
pub const fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn connect(cfg: &MqttConfig, suffix: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(
        format!("{}-{suffix}", cfg.client_id),
        cfg.broker_host.clone(),
        cfg.broker_port,
    );
    options.set_keep_alive(cfg.keep_alive());
    AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY)
}

/// Outbound publisher over the `-send` connection.
///
/// Called from router worker threads; each publish blocks on the runtime
/// for at most the given timeout. Publishing while disconnected fails fast.
#[derive(Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    runtime: Handle,
    connected: Arc<AtomicBool>,
    qos: QoS,
}

impl MqttPublisher {
    /// Connect the outbound client and spawn its event loop on `runtime`.
    #[must_use]
    pub fn start(cfg: &MqttConfig, runtime: &Handle) -> (Arc<Self>, JoinHandle<()>) {
        let (client, eventloop) = connect(cfg, "send");
        let connected = Arc::new(AtomicBool::new(false));
        let task = runtime.spawn(drive_outbound(
            eventloop,
            Arc::clone(&connected),
            cfg.reconnect_delay(),
        ));
        let publisher = Arc::new(Self {
            client,
            runtime: runtime.clone(),
            connected,
            qos: qos_from_level(cfg.qos),
        });
        (publisher, task)
    }

    /// Returns true while the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Publisher for MqttPublisher {
    fn publish(&self, destination: &str, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected {
                reason: "outbound MQTT connection is down".to_string(),
            });
        }

        let send = self
            .client
            .publish(destination, self.qos, false, payload.to_vec());
        // Callers are plain worker threads; the timer must be created inside the runtime.
        let sent = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, send).await });
        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::PublishFailed {
                destination: destination.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(TransportError::Timeout {
                destination: destination.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

async fn drive_outbound(mut eventloop: EventLoop, connected: Arc<AtomicBool>, reconnect_delay: Duration) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Release);
                info!("outbound MQTT connection established");
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::AcqRel) {
                    warn!(error = %e, "outbound MQTT connection lost");
                } else {
                    debug!(error = %e, "outbound MQTT connection attempt failed");
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

/// Connect the inbound client and spawn a task feeding `system`.
///
/// Only messages on the exact base topic are routed. Outbound topics live
/// under the base topic, so they never loop back here.
#[must_use]
pub fn spawn_inbound(cfg: &MqttConfig, system: Arc<RouterSystem>, runtime: &Handle) -> JoinHandle<()> {
    let (client, eventloop) = connect(cfg, "recv");
    runtime.spawn(drive_inbound(
        client,
        eventloop,
        system,
        cfg.base_topic.clone(),
        qos_from_level(cfg.qos),
        cfg.reconnect_delay(),
    ))
}

async fn drive_inbound(
    client: AsyncClient,
    mut eventloop: EventLoop,
    system: Arc<RouterSystem>,
    topic: String,
    qos: QoS,
    reconnect_delay: Duration,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // The event loop is polled by this task, so never await here.
                match client.try_subscribe(topic.as_str(), qos) {
                    Ok(()) => info!(topic = %topic, "inbound MQTT connected; subscribing"),
                    Err(e) => {
                        let err = TransportError::SubscribeFailed {
                            topic: topic.clone(),
                            message: e.to_string(),
                        };
                        warn!(error = %err, "inbound subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                if p.topic != topic {
                    continue;
                }
                if !system.submit(p.payload.to_vec()) {
                    debug!(dropped = system.dropped(), "inbound event not queued");
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "inbound MQTT connection error; retrying");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}
