//! Router worker pool.
//!
//! Inbound payloads are enqueued with a non-blocking `try_send` on a bounded
//! channel and consumed by named worker threads. A full queue drops the
//! payload; the transport callback is never stalled. A panic while routing
//! one payload is contained to that payload.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, warn};

use crate::config::RouterSettings;
use crate::error::{NotifyError, NotifyResult};

use super::dispatcher::Router;

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    rejected: AtomicU64,
}

/// Router system: owns the inbound queue and the workers.
#[derive(Debug)]
pub struct RouterSystem {
    tx: Option<Sender<Vec<u8>>>,
    dropped: AtomicU64,
    counters: Arc<Counters>,
    joins: Vec<JoinHandle<()>>,
}

impl RouterSystem {
    /// Spawn `settings.workers` workers routing through `router`.
    pub fn start(settings: RouterSettings, router: Arc<Router>) -> NotifyResult<Self> {
        let (tx, rx) = bounded::<Vec<u8>>(settings.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let mut joins = Vec::with_capacity(settings.workers.max(1));
        for i in 0..settings.workers.max(1) {
            let rx = rx.clone();
            let router = Arc::clone(&router);
            let counters = Arc::clone(&counters);
            let join = thread::Builder::new()
                .name(format!("bucketcast-router-{i}"))
                .spawn(move || worker_loop(&router, &counters, &rx))
                .map_err(|e| NotifyError::internal(format!("failed to spawn router worker: {e}")))?;
            joins.push(join);
        }

        Ok(Self {
            tx: Some(tx),
            dropped: AtomicU64::new(0),
            counters,
            joins,
        })
    }

    /// Non-blocking enqueue. Returns false if the payload was dropped.
    pub fn submit(&self, payload: Vec<u8>) -> bool {
        let Some(tx) = &self.tx else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        match tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "router queue full; inbound event dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!("router workers gone; inbound event dropped");
                false
            }
        }
    }

    /// Payloads dropped at enqueue.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Payloads fully routed (decoded or not).
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// Payloads rejected as undecodable, or whose routing panicked.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    /// Close the queue, let workers drain it, and wait for them.
    pub fn shutdown(mut self) {
        self.tx = None;
        for join in self.joins.drain(..) {
            if join.join().is_err() {
                error!("router worker panicked");
            }
        }
    }
}

impl Drop for RouterSystem {
    fn drop(&mut self) {
        // Workers exit once the last sender is gone; detach them.
        self.tx = None;
        self.joins.clear();
    }
}

fn worker_loop(router: &Router, counters: &Counters, rx: &Receiver<Vec<u8>>) {
    for payload in rx {
        let routed = panic::catch_unwind(AssertUnwindSafe(|| router.route(&payload)));
        match routed {
            Err(_) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                error!(bytes = payload.len(), "router panicked on inbound payload; worker continues");
            }
            Ok(Ok(report)) => {
                debug!(
                    records = report.records,
                    skipped = report.skipped,
                    delivered = report.delivered,
                    failed = report.failed,
                    "envelope routed"
                );
            }
            Ok(Err(err)) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "inbound payload rejected");
            }
        }
        counters.processed.fetch_add(1, Ordering::Relaxed);
    }
}
