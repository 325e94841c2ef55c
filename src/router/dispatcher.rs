//! The routing pass over one envelope.
//!
//! Rules are read fresh from the store for every record. A topic is delivered
//! at most once per record even when several rules share its fingerprint.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::storage::RuleStore;

use super::envelope::{EventEnvelope, EventRecord};
use super::matcher::{evaluate, MatchOutput};
use super::publisher::Publisher;

#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Inbound topic; outbound topics are `<base_topic>/<rule topic>`.
    pub base_topic: String,
    /// Bound on each publish.
    pub publish_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_topic: "bucketcast".to_string(),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters for one routed envelope.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub records: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl RouteReport {
    fn absorb(&mut self, other: Self) {
        self.records += other.records;
        self.skipped += other.skipped;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Routes envelopes to rule topics.
pub struct Router {
    cfg: RouterConfig,
    rules: Arc<dyn RuleStore>,
    publisher: Arc<dyn Publisher>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("cfg", &self.cfg).finish_non_exhaustive()
    }
}

impl Router {
    /// Create a router reading rules from `rules` and delivering through `publisher`.
    #[must_use]
    pub fn new(cfg: RouterConfig, rules: Arc<dyn RuleStore>, publisher: Arc<dyn Publisher>) -> Self {
        Self { cfg, rules, publisher }
    }

    /// Outbound destination for a rule topic.
    #[must_use]
    pub fn destination(&self, topic: &str) -> String {
        format!("{}/{}", self.cfg.base_topic, topic)
    }

    /// Decode and route a raw payload.
    ///
    /// Only a decode failure is an error; per-record and per-topic failures
    /// are logged and counted in the report.
    pub fn route(&self, payload: &[u8]) -> Result<RouteReport, TransportError> {
        let envelope = EventEnvelope::parse(payload)?;
        Ok(self.route_envelope(&envelope))
    }

    /// Route every record of a decoded envelope.
    pub fn route_envelope(&self, envelope: &EventEnvelope) -> RouteReport {
        let mut report = RouteReport::default();
        for raw in envelope.records() {
            report.absorb(self.route_record(envelope, raw));
        }
        report
    }

    fn route_record(&self, envelope: &EventEnvelope, raw: &Value) -> RouteReport {
        let mut report = RouteReport {
            records: 1,
            ..RouteReport::default()
        };

        let Some(record) = EventRecord::from_value(raw) else {
            warn!("skipping record without eventName, bucket or key");
            report.skipped = 1;
            return report;
        };

        let rules = match self.rules.list_by_bucket(record.bucket) {
            Ok(rules) => rules,
            Err(err) => {
                warn!(bucket = %record.bucket, error = %err, "rule lookup failed; record skipped");
                report.skipped = 1;
                return report;
            }
        };

        let mut used: HashSet<String> = HashSet::new();
        let mut payload: Option<Vec<u8>> = None;

        for rule in &rules {
            let MatchOutput::Match(topic) = evaluate(&rule.rule, &record) else {
                continue;
            };
            // A topic counts as served only once a publish to it succeeds.
            if used.contains(&topic) {
                continue;
            }

            if payload.is_none() {
                match envelope.single(raw) {
                    Ok(body) => payload = Some(body),
                    Err(err) => {
                        warn!(bucket = %record.bucket, error = %err, "could not encode outbound envelope");
                        report.failed += 1;
                        return report;
                    }
                }
            }
            let Some(body) = payload.as_deref() else {
                continue;
            };

            let destination = self.destination(&topic);
            match self.publisher.publish(&destination, body, self.cfg.publish_timeout) {
                Ok(()) => {
                    debug!(destination = %destination, key = %record.key, "event delivered");
                    report.delivered += 1;
                    used.insert(topic);
                }
                Err(err) => {
                    warn!(destination = %destination, error = %err, "event delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
