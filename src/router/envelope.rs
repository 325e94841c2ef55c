//! Bucket event envelopes.
//!
//! Inbound: `{"Records": [...], ...}`. Every record is kept as the original
//! JSON value so it is forwarded unchanged. Top-level fields other than
//! `Records` (such as `EventName` and `Key`) are copied into each outbound
//! envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;

/// A decoded inbound envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "Records")]
    records: Vec<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
    #[serde(rename = "Records")]
    records: [&'a Value; 1],
}

impl EventEnvelope {
    /// Decode an inbound payload.
    pub fn parse(payload: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(payload).map_err(|e| TransportError::MalformedPayload {
            message: e.to_string(),
        })
    }

    /// Raw records, in envelope order.
    #[must_use]
    pub fn records(&self) -> &[Value] {
        &self.records
    }

    /// Top-level fields other than `Records`.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Encode a one-record envelope for `record`.
    pub fn single(&self, record: &Value) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(&OutboundEnvelope {
            extra: &self.extra,
            records: [record],
        })
        .map_err(|e| TransportError::MalformedPayload {
            message: e.to_string(),
        })
    }
}

/// The routing-relevant fields of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord<'a> {
    /// `eventName`, e.g. `s3:ObjectCreated:Put`.
    pub action: &'a str,
    /// `s3.bucket.name`.
    pub bucket: &'a str,
    /// `s3.object.key`, as sent (not URL-decoded).
    pub key: &'a str,
}

impl<'a> EventRecord<'a> {
    /// Extract the routing fields, or `None` if any is missing.
    #[must_use]
    pub fn from_value(record: &'a Value) -> Option<Self> {
        Some(Self {
            action: record.get("eventName")?.as_str()?,
            bucket: record.pointer("/s3/bucket/name")?.as_str()?,
            key: record.pointer("/s3/object/key")?.as_str()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "EventName": "s3:ObjectCreated:Put",
            "Key": "photos/img/cat.jpg",
            "Records": [
                {
                    "eventName": "s3:ObjectCreated:Put",
                    "s3": {"bucket": {"name": "photos"}, "object": {"key": "img/cat.jpg", "size": 42}}
                },
                {"eventName": "s3:ObjectCreated:Put"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn parse_keeps_records_and_extra_fields() {
        let env = EventEnvelope::parse(&payload()).unwrap();
        assert_eq!(env.records().len(), 2);
        assert_eq!(env.extra()["Key"], "photos/img/cat.jpg");
        assert!(!env.extra().contains_key("Records"));
    }

    #[test]
    fn record_fields_are_extracted() {
        let env = EventEnvelope::parse(&payload()).unwrap();
        let rec = EventRecord::from_value(&env.records()[0]).unwrap();
        assert_eq!(rec.action, "s3:ObjectCreated:Put");
        assert_eq!(rec.bucket, "photos");
        assert_eq!(rec.key, "img/cat.jpg");
        assert!(EventRecord::from_value(&env.records()[1]).is_none());
    }

    #[test]
    fn single_carries_one_record_and_extra_fields() {
        let env = EventEnvelope::parse(&payload()).unwrap();
        let out: Value = serde_json::from_slice(&env.single(&env.records()[0]).unwrap()).unwrap();
        assert_eq!(out["EventName"], "s3:ObjectCreated:Put");
        assert_eq!(out["Key"], "photos/img/cat.jpg");
        assert_eq!(out["Records"].as_array().unwrap().len(), 1);
        assert_eq!(out["Records"][0], env.records()[0]);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(EventEnvelope::parse(b"not json").is_err());
        assert!(EventEnvelope::parse(br#"{"EventName":"x"}"#).is_err());
        assert!(EventEnvelope::parse(br#"{"Records":{}}"#).is_err());
    }
}
