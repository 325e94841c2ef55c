//! The fixed vocabulary of bucket event names.
//!
//! Rules may only name actions from this list. Names ending in `:*` are
//! namespace wildcards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Suffix marking a namespace wildcard action.
pub const WILDCARD_SUFFIX: &str = ":*";

/// A bucket event name understood by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventType {
    /// `s3:ObjectAccessed:*`
    ObjectAccessedAny,
    /// `s3:ObjectAccessed:Get`
    ObjectAccessedGet,
    /// `s3:ObjectAccessed:Head`
    ObjectAccessedHead,
    /// `s3:ObjectCreated:*`
    ObjectCreatedAny,
    /// `s3:ObjectCreated:CompleteMultipartUpload`
    ObjectCreatedCompleteMultipartUpload,
    /// `s3:ObjectCreated:Copy`
    ObjectCreatedCopy,
    /// `s3:ObjectCreated:Post`
    ObjectCreatedPost,
    /// `s3:ObjectCreated:Put`
    ObjectCreatedPut,
    /// `s3:ObjectRemoved:*`
    ObjectRemovedAny,
    /// `s3:ObjectRemoved:Delete`
    ObjectRemovedDelete,
    /// `s3:ObjectRemoved:DeleteMarkerCreated`
    ObjectRemovedDeleteMarkerCreated,
    /// `s3:ReducedRedundancyLostObject`
    ReducedRedundancyLostObject,
}

impl EventType {
    /// Every known event type, in listing order.
    pub const ALL: [Self; 12] = [
        Self::ObjectAccessedAny,
        Self::ObjectAccessedGet,
        Self::ObjectAccessedHead,
        Self::ObjectCreatedAny,
        Self::ObjectCreatedCompleteMultipartUpload,
        Self::ObjectCreatedCopy,
        Self::ObjectCreatedPost,
        Self::ObjectCreatedPut,
        Self::ObjectRemovedAny,
        Self::ObjectRemovedDelete,
        Self::ObjectRemovedDeleteMarkerCreated,
        Self::ReducedRedundancyLostObject,
    ];

    /// Wire name of this event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectAccessedAny => "s3:ObjectAccessed:*",
            Self::ObjectAccessedGet => "s3:ObjectAccessed:Get",
            Self::ObjectAccessedHead => "s3:ObjectAccessed:Head",
            Self::ObjectCreatedAny => "s3:ObjectCreated:*",
            Self::ObjectCreatedCompleteMultipartUpload => "s3:ObjectCreated:CompleteMultipartUpload",
            Self::ObjectCreatedCopy => "s3:ObjectCreated:Copy",
            Self::ObjectCreatedPost => "s3:ObjectCreated:Post",
            Self::ObjectCreatedPut => "s3:ObjectCreated:Put",
            Self::ObjectRemovedAny => "s3:ObjectRemoved:*",
            Self::ObjectRemovedDelete => "s3:ObjectRemoved:Delete",
            Self::ObjectRemovedDeleteMarkerCreated => "s3:ObjectRemoved:DeleteMarkerCreated",
            Self::ReducedRedundancyLostObject => "s3:ReducedRedundancyLostObject",
        }
    }

    /// Names of all known event types.
    #[must_use]
    pub fn known_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAction {
                action: s.to_string(),
            })
    }
}

impl TryFrom<String> for EventType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips_through_parse() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "s3:ObjectCreated:Teleport".parse::<EventType>().unwrap_err();
        assert!(err.to_string().contains("s3:ObjectCreated:Teleport"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&EventType::ObjectRemovedDelete).unwrap();
        assert_eq!(json, "\"s3:ObjectRemoved:Delete\"");
        let back: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventType::ObjectRemovedDelete);
    }
}
