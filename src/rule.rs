//! Rule types.
//!
//! A [`Rule`] is the canonical description of interest in bucket events. A
//! [`PersistedRule`] is a rule as held by a [`RuleStore`](crate::storage::RuleStore):
//! it adds the store-assigned id, the origin flag and audit metadata.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::event_type::EventType;
use crate::fingerprint::{fingerprint, Fingerprint};

/// Maximum length of an object-key prefix or suffix filter.
pub const MAX_KEY_FILTER_LEN: usize = 1024;

static BUCKET_NAME: OnceLock<Regex> = OnceLock::new();

fn bucket_name_regex() -> &'static Regex {
    BUCKET_NAME.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("bucket name pattern is valid")
    })
}

/// Unique identifier for a persisted rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Creates a new random rule ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where a persisted rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Created through the admin API; registered remotely on creation.
    #[default]
    Local,
    /// Materialized from a remote entry during an import; never re-pushed.
    Imported,
}

/// Interest in events of one bucket, filtered by action and object key.
///
/// Empty `prefix`/`suffix` mean "no constraint". Equality between rules is
/// defined by [`Rule::fingerprint`], never by comparing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Bucket the rule applies to.
    pub bucket: String,
    /// Event names; at least one is required.
    pub actions: BTreeSet<String>,
    /// Object key prefix filter.
    #[serde(default)]
    pub prefix: String,
    /// Object key suffix filter.
    #[serde(default)]
    pub suffix: String,
}

impl Rule {
    /// Creates a rule. Missing filters should be passed as empty strings.
    #[must_use]
    pub fn new<I, S>(bucket: impl Into<String>, actions: I, prefix: impl Into<String>, suffix: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bucket: bucket.into(),
            actions: actions.into_iter().map(Into::into).collect(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Canonical identity of this rule.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(
            &self.bucket,
            self.actions.iter().map(String::as_str),
            &self.prefix,
            &self.suffix,
        )
    }

    /// Routable topic, `<bucket>/ev-<fingerprint>`.
    #[must_use]
    pub fn topic(&self) -> String {
        self.fingerprint().topic(&self.bucket)
    }

    /// Returns true if both rules describe the same interest.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }

    /// Validate the rule before it touches the store or the remote backend.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_bucket_name(&self.bucket)?;

        if self.actions.is_empty() {
            return Err(ValidationError::EmptyActions);
        }
        for action in &self.actions {
            action.parse::<EventType>()?;
        }

        if self.prefix.len() > MAX_KEY_FILTER_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "prefix".to_string(),
                max_length: MAX_KEY_FILTER_LEN,
            });
        }
        if self.suffix.len() > MAX_KEY_FILTER_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "suffix".to_string(),
                max_length: MAX_KEY_FILTER_LEN,
            });
        }
        Ok(())
    }
}

/// Check a bucket name against S3 naming rules.
pub fn validate_bucket_name(bucket: &str) -> Result<(), ValidationError> {
    if bucket.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "bucket".to_string(),
        });
    }
    if !bucket_name_regex().is_match(bucket) {
        return Err(ValidationError::InvalidBucketName {
            bucket: bucket.to_string(),
            reason: "expected 3-63 lowercase letters, digits, dots or hyphens".to_string(),
        });
    }
    if bucket.contains("..") {
        return Err(ValidationError::InvalidBucketName {
            bucket: bucket.to_string(),
            reason: "consecutive dots are not allowed".to_string(),
        });
    }
    Ok(())
}

/// Audit metadata, owned by the rule store.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by: Option<String>,
}

impl AuditInfo {
    /// Audit record for a freshly created rule.
    #[must_use]
    pub fn created_now(actor: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            created_by: actor.map(str::to_string),
            modified_at: now,
            modified_by: actor.map(str::to_string),
        }
    }
}

/// A rule as held by the rule store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRule {
    /// Store-assigned identifier.
    pub id: RuleId,
    /// The rule description.
    #[serde(flatten)]
    pub rule: Rule,
    /// Local (API) or imported (remote) origin.
    pub origin: Origin,
    /// Audit fields; not used by the routing or sync logic.
    pub audit: AuditInfo,
}

impl PersistedRule {
    /// Bucket of the underlying rule.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.rule.bucket
    }

    /// Fingerprint of the underlying rule.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.rule.fingerprint()
    }

    /// Topic of the underlying rule.
    #[must_use]
    pub fn topic(&self) -> String {
        self.rule.topic()
    }
}
