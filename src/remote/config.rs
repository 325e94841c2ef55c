//! Bucket notification configuration documents.
//!
//! Only queue entries are modelled. An entry is never compared directly with
//! a rule; it is translated with [`QueueEntry::to_rule`] first.

use serde::{Deserialize, Serialize};

use crate::rule::Rule;

const PREFIX_RULE: &str = "prefix";
const SUFFIX_RULE: &str = "suffix";

/// Notification configuration of one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfiguration {
    /// Queue entries, in backend order. Entries of other queues are kept
    /// untouched on every write.
    #[serde(default)]
    pub queues: Vec<QueueEntry>,
}

impl NotificationConfiguration {
    /// Entries targeting `queue`.
    pub fn entries_for<'a>(&'a self, queue: &'a str) -> impl Iterator<Item = &'a QueueEntry> + 'a {
        self.queues.iter().filter(move |e| e.queue == queue)
    }
}

/// One `name=value` key filter rule.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub name: String,
    pub value: String,
}

/// Object key filter of a queue entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFilter {
    /// Filter rules; `prefix` and `suffix` are the only names understood.
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

impl KeyFilter {
    /// Builds a filter; empty values are omitted.
    #[must_use]
    pub fn from_prefix_suffix(prefix: &str, suffix: &str) -> Self {
        let mut rules = Vec::new();
        if !prefix.is_empty() {
            rules.push(FilterRule {
                name: PREFIX_RULE.to_string(),
                value: prefix.to_string(),
            });
        }
        if !suffix.is_empty() {
            rules.push(FilterRule {
                name: SUFFIX_RULE.to_string(),
                value: suffix.to_string(),
            });
        }
        Self { rules }
    }

    fn value_of(&self, name: &str) -> &str {
        self.rules
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .map_or("", |r| r.value.as_str())
    }

    /// The prefix constraint, or empty.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.value_of(PREFIX_RULE)
    }

    /// The suffix constraint, or empty.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.value_of(SUFFIX_RULE)
    }
}

/// A queue notification entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry id, if the backend assigned or kept one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Destination queue identifier.
    pub queue: String,
    /// Event names.
    pub events: Vec<String>,
    /// Key filter.
    #[serde(default)]
    pub filter: KeyFilter,
}

impl QueueEntry {
    /// Entry delivering `rule` to `queue`.
    #[must_use]
    pub fn for_rule(queue: &str, rule: &Rule) -> Self {
        Self {
            id: Some(format!("bucketcast-{}", rule.fingerprint())),
            queue: queue.to_string(),
            events: rule.actions.iter().cloned().collect(),
            filter: KeyFilter::from_prefix_suffix(&rule.prefix, &rule.suffix),
        }
    }

    /// Translate this entry into a rule of `bucket`.
    #[must_use]
    pub fn to_rule(&self, bucket: &str) -> Rule {
        Rule::new(
            bucket,
            self.events.iter().cloned(),
            self.filter.prefix(),
            self.filter.suffix(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_are_omitted() {
        assert!(KeyFilter::from_prefix_suffix("", "").rules.is_empty());
        let f = KeyFilter::from_prefix_suffix("img/", "");
        assert_eq!(f.rules.len(), 1);
        assert_eq!(f.prefix(), "img/");
        assert_eq!(f.suffix(), "");
    }

    #[test]
    fn filter_names_are_case_insensitive() {
        let f = KeyFilter {
            rules: vec![FilterRule {
                name: "Suffix".to_string(),
                value: ".jpg".to_string(),
            }],
        };
        assert_eq!(f.suffix(), ".jpg");
    }

    #[test]
    fn entry_translates_back_to_same_rule() {
        let rule = Rule::new("photos", ["s3:ObjectCreated:Put"], "img/", ".jpg");
        let entry = QueueEntry::for_rule("arn:minio:sqs::bucketcast:mqtt", &rule);
        assert!(entry.to_rule("photos").same_as(&rule));
        assert_eq!(entry.queue, "arn:minio:sqs::bucketcast:mqtt");
    }

    #[test]
    fn entries_for_filters_by_queue() {
        let rule = Rule::new("photos", ["s3:ObjectCreated:Put"], "", "");
        let config = NotificationConfiguration {
            queues: vec![QueueEntry::for_rule("ours", &rule), QueueEntry::for_rule("theirs", &rule)],
        };
        assert_eq!(config.entries_for("ours").count(), 1);
    }
}
