//! Record/rule matching.

use crate::event_type::WILDCARD_SUFFIX;
use crate::rule::Rule;

use super::envelope::EventRecord;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutput {
    NoMatch,
    /// Matched; carries the rule topic (`<bucket>/ev-<fingerprint>`).
    Match(String),
}

/// Returns true if `record_action` satisfies `rule_action`.
///
/// `s3:ObjectCreated:*` matches every `s3:ObjectCreated:` action.
#[must_use]
pub fn action_matches(rule_action: &str, record_action: &str) -> bool {
    if rule_action == record_action {
        return true;
    }
    rule_action
        .strip_suffix('*')
        .filter(|_| rule_action.ends_with(WILDCARD_SUFFIX))
        .is_some_and(|namespace| record_action.starts_with(namespace))
}

/// Evaluate `rule` against one record.
#[must_use]
pub fn evaluate(rule: &Rule, record: &EventRecord<'_>) -> MatchOutput {
    if rule.bucket != record.bucket {
        return MatchOutput::NoMatch;
    }
    if !rule.actions.iter().any(|a| action_matches(a, record.action)) {
        return MatchOutput::NoMatch;
    }
    if !record.key.starts_with(rule.prefix.as_str()) || !record.key.ends_with(rule.suffix.as_str()) {
        return MatchOutput::NoMatch;
    }
    MatchOutput::Match(rule.topic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<'a>(action: &'a str, key: &'a str) -> EventRecord<'a> {
        EventRecord {
            action,
            bucket: "photos",
            key,
        }
    }

    #[test]
    fn exact_and_wildcard_actions() {
        assert!(action_matches("s3:ObjectCreated:Put", "s3:ObjectCreated:Put"));
        assert!(action_matches("s3:ObjectCreated:*", "s3:ObjectCreated:Put"));
        assert!(action_matches("s3:ObjectCreated:*", "s3:ObjectCreated:CompleteMultipartUpload"));
        assert!(!action_matches("s3:ObjectCreated:*", "s3:ObjectRemoved:Delete"));
        assert!(!action_matches("s3:ObjectCreated:Put", "s3:ObjectCreated:Post"));
    }

    #[test]
    fn prefix_and_suffix_are_both_required() {
        let rule = Rule::new("photos", ["s3:ObjectCreated:Put"], "img/", ".jpg");
        let put = "s3:ObjectCreated:Put";
        assert_eq!(evaluate(&rule, &record(put, "img/cat.jpg")), MatchOutput::Match(rule.topic()));
        assert_eq!(evaluate(&rule, &record(put, "img/cat.png")), MatchOutput::NoMatch);
        assert_eq!(evaluate(&rule, &record(put, "doc/cat.jpg")), MatchOutput::NoMatch);
        assert_eq!(
            evaluate(&rule, &record("s3:ObjectRemoved:Delete", "img/cat.jpg")),
            MatchOutput::NoMatch
        );
    }

    #[test]
    fn empty_filters_match_any_key() {
        let rule = Rule::new("photos", ["s3:ObjectRemoved:*"], "", "");
        assert!(matches!(
            evaluate(&rule, &record("s3:ObjectRemoved:DeleteMarkerCreated", "")),
            MatchOutput::Match(_)
        ));
    }

    #[test]
    fn other_bucket_never_matches() {
        let rule = Rule::new("videos", ["s3:ObjectCreated:Put"], "", "");
        assert_eq!(evaluate(&rule, &record("s3:ObjectCreated:Put", "x")), MatchOutput::NoMatch);
    }
}
