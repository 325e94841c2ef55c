//! Canonical rule fingerprints.
//!
//! A fingerprint is the only notion of rule equality in bucketcast. Two rules
//! with the same bucket, the same action set (in any order), the same prefix
//! and the same suffix always produce the same fingerprint.
//!
//! The fingerprint has two consumers:
//! - identity: dedup of local rules, remote entries and router deliveries
//! - routing: the topic segment `<bucket>/ev-<fingerprint>`
//!
//! Output is lowercase hex only, so it is safe inside MQTT topics and URLs.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Number of hex characters kept from the BLAKE3 digest (128 bits).
pub const FINGERPRINT_HEX_LEN: usize = 32;

/// Separator between a bucket name and the fingerprint inside a topic.
pub const TOPIC_MARKER: &str = "/ev-";

/// Stable identity of a rule description.
///
/// # Examples
///
/// ```
/// use bucketcast::fingerprint::fingerprint;
///
/// let a = fingerprint("photos", ["s3:ObjectCreated:Put", "s3:ObjectRemoved:Delete"], "img/", "");
/// let b = fingerprint("photos", ["s3:ObjectRemoved:Delete", "s3:ObjectCreated:Put"], "img/", "");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Routable topic for this fingerprint within `bucket`.
    #[must_use]
    pub fn topic(&self, bucket: &str) -> String {
        format!("{bucket}{TOPIC_MARKER}{}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Length-prefixing keeps field boundaries unambiguous: ("ab", "c") and
// ("a", "bc") must not hash the same.
fn update_field(h: &mut Hasher, field: &str) {
    h.update(&(field.len() as u64).to_le_bytes());
    h.update(field.as_bytes());
}

/// Compute the fingerprint of a rule description.
///
/// `actions` is sorted and de-duplicated before hashing, so insertion order and
/// repeated entries never affect the result.
#[must_use]
pub fn fingerprint<'a, I>(bucket: &str, actions: I, prefix: &str, suffix: &str) -> Fingerprint
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = actions.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut h = Hasher::new();
    update_field(&mut h, bucket);
    h.update(&(sorted.len() as u64).to_le_bytes());
    for action in &sorted {
        update_field(&mut h, action);
    }
    update_field(&mut h, prefix);
    update_field(&mut h, suffix);

    let hex = h.finalize().to_hex();
    Fingerprint(hex.as_str()[..FINGERPRINT_HEX_LEN].to_string())
}
