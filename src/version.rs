//! Dotted version parsing and comparison.
//!
//! NVD boundary strings and lock-file versions are not semver: tags like
//! `v4.8.2` or `5.0.0-beta` must compare numerically, and anything else must
//! fail to parse so the matcher can apply its conservative policy. Parse
//! failure is a first-class outcome, not an error.

use std::cmp::Ordering;

/// An ordered sequence of non-negative integers extracted from a dotted
/// version string.
///
/// Keys of different lengths are compared as if zero-padded to a common
/// length, so `1.2` equals `1.2.0` and is less than `1.2.1`.
#[derive(Debug, Clone)]
pub struct ComparableVersion {
    values: Vec<u64>,
}

// Equality must agree with the zero-padded ordering, so it cannot be derived
// from the raw component vectors.
impl PartialEq for ComparableVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ComparableVersion {}

impl ComparableVersion {
    /// Parses a version string into a comparable key.
    ///
    /// A single leading `v` and a trailing `-beta` marker are stripped before
    /// splitting on `.`; every remaining component must be a non-negative
    /// integer or the whole version is unparseable.
    pub fn parse(version: &str) -> Option<Self> {
        let version = version.trim();
        let version = version.strip_prefix('v').unwrap_or(version);

        let mut values = Vec::new();
        for component in version.split('.') {
            let component = component.strip_suffix("-beta").unwrap_or(component);
            values.push(component.parse::<u64>().ok()?);
        }

        if values.is_empty() {
            return None;
        }

        Some(Self { values })
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }
}

impl PartialOrd for ComparableVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComparableVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.values.len().max(other.values.len());
        for i in 0..len {
            let a = self.values.get(i).copied().unwrap_or(0);
            let b = other.values.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}
