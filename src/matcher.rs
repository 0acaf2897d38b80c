//! Version-range matching against vulnerability configurations.
//!
//! The policy is conservative: a boundary that cannot be parsed does not
//! constrain the match, and a library version that cannot be parsed matches
//! every range.

use crate::model::{AffectedVersionRange, CveData, Library, VulnerableUse};
use crate::version::ComparableVersion;

/// True when `version` falls inside `range`.
///
/// An `exact` bound is decisive when present: the range matches iff both
/// sides parse and compare equal. Otherwise each present boundary must be
/// satisfied; ranges with no parseable constraints match everything.
fn range_matches(version: &ComparableVersion, range: &AffectedVersionRange) -> bool {
    if let Some(exact) = &range.exact {
        return match ComparableVersion::parse(exact) {
            Some(exact) => *version == exact,
            None => false,
        };
    }

    if let Some(bound) = parse_bound(&range.start_including) {
        if *version < bound {
            return false;
        }
    }
    if let Some(bound) = parse_bound(&range.start_excluding) {
        if *version <= bound {
            return false;
        }
    }
    if let Some(bound) = parse_bound(&range.end_including) {
        if *version > bound {
            return false;
        }
    }
    if let Some(bound) = parse_bound(&range.end_excluding) {
        if *version >= bound {
            return false;
        }
    }

    true
}

/// An absent or unparseable boundary does not constrain the match.
fn parse_bound(bound: &Option<String>) -> Option<ComparableVersion> {
    bound.as_deref().and_then(ComparableVersion::parse)
}

/// True when the library's version falls in at least one of the ranges.
/// Ranges are disjoint alternatives, not an intersection.
pub fn is_vulnerable(library: &Library, ranges: &[AffectedVersionRange]) -> bool {
    match ComparableVersion::parse(&library.version) {
        Some(version) => ranges.iter().any(|range| range_matches(&version, range)),
        None => {
            // unknown version: can't prove safe, report as matching
            tracing::debug!(
                library = %library.name,
                version = %library.version,
                "version not comparable, conservatively treating as vulnerable"
            );
            !ranges.is_empty()
        }
    }
}

/// Pairs every used library version with every vulnerability whose ranges it
/// falls into. A library may appear once per qualifying vulnerability.
pub fn vulnerable_uses(libraries: &[Library], vulnerabilities: &[CveData]) -> Vec<VulnerableUse> {
    let mut matches = Vec::new();

    for vulnerability in vulnerabilities {
        for library in libraries {
            if is_vulnerable(library, &vulnerability.affected_versions) {
                tracing::debug!(
                    library = %library.name,
                    version = %library.version,
                    cve = %vulnerability.id,
                    "vulnerable version in use"
                );
                matches.push(VulnerableUse {
                    library: library.clone(),
                    vulnerability: vulnerability.clone(),
                });
            }
        }
    }

    matches
}
