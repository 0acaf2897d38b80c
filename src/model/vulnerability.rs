use serde::{Deserialize, Serialize};

use crate::model::Library;

/// One affected-version configuration reported for a CPE.
///
/// All boundary fields are raw version strings as published by NVD; parsing
/// happens in the matcher, and an unparseable boundary deliberately does not
/// constrain the match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectedVersionRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpe_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_including: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_excluding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_including: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_excluding: Option<String>,
}

/// A publicly cataloged vulnerability with its affected-version ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveData {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub affected_versions: Vec<AffectedVersionRange>,
}

impl CveData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            affected_versions: Vec::new(),
        }
    }
}

/// A (library, vulnerability) pair meaning "this used version falls inside
/// one of the vulnerability's affected ranges".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerableUse {
    pub library: Library,
    pub vulnerability: CveData,
}
