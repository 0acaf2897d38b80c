use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Cocoapods,
    Carthage,
    Swiftpm,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Cocoapods => "cocoapods",
            Ecosystem::Carthage => "carthage",
            Ecosystem::Swiftpm => "swiftpm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Cocoapods => "CocoaPods",
            Ecosystem::Carthage => "Carthage",
            Ecosystem::Swiftpm => "SwiftPM",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One declared/resolved dependency occurrence.
///
/// `name` is lowercased on construction. For CocoaPods entries the name is
/// later canonicalized to the hosting-based `owner/repo` form by the
/// translator; Carthage and SwiftPM names are already hosting-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    /// Import-module name; may differ from the package name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Sub-spec qualifier, e.g. a CocoaPods subspec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtarget: Option<String>,
    /// Tri-state: declared directly, pulled in transitively, or unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct: Option<bool>,
}

impl Library {
    pub fn new(name: impl Into<String>, version: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into().to_lowercase(),
            version: version.into(),
            ecosystem,
            module: None,
            subtarget: None,
            direct: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_subtarget(mut self, subtarget: impl Into<String>) -> Self {
        self.subtarget = Some(subtarget.into());
        self
    }

    pub fn with_direct(mut self, direct: bool) -> Self {
        self.direct = Some(direct);
        self
    }

    /// The name the locator matches import statements against: the module
    /// name when known, the package name otherwise, with an optional
    /// `/subtarget` qualifier.
    pub fn reference_name(&self) -> String {
        let base = self
            .module
            .as_deref()
            .unwrap_or(&self.name)
            .to_lowercase();
        match &self.subtarget {
            Some(sub) => format!("{}/{}", base, sub),
            None => base,
        }
    }
}

/// A concrete source location referencing a vulnerable library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLocation {
    pub path: PathBuf,
    pub line: usize,
    pub warning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_name_is_lowercased() {
        let lib = Library::new("Alamofire", "4.8.2", Ecosystem::Cocoapods);
        assert_eq!(lib.name, "alamofire");
        assert_eq!(lib.version, "4.8.2");
    }

    #[test]
    fn reference_name_prefers_module_and_appends_subtarget() {
        let lib = Library::new("alamofire/alamofire", "4.8.2", Ecosystem::Cocoapods)
            .with_module("Alamofire")
            .with_subtarget("nsurlsession");
        assert_eq!(lib.reference_name(), "alamofire/nsurlsession");

        let bare = Library::new("swiftyjson/swiftyjson", "5.0.0", Ecosystem::Carthage);
        assert_eq!(bare.reference_name(), "swiftyjson/swiftyjson");
    }
}
