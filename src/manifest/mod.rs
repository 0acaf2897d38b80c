//! Dependency-manifest discovery and parsing.
//!
//! Each ecosystem has a definition file (`Podfile`, `Cartfile`,
//! `Package.swift`) and a resolved lock file (`Podfile.lock`,
//! `Cartfile.resolved`, `Package.resolved`). Only the lock file is parsed;
//! a definition without a lock means the ecosystem is declared but
//! unresolved and is skipped for the run.
//!
//! Parsers tolerate malformed lines by skipping them; a broken entry never
//! fails the whole parse.

mod carthage;
mod podfile;
mod swiftpm;

pub use carthage::parse_cartfile_resolved;
pub use podfile::parse_podfile_lock;
pub use swiftpm::parse_package_resolved;

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::model::{Ecosystem, Library};
use crate::translator::Translate;

/// The manifest pair found for one ecosystem in a project root.
#[derive(Debug, Clone)]
pub struct DependencyFile {
    pub ecosystem: Ecosystem,
    pub definition: Option<PathBuf>,
    pub resolved: Option<PathBuf>,
}

impl DependencyFile {
    /// The project declares this ecosystem at all.
    pub fn declared(&self) -> bool {
        self.definition.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

pub fn find_pod_file(root: &Path) -> DependencyFile {
    DependencyFile {
        ecosystem: Ecosystem::Cocoapods,
        definition: existing(root.join("Podfile")),
        resolved: existing(root.join("Podfile.lock")),
    }
}

pub fn find_carthage_file(root: &Path) -> DependencyFile {
    DependencyFile {
        ecosystem: Ecosystem::Carthage,
        definition: existing(root.join("Cartfile")),
        resolved: existing(root.join("Cartfile.resolved")),
    }
}

pub fn find_swiftpm_file(root: &Path) -> DependencyFile {
    let resolved =
        existing(root.join("Package.resolved")).or_else(|| find_xcodeproj_resolved(root));
    DependencyFile {
        ecosystem: Ecosystem::Swiftpm,
        definition: existing(root.join("Package.swift")),
        resolved,
    }
}

/// Xcode keeps the SwiftPM lock inside the project bundle:
/// `*.xcodeproj/project.xcworkspace/xcshareddata/swiftpm/Package.resolved`.
fn find_xcodeproj_resolved(root: &Path) -> Option<PathBuf> {
    for entry in WalkDir::new(root)
        .max_depth(3)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || e.file_type().is_dir()
        })
        .filter_map(Result::ok)
    {
        if entry.path().extension().is_some_and(|ext| ext == "xcodeproj") {
            let candidate = entry
                .path()
                .join("project.xcworkspace")
                .join("xcshareddata")
                .join("swiftpm")
                .join("Package.resolved");
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Finds the manifest pair of every ecosystem in `root`.
pub fn discover(root: &Path) -> Vec<DependencyFile> {
    vec![
        find_pod_file(root),
        find_carthage_file(root),
        find_swiftpm_file(root),
    ]
}

/// Parses the resolved file of one ecosystem into libraries.
///
/// Returns an empty list when the file is unreadable; the caller decides
/// whether that is worth more than a logged notice.
pub fn parse_resolved(
    file: &DependencyFile,
    translator: &mut dyn Translate,
    only_direct: bool,
) -> Vec<Library> {
    let Some(path) = &file.resolved else {
        return Vec::new();
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "could not read resolved file");
            return Vec::new();
        }
    };

    match file.ecosystem {
        Ecosystem::Cocoapods => parse_podfile_lock(&content, translator, only_direct),
        Ecosystem::Carthage => parse_cartfile_resolved(&content),
        Ecosystem::Swiftpm => parse_package_resolved(&content),
    }
}

/// Derives the hosting-based `owner/repo` name from a repository URL.
///
/// Returns `None` when the URL has fewer than two path components.
pub(crate) fn name_from_url(url: &str) -> Option<String> {
    let value = url.replace(".git", "");
    let components: Vec<&str> = value.split('/').filter(|c| !c.is_empty()).collect();
    if components.len() < 2 {
        return None;
    }
    Some(format!(
        "{}/{}",
        components[components.len() - 2],
        components[components.len() - 1]
    ))
}
