//! Source location of vulnerable library references.
//!
//! After matching, the project tree is re-scanned for the places that
//! reference a flagged library: `import` statements in Swift sources and
//! entry lines in the three lock files. Each textual hit becomes a
//! file/line warning carrying the vulnerability description.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::model::{Ecosystem, FileLocation, VulnerableUse};

fn detect_ecosystem(path: &Path) -> Option<Ecosystem> {
    let name = path.file_name()?.to_string_lossy();
    if name.ends_with("Podfile.lock") {
        Some(Ecosystem::Cocoapods)
    } else if name.ends_with("Cartfile.resolved") {
        Some(Ecosystem::Carthage)
    } else if name.ends_with("Package.resolved") {
        Some(Ecosystem::Swiftpm)
    } else {
        None
    }
}

fn is_scannable(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.ends_with(".swift") || detect_ecosystem(path).is_some()
}

/// The name a line references, when the line looks like a dependency
/// reference at all: `import Alamofire`, a `- Name (version)` lock entry, a
/// `"package": "Name",` pin line, or any Cartfile entry.
fn referenced_name(line: &str, is_cartfile: bool) -> Option<String> {
    let line = line.trim();
    if !(line.starts_with("import")
        || line.starts_with('-')
        || line.starts_with("\"package\":")
        || is_cartfile)
    {
        return None;
    }

    let name = line.split(' ').nth(1)?;
    Some(name.replace(['"', ','], ""))
}

/// Scans the project for references to the flagged libraries.
pub fn locate_references(root: &Path, matches: &[VulnerableUse]) -> Vec<FileLocation> {
    tracing::info!(path = %root.display(), "locating references to vulnerable libraries");
    let mut locations = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() || !is_scannable(entry.path()) {
            continue;
        }
        scan_file(entry.path(), matches, &mut locations);
    }

    locations
}

fn scan_file(path: &Path, matches: &[VulnerableUse], locations: &mut Vec<FileLocation>) {
    let Ok(content) = fs::read_to_string(path) else {
        tracing::debug!(path = %path.display(), "skipping unreadable file");
        return;
    };

    let file_ecosystem = detect_ecosystem(path);
    let is_pod_lock = file_ecosystem == Some(Ecosystem::Cocoapods);
    let is_cartfile = file_ecosystem == Some(Ecosystem::Carthage);

    for (index, line) in content.lines().enumerate() {
        // entries past the DEPENDENCIES: header repeat names without
        // versions and are not reference sites
        if is_pod_lock && line.trim().starts_with("DEPENDENCIES:") {
            break;
        }

        let Some(name) = referenced_name(line, is_cartfile) else {
            continue;
        };
        let name = name.to_lowercase();

        for vulnerable in matches {
            if let Some(detected) = file_ecosystem {
                if vulnerable.library.ecosystem != detected {
                    continue;
                }
            }

            if !vulnerable.library.reference_name().ends_with(&name) {
                continue;
            }

            let warning = vulnerable
                .vulnerability
                .description
                .clone()
                .unwrap_or_else(|| "vulnerable".to_string());

            tracing::debug!(path = %path.display(), line = index + 1, name = %name, "reference hit");
            locations.push(FileLocation {
                path: PathBuf::from(path),
                line: index + 1,
                warning,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CveData, Library, VulnerableUse};
    use std::fs;
    use tempfile::TempDir;

    fn vulnerable(name: &str, module: Option<&str>, ecosystem: Ecosystem) -> VulnerableUse {
        let mut library = Library::new(name, "4.8.2", ecosystem);
        library.module = module.map(String::from);
        VulnerableUse {
            library,
            vulnerability: CveData {
                description: Some("request smuggling in redirect handling".into()),
                ..CveData::new("CVE-2020-0001")
            },
        }
    }

    #[test]
    fn finds_import_statements_in_sources() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Networking.swift"),
            "import Foundation\nimport Alamofire\n\nlet session = Session()\n",
        )
        .unwrap();

        let matches = vec![vulnerable(
            "alamofire/alamofire",
            Some("Alamofire"),
            Ecosystem::Cocoapods,
        )];
        let locations = locate_references(dir.path(), &matches);

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].line, 2);
        assert!(locations[0].warning.contains("request smuggling"));
    }

    #[test]
    fn pod_lock_scan_stops_at_dependencies_header() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Podfile.lock"),
            "PODS:\n  - Alamofire (4.8.2)\n\nDEPENDENCIES:\n  - Alamofire\n",
        )
        .unwrap();

        let matches = vec![vulnerable(
            "alamofire/alamofire",
            Some("Alamofire"),
            Ecosystem::Cocoapods,
        )];
        let locations = locate_references(dir.path(), &matches);

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].line, 2);
    }

    #[test]
    fn lock_file_platform_must_agree() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cartfile.resolved"),
            "github \"Alamofire/Alamofire\" \"4.8.2\"\n",
        )
        .unwrap();

        // a cocoapods-only match is never attributed to a carthage lock
        let pods_only = vec![vulnerable(
            "alamofire/alamofire",
            Some("Alamofire"),
            Ecosystem::Cocoapods,
        )];
        assert!(locate_references(dir.path(), &pods_only).is_empty());

        let carthage = vec![vulnerable("alamofire/alamofire", None, Ecosystem::Carthage)];
        let locations = locate_references(dir.path(), &carthage);
        assert_eq!(locations.len(), 1);
    }

    #[test]
    fn subtarget_qualifies_the_match() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("App.swift"), "import Core\n").unwrap();

        let mut with_subtarget = vulnerable("firebase/firebase-ios-sdk", Some("Firebase"), Ecosystem::Cocoapods);
        with_subtarget.library.subtarget = Some("core".into());

        let locations = locate_references(dir.path(), &[with_subtarget]);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].line, 1);
    }

    #[test]
    fn missing_description_falls_back_to_generic_warning() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("App.swift"), "import Alamofire\n").unwrap();

        let mut m = vulnerable("alamofire/alamofire", Some("Alamofire"), Ecosystem::Cocoapods);
        m.vulnerability.description = None;

        let locations = locate_references(dir.path(), &[m]);
        assert_eq!(locations[0].warning, "vulnerable");
    }
}
