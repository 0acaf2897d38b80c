//! `Podfile.lock` parsing.
//!
//! The lock file has two sections of interest. `PODS:` lists every resolved
//! pod as `- Name (version)` entries; `DEPENDENCIES:` repeats only the pods
//! declared directly by the project. Historical CocoaPods versions indent the
//! dash entries differently, so the leading whitespace is sampled from the
//! first list item and lines with deeper indentation (transitive
//! sub-dependencies) are ignored.

use crate::model::{Ecosystem, Library};
use crate::translator::Translate;

/// Samples the whitespace prefix used before top-level `-` entries.
///
/// Falls back to the empty string when no dash-prefixed line exists.
fn detect_dash_prefix(lines: &[&str]) -> String {
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with("PODS:") {
            continue;
        }
        if trimmed.starts_with('-') {
            return line.split('-').next().unwrap_or("").to_string();
        }
    }
    String::new()
}

/// Collects the lowercased names listed under `DEPENDENCIES:`.
fn declared_pods(lines: &[&str], dash_prefix: &str) -> Vec<String> {
    let entry_prefix = format!("{dash_prefix}- ");
    let mut declared = Vec::new();
    let mut in_dependencies = false;

    for line in lines {
        if line.starts_with("DEPENDENCIES:") {
            in_dependencies = true;
            continue;
        }
        if !in_dependencies {
            continue;
        }

        if let Some(rest) = line.strip_prefix(&entry_prefix) {
            if let Some(name) = rest.split_whitespace().next() {
                declared.push(name.replace('"', "").to_lowercase());
            }
        }

        if line.trim().is_empty() || line.starts_with("SPEC REPOS:") {
            break;
        }
    }

    declared
}

/// Parses a `Podfile.lock` into libraries, canonicalizing each entry through
/// the identity translator.
pub fn parse_podfile_lock(
    content: &str,
    translator: &mut dyn Translate,
    only_direct: bool,
) -> Vec<Library> {
    let lines: Vec<&str> = content.lines().collect();
    let dash_prefix = detect_dash_prefix(&lines);
    let entry_prefix = format!("{dash_prefix}- ");
    let declared = declared_pods(&lines, &dash_prefix);

    let mut libraries = Vec::new();

    for line in &lines {
        if line.starts_with("DEPENDENCIES:") {
            break;
        }
        if line.starts_with("PODS:") {
            continue;
        }

        // Deeper-indented lines are sub-dependency annotations, not entries.
        let Some(rest) = line.strip_prefix(&entry_prefix) else {
            continue;
        };

        let rest = rest.to_lowercase();
        let components: Vec<&str> = rest.split_whitespace().collect();
        if components.len() < 2 {
            continue;
        }

        let mut name = components[0].replace(['"', '\''], "");
        let version = {
            let v = components[1].replace([':', '"'], "");
            // strip the surrounding parentheses
            let mut chars = v.chars();
            chars.next();
            chars.next_back();
            chars.as_str().to_string()
        };

        let direct = declared.contains(&name);
        if !direct && only_direct {
            continue;
        }

        let mut subtarget = None;
        if let Some((base, sub)) = name.split_once('/') {
            subtarget = Some(sub.to_string());
            name = base.to_string();
        }

        let pod_name = name.clone();
        let mut module = None;
        let mut resolved_version = version.clone();
        if let Some(translation) = translator.translate(&name, &version) {
            name = translation.name;
            if let Some(translated) = translation.version {
                resolved_version = translated;
            }
            module = translation.module;
        }

        let mut library =
            Library::new(name, resolved_version, Ecosystem::Cocoapods).with_direct(direct);
        library.module = Some(module.unwrap_or(pod_name));
        library.subtarget = subtarget;

        tracing::debug!(name = %library.name, version = %library.version, "found pod");
        libraries.push(library);
    }

    libraries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::{Translate, TranslatedLibrary};
    use std::collections::HashMap;

    /// Translator stub backed by a fixed map.
    #[derive(Default)]
    struct MapTranslator {
        map: HashMap<String, TranslatedLibrary>,
    }

    impl Translate for MapTranslator {
        fn translate(&mut self, name: &str, _version: &str) -> Option<TranslatedLibrary> {
            self.map.get(name).cloned()
        }
    }

    const LOCK: &str = "\
PODS:
  - Alamofire (4.8.2)
  - SwiftyJSON (5.0.0)
  - Firebase/Core (6.2.0):
    - Firebase/CoreOnly
    - FirebaseAnalytics (= 6.0.1)

DEPENDENCIES:
  - Alamofire
  - \"Firebase/Core\"

SPEC REPOS:
  trunk:
    - Alamofire
";

    #[test]
    fn parses_names_versions_and_directness() {
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(LOCK, &mut translator, false);
        assert_eq!(libs.len(), 3);

        let alamofire = &libs[0];
        assert_eq!(alamofire.name, "alamofire");
        assert_eq!(alamofire.version, "4.8.2");
        assert_eq!(alamofire.direct, Some(true));
        assert_eq!(alamofire.module.as_deref(), Some("alamofire"));

        let swifty = &libs[1];
        assert_eq!(swifty.direct, Some(false));
    }

    #[test]
    fn splits_subspec_from_name() {
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(LOCK, &mut translator, false);
        let firebase = &libs[2];
        assert_eq!(firebase.name, "firebase");
        assert_eq!(firebase.subtarget.as_deref(), Some("core"));
        assert_eq!(firebase.version, "6.2.0");
        assert_eq!(firebase.direct, Some(true));
    }

    #[test]
    fn subspec_split_matches_expected_shape() {
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(
            "PODS:\n  - Alamofire/NSURLSession (4.8.2)\n",
            &mut translator,
            false,
        );
        assert_eq!(libs[0].name, "alamofire");
        assert_eq!(libs[0].subtarget.as_deref(), Some("nsurlsession"));
    }

    #[test]
    fn only_direct_filters_transitive_entries() {
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(LOCK, &mut translator, true);
        let names: Vec<&str> = libs.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["alamofire", "firebase"]);
    }

    #[test]
    fn translation_rewrites_name_module_and_version() {
        let mut translator = MapTranslator::default();
        translator.map.insert(
            "alamofire".into(),
            TranslatedLibrary {
                name: "alamofire/alamofire".into(),
                module: Some("Alamofire".into()),
                version: Some("v4.8.2".into()),
            },
        );

        let libs = parse_podfile_lock(LOCK, &mut translator, false);
        let alamofire = &libs[0];
        assert_eq!(alamofire.name, "alamofire/alamofire");
        assert_eq!(alamofire.version, "v4.8.2");
        assert_eq!(alamofire.module.as_deref(), Some("Alamofire"));
    }

    #[test]
    fn detects_wider_indentation() {
        let lock = "\
PODS:
    - Alamofire (4.8.2)
      - SubDep (1.0)

DEPENDENCIES:
    - Alamofire
";
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(lock, &mut translator, false);
        assert_eq!(libs.len(), 1);
        assert_eq!(libs[0].name, "alamofire");
        assert_eq!(libs[0].direct, Some(true));
    }

    // With no dash-prefixed line before DEPENDENCIES: the sampled prefix is
    // empty; this pins the (unspecified) fallback behavior.
    #[test]
    fn prefix_sampling_empty() {
        let lock = "PODS:\nDEPENDENCIES:\n";
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(lock, &mut translator, false);
        assert!(libs.is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let lock = "PODS:\n  - LoneName\n  - Good (1.0.0)\n";
        let mut translator = MapTranslator::default();
        let libs = parse_podfile_lock(lock, &mut translator, false);
        assert_eq!(libs.len(), 1);
        assert_eq!(libs[0].name, "good");
    }
}
