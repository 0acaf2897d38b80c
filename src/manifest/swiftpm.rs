//! `Package.resolved` parsing.
//!
//! SwiftPM has used two resolved formats: version 1 nests the pin list under
//! an `object` key and names the repository with `repositoryURL`; version 2
//! lifts `pins` to the top level and uses `identity`/`location`. Both carry
//! the resolved version under `state`.

use serde::Deserialize;

use crate::manifest::name_from_url;
use crate::model::{Ecosystem, Library};

#[derive(Deserialize)]
struct ResolvedV1 {
    object: ObjectV1,
}

#[derive(Deserialize)]
struct ObjectV1 {
    #[serde(default)]
    pins: Vec<PinV1>,
}

#[derive(Deserialize)]
struct PinV1 {
    package: Option<String>,
    #[serde(rename = "repositoryURL")]
    repository_url: Option<String>,
    state: Option<PinState>,
}

#[derive(Deserialize)]
struct ResolvedV2 {
    #[serde(default)]
    pins: Vec<PinV2>,
}

#[derive(Deserialize)]
struct PinV2 {
    identity: Option<String>,
    location: Option<String>,
    state: Option<PinState>,
}

#[derive(Deserialize)]
struct PinState {
    version: Option<String>,
}

struct RawPin {
    module: Option<String>,
    url: Option<String>,
    version: Option<String>,
}

fn raw_pins(content: &str) -> Vec<RawPin> {
    if let Ok(v1) = serde_json::from_str::<ResolvedV1>(content) {
        return v1
            .object
            .pins
            .into_iter()
            .map(|pin| RawPin {
                module: pin.package,
                url: pin.repository_url,
                version: pin.state.and_then(|s| s.version),
            })
            .collect();
    }

    match serde_json::from_str::<ResolvedV2>(content) {
        Ok(v2) => v2
            .pins
            .into_iter()
            .map(|pin| RawPin {
                module: pin.identity,
                url: pin.location,
                version: pin.state.and_then(|s| s.version),
            })
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "could not parse Package.resolved");
            Vec::new()
        }
    }
}

/// Parses a `Package.resolved` into libraries.
///
/// The canonical name comes from the repository URL when it yields an
/// `owner/repo` pair, falling back to the declared package name; the declared
/// name is kept separately as the module.
pub fn parse_package_resolved(content: &str) -> Vec<Library> {
    let mut libraries = Vec::new();

    for pin in raw_pins(content) {
        let name = pin
            .url
            .as_deref()
            .and_then(name_from_url)
            .or_else(|| pin.module.clone());
        let Some(name) = name else {
            continue;
        };

        let version = pin.version.unwrap_or_default();
        let mut library = Library::new(name, version, Ecosystem::Swiftpm);
        library.module = pin.module;

        tracing::debug!(name = %library.name, version = %library.version, "found swiftpm pin");
        libraries.push(library);
    }

    libraries
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = r#"{
      "object": {
        "pins": [
          {
            "package": "Commandant",
            "repositoryURL": "https://github.com/Carthage/Commandant.git",
            "state": { "branch": null, "revision": "2cd0210f", "version": "0.16.0" }
          },
          {
            "package": "Nimble",
            "repositoryURL": "bad-url",
            "state": { "version": "7.0.2" }
          }
        ]
      },
      "version": 1
    }"#;

    const V2: &str = r#"{
      "pins": [
        {
          "identity": "swift-argument-parser",
          "kind": "remoteSourceControl",
          "location": "https://github.com/apple/swift-argument-parser",
          "state": { "revision": "abc", "version": "1.2.0" }
        }
      ],
      "version": 2
    }"#;

    #[test]
    fn parses_v1_pins() {
        let libs = parse_package_resolved(V1);
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[0].name, "carthage/commandant");
        assert_eq!(libs[0].module.as_deref(), Some("Commandant"));
        assert_eq!(libs[0].version, "0.16.0");
        assert_eq!(libs[0].ecosystem, Ecosystem::Swiftpm);
    }

    #[test]
    fn falls_back_to_package_name_without_usable_url() {
        let libs = parse_package_resolved(V1);
        assert_eq!(libs[1].name, "nimble");
        assert_eq!(libs[1].version, "7.0.2");
    }

    #[test]
    fn parses_v2_pins() {
        let libs = parse_package_resolved(V2);
        assert_eq!(libs.len(), 1);
        assert_eq!(libs[0].name, "apple/swift-argument-parser");
        assert_eq!(libs[0].module.as_deref(), Some("swift-argument-parser"));
        assert_eq!(libs[0].version, "1.2.0");
    }

    #[test]
    fn unparseable_document_yields_nothing() {
        assert!(parse_package_resolved("not json").is_empty());
        assert!(parse_package_resolved("{}").is_empty());
    }
}
