//! `Cartfile.resolved` parsing.
//!
//! Each line is `origin "owner/repo-or-url" "version"`, where origin is
//! `github`, `git` or `binary`. Carthage names are already hosting-based, so
//! no translation step is needed; URLs are normalized to `owner/repo` form.

use crate::model::{Ecosystem, Library};

/// Normalizes the second Cartfile token to `owner/repo` form.
fn normalize_name(raw: &str) -> String {
    let mut name = raw.replace('"', "");

    let components: Vec<&str> = name.split('/').collect();
    if components.len() >= 2 {
        name = format!(
            "{}/{}",
            components[components.len() - 2],
            components[components.len() - 1]
        );
    }

    if let Some(stripped) = name.strip_suffix(".git") {
        name = stripped.to_string();
    }

    // SSH-style remotes carry `git@host:owner` in the first path component.
    if name.starts_with("git@") {
        if let Some((_, rest)) = name.split_once(':') {
            name = rest.to_string();
        }
    }

    name
}

/// Parses a `Cartfile.resolved` into libraries, skipping malformed lines.
pub fn parse_cartfile_resolved(content: &str) -> Vec<Library> {
    let mut libraries = Vec::new();

    for line in content.lines() {
        let components: Vec<&str> = line.split_whitespace().collect();
        if components.len() != 3 {
            continue;
        }

        let name = normalize_name(components[1]);
        let version = components[2].replace('"', "");

        tracing::debug!(name = %name, version = %version, "found carthage dependency");
        libraries.push(Library::new(name, version, Ecosystem::Carthage));
    }

    libraries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_github_entries() {
        let content = "\
github \"Alamofire/Alamofire\" \"4.7.3\"
github \"Quick/Nimble\" \"v7.1.3\"
";
        let libs = parse_cartfile_resolved(content);
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[0].name, "alamofire/alamofire");
        assert_eq!(libs[0].version, "4.7.3");
        assert_eq!(libs[0].ecosystem, Ecosystem::Carthage);
        assert_eq!(libs[1].version, "v7.1.3");
    }

    #[test]
    fn normalizes_full_urls() {
        let content = "git \"https://github.com/SwiftyJSON/SwiftyJSON.git\" \"4.1.0\"\n";
        let libs = parse_cartfile_resolved(content);
        assert_eq!(libs[0].name, "swiftyjson/swiftyjson");
    }

    #[test]
    fn normalizes_ssh_remotes() {
        let content = "\
git \"git@github.com:owner/project.git\" \"1.0\"
git \"git@bitbucket.org:team/project.git\" \"1.0\"
";
        let libs = parse_cartfile_resolved(content);
        assert_eq!(libs[0].name, "owner/project");
        assert_eq!(libs[1].name, "team/project");
    }

    #[test]
    fn skips_malformed_lines() {
        let content = "\

github \"Alamofire/Alamofire\" \"4.7.3\"
this line is not a dependency entry at all
github \"Quick/Quick\" \"v1.3.1\"
";
        let libs = parse_cartfile_resolved(content);
        assert_eq!(libs.len(), 2);
    }
}
