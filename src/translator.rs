//! Identity translation from CocoaPods names to canonical upstream names.
//!
//! A pod name like `alamofire` is a package-manager-local identity. The
//! CocoaPods Specs corpus maps it to the git-hosted upstream: the podspec for
//! a concrete version carries the repository URL (from which the canonical
//! `owner/repo` name is derived), the import-module name, and the git tag the
//! pod version corresponds to.
//!
//! Lookups are memoized in `translation.json`, including negative results, so
//! projects with many untranslatable dependencies stay cheap to re-analyse.
//! Negative entries are purged on corpus refresh; positive entries persist.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::store::{HomeStore, TimestampedMap};

/// How deep below the corpus root a package folder can sit. The Specs tree
/// shards package folders under short hash prefixes, so anything deeper is a
/// version folder and is pruned during name search.
pub const SPEC_SEARCH_DEPTH: usize = 4;

/// A resolved canonical identity for an ecosystem-local (name, version) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedLibrary {
    /// Canonical hosting-based `owner/repo` name.
    pub name: String,
    /// Import-module name, when the podspec declares one.
    pub module: Option<String>,
    /// Canonical tag for the requested version; `None` when only a
    /// name-level translation was possible.
    pub version: Option<String>,
}

/// The identity-translation seam between manifest parsing and the spec
/// corpus. Implemented by [`SpecTranslator`]; tests substitute fixed maps.
pub trait Translate {
    fn translate(&mut self, name: &str, version: &str) -> Option<TranslatedLibrary>;
}

/// One cached identity mapping, keyed by the ecosystem-local name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Translation {
    /// Package folder inside the corpus. Absent on a positive entry means
    /// "known unresolvable" and short-circuits future walks.
    pub spec_folder_path: Option<PathBuf>,
    pub library_name: Option<String>,
    pub module_name: Option<String>,
    /// Ecosystem-local version -> canonical tag; grows monotonically.
    pub translated_versions: HashMap<String, String>,
    /// Terminal negative: the name does not exist in the corpus at all.
    pub no_translation: bool,
}

/// Translation cache backed by the CocoaPods Specs checkout.
pub struct SpecTranslator {
    store: HomeStore,
    translations: TimestampedMap<Translation>,
    spec_root: PathBuf,
    search_depth: usize,
    changed: bool,
}

impl SpecTranslator {
    pub fn new(store: HomeStore, spec_directory: &Path) -> Self {
        let translations = store.load(&store.translation_path());
        Self {
            store,
            translations,
            spec_root: spec_directory.join("Specs"),
            search_depth: SPEC_SEARCH_DEPTH,
            changed: false,
        }
    }

    /// Overrides the pruning depth of corpus walks (mainly for tests with
    /// shallow virtual trees).
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// True when the translation data is older than the configured refresh
    /// interval.
    pub fn should_refresh(&self, interval_secs: Option<u64>) -> bool {
        self.translations.is_stale(interval_secs)
    }

    /// Drops all negative entries so they get re-resolved against a freshly
    /// pulled corpus. Positive entries survive.
    pub fn refresh(&mut self) {
        tracing::info!("refreshing translation cache, purging negative entries");
        self.translations
            .entries
            .retain(|_, translation| !translation.no_translation);
        self.translations.last_updated = chrono::Utc::now();
        self.changed = true;
    }

    /// Persists the cache when any entry changed since loading.
    pub fn save_if_changed(&mut self) {
        if !self.changed {
            return;
        }
        if let Err(e) = self
            .store
            .save(&self.store.translation_path(), &self.translations)
        {
            tracing::error!(error = %e, "could not save translation cache");
        } else {
            self.changed = false;
        }
    }

    pub fn entries(&self) -> &HashMap<String, Translation> {
        &self.translations.entries
    }

    fn insert(&mut self, name: &str, translation: Translation) {
        self.translations
            .entries
            .insert(name.to_string(), translation);
        self.changed = true;
    }

    /// Searches the corpus for the package folder of `name`: a directory
    /// whose final path component equals the name case-insensitively.
    /// Hidden filesystem markers never match, and the walk is pruned below
    /// the shard depth so lookup cost stays sub-linear in corpus size.
    fn find_spec_folder(&self, name: &str) -> Option<PathBuf> {
        let target = name.to_lowercase();
        for entry in WalkDir::new(&self.spec_root)
            .max_depth(self.search_depth)
            .into_iter()
            .filter_entry(|e| !is_hidden(e.file_name().to_string_lossy().as_ref()))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_lowercase();
            if file_name == target {
                return Some(entry.into_path());
            }
        }
        None
    }

    /// Walks a package folder for the podspec of `version`, falling back to
    /// any podspec found when no version-tagged one exists.
    fn find_podspec(&self, folder: &Path, version: &str) -> (Option<PathBuf>, Option<PathBuf>) {
        let version_prefix = format!("{}/", version.to_lowercase());
        let mut fallback = None;

        for entry in WalkDir::new(folder)
            .into_iter()
            .filter_entry(|e| !is_hidden(e.file_name().to_string_lossy().as_ref()))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(folder) {
                Ok(rel) => rel.to_string_lossy().to_lowercase(),
                Err(_) => continue,
            };
            if !rel.ends_with("podspec.json") {
                continue;
            }
            if rel.starts_with(&version_prefix) {
                return (Some(entry.into_path()), fallback);
            }
            fallback = Some(entry.into_path());
        }

        (None, fallback)
    }

    /// Resolves a version through the spec folder of a known positive entry,
    /// updating the cached translation. Returns the result to hand back.
    fn translate_via_folder(
        &mut self,
        name: &str,
        version: &str,
        folder: PathBuf,
    ) -> Option<TranslatedLibrary> {
        let (versioned, fallback) = self.find_podspec(&folder, version);

        if let Some(podspec) = versioned {
            let values = podspec_values(&podspec, &["tag", "module_name", "git"]);
            let tag = values.get("tag").cloned();
            let module = values.get("module_name").cloned();
            let library_name = values
                .get("git")
                .and_then(|git| name_from_git_path(git));

            let entry = self.translations.entries.entry(name.to_string()).or_default();
            if let Some(tag) = tag.filter(|t| !t.is_empty()) {
                entry.translated_versions.insert(version.to_string(), tag);
            }
            entry.library_name = library_name.clone();
            entry.module_name = module.clone();
            let translated_version = entry.translated_versions.get(version).cloned();
            self.changed = true;

            return library_name.map(|name| TranslatedLibrary {
                name,
                module,
                version: translated_version,
            });
        }

        if let Some(podspec) = fallback {
            let values = podspec_values(&podspec, &["module_name", "git"]);
            let module = values.get("module_name").cloned();
            if let Some(library_name) = values.get("git").and_then(|git| name_from_git_path(git)) {
                let entry = self.translations.entries.entry(name.to_string()).or_default();
                entry.library_name = Some(library_name.clone());
                entry.module_name = module.clone();
                self.changed = true;

                tracing::debug!(name, library = %library_name, "translation without version tag");
                return Some(TranslatedLibrary {
                    name: library_name,
                    module,
                    version: None,
                });
            }
        }

        // the walk produced nothing; fall back to whatever name the entry
        // already carries
        let entry = self.translations.entries.get(name)?;
        let library_name = entry.library_name.clone()?;
        Some(TranslatedLibrary {
            name: library_name,
            module: entry.module_name.clone(),
            version: None,
        })
    }
}

impl Translate for SpecTranslator {
    fn translate(&mut self, name: &str, version: &str) -> Option<TranslatedLibrary> {
        tracing::debug!(name, version, "translating library");

        if let Some(entry) = self.translations.entries.get(name) {
            if entry.no_translation {
                return None;
            }

            if let Some(tag) = entry.translated_versions.get(version) {
                let library_name = entry.library_name.clone()?;
                return Some(TranslatedLibrary {
                    name: library_name,
                    module: entry.module_name.clone(),
                    version: Some(tag.clone()),
                });
            }

            return match entry.spec_folder_path.clone() {
                Some(folder) => self.translate_via_folder(name, version, folder),
                // positive entry with no resolvable spec folder: a cached
                // negative distinct from the terminal no_translation case
                None => {
                    tracing::debug!(name, "cached unresolvable entry");
                    None
                }
            };
        }

        if let Some(folder) = self.find_spec_folder(name) {
            tracing::debug!(name, folder = %folder.display(), "found spec folder");
            self.insert(
                name,
                Translation {
                    spec_folder_path: Some(folder.clone()),
                    ..Translation::default()
                },
            );
            return self.translate_via_folder(name, version, folder);
        }

        tracing::debug!(name, "no translation found, caching negative entry");
        self.insert(
            name,
            Translation {
                no_translation: true,
                ..Translation::default()
            },
        );
        None
    }
}

fn is_hidden(file_name: &str) -> bool {
    file_name.starts_with('.')
}

/// Extracts `"key": value` string fields from a podspec JSON by line
/// scanning. Missing files or fields degrade to an empty result; podspecs in
/// the corpus are occasionally malformed and must never abort a run.
fn podspec_values(path: &Path, keys: &[&str]) -> HashMap<String, String> {
    let mut values = HashMap::new();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "could not read podspec");
            return values;
        }
    };

    for key in keys {
        let prefix = format!("\"{key}\": ");
        for line in content.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix(&prefix) {
                let value = rest.replace(['"', ','], "");
                values.insert((*key).to_string(), value.trim().to_string());
                break;
            }
        }
    }

    values
}

/// Derives the canonical `owner/repo` name from a podspec git URL: keep what
/// follows the `.com`/`.org` host, drop `.git`, lowercase.
fn name_from_git_path(git: &str) -> Option<String> {
    let tail = if git.contains(".com") {
        git.split(".com").last()
    } else if git.contains(".org") {
        git.split(".org").last()
    } else {
        None
    }?;

    let mut name = tail.replace(".git", "").to_lowercase();
    if !name.is_empty() {
        name.remove(0); // leading '/' or ':' separator
    }
    let name = name.trim().replace(['"', ','], "");
    if name.is_empty() {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_podspec(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("Alamofire.podspec.json"), body).unwrap();
    }

    /// Builds a miniature Specs corpus:
    /// `Specs/a/alamofire/4.8.2/Alamofire.podspec.json`.
    fn corpus(home: &Path) -> PathBuf {
        let spec_dir = home.join("specdir");
        let package = spec_dir.join("Specs").join("a").join("Alamofire");
        write_podspec(
            &package.join("4.8.2"),
            r#"{
  "name": "Alamofire",
  "module_name": "Alamofire",
  "source": {
    "git": "https://github.com/Alamofire/Alamofire.git",
    "tag": "v4.8.2"
  }
}"#,
        );
        fs::write(package.join(".DS_Store"), "junk").unwrap();
        spec_dir
    }

    fn translator(home: &TempDir) -> SpecTranslator {
        let spec_dir = corpus(home.path());
        SpecTranslator::new(HomeStore::new(home.path()), &spec_dir).with_search_depth(3)
    }

    #[test]
    fn git_path_naming() {
        assert_eq!(
            name_from_git_path("https://github.com/Alamofire/Alamofire.git").as_deref(),
            Some("alamofire/alamofire")
        );
        assert_eq!(
            name_from_git_path("https://bitbucket.org/Team/Project.git").as_deref(),
            Some("team/project")
        );
        assert_eq!(name_from_git_path("no host here"), None);
    }

    #[test]
    fn translates_name_module_and_tag() {
        let home = TempDir::new().unwrap();
        let mut translator = translator(&home);

        let translated = translator.translate("alamofire", "4.8.2").unwrap();
        assert_eq!(translated.name, "alamofire/alamofire");
        assert_eq!(translated.module.as_deref(), Some("Alamofire"));
        assert_eq!(translated.version.as_deref(), Some("v4.8.2"));
    }

    #[test]
    fn second_lookup_hits_the_version_cache() {
        let home = TempDir::new().unwrap();
        let mut translator = translator(&home);

        translator.translate("alamofire", "4.8.2").unwrap();
        // remove the corpus; a cache hit must not touch the filesystem
        fs::remove_dir_all(home.path().join("specdir")).unwrap();

        let translated = translator.translate("alamofire", "4.8.2").unwrap();
        assert_eq!(translated.version.as_deref(), Some("v4.8.2"));
    }

    #[test]
    fn unknown_version_falls_back_to_name_only() {
        let home = TempDir::new().unwrap();
        let mut translator = translator(&home);

        let translated = translator.translate("alamofire", "9.9.9").unwrap();
        assert_eq!(translated.name, "alamofire/alamofire");
        assert_eq!(translated.version, None);
    }

    #[test]
    fn missing_package_caches_terminal_negative() {
        let home = TempDir::new().unwrap();
        let mut translator = translator(&home);

        assert!(translator.translate("nonexistent", "1.0").is_none());
        let entry = &translator.entries()["nonexistent"];
        assert!(entry.no_translation);

        // terminal entries short-circuit without touching the corpus
        fs::remove_dir_all(home.path().join("specdir")).unwrap();
        assert!(translator.translate("nonexistent", "1.0").is_none());
    }

    #[test]
    fn refresh_purges_only_negative_entries() {
        let home = TempDir::new().unwrap();
        let mut translator = translator(&home);

        translator.translate("alamofire", "4.8.2").unwrap();
        translator.translate("nonexistent", "1.0");
        assert_eq!(translator.entries().len(), 2);

        translator.refresh();
        assert_eq!(translator.entries().len(), 1);
        assert!(translator.entries().contains_key("alamofire"));
    }

    #[test]
    fn cache_persists_across_instances() {
        let home = TempDir::new().unwrap();
        let spec_dir = corpus(home.path());

        let mut translator =
            SpecTranslator::new(HomeStore::new(home.path()), &spec_dir).with_search_depth(3);
        translator.translate("alamofire", "4.8.2").unwrap();
        translator.save_if_changed();

        let mut reloaded =
            SpecTranslator::new(HomeStore::new(home.path()), &spec_dir).with_search_depth(3);
        fs::remove_dir_all(home.path().join("specdir")).unwrap();
        let translated = reloaded.translate("alamofire", "4.8.2").unwrap();
        assert_eq!(translated.name, "alamofire/alamofire");
    }

    #[test]
    fn hidden_marker_files_never_match() {
        let home = TempDir::new().unwrap();
        let spec_dir = home.path().join("specdir");
        fs::create_dir_all(spec_dir.join("Specs").join("a")).unwrap();
        fs::write(spec_dir.join("Specs").join("a").join(".ds_store"), "x").unwrap();

        let mut translator =
            SpecTranslator::new(HomeStore::new(home.path()), &spec_dir).with_search_depth(3);
        assert!(translator.translate("ds_store", "1.0").is_none());
    }
}
