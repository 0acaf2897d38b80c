//! CPE product-identifier resolution.
//!
//! Maps a canonical `owner/repo` library name to a CPE 2.3 identifier by
//! scanning the official NVD CPE dictionary. Results are memoized in
//! `cpes.json` as a two-state cache: an absent key means "never looked up",
//! a present `None` is a cached not-found. Cached identifiers are always
//! product-level — the version field is rewritten to a wildcard, and version
//! discrimination happens later during vulnerability matching.

use anyhow::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::store::{HomeStore, TimestampedMap};

const CPE23_ITEM_MARKER: &str = "<cpe-23:cpe23-item name=\"";
const CPE_ITEM_END: &str = "</cpe-item>";
const REFERENCE_MARKER: &str = "<reference href=\"";

/// Index of the version field in a colon-delimited CPE 2.3 string.
const CPE_VERSION_FIELD: usize = 5;

/// Resolver from canonical library names to product-level CPE identifiers.
pub struct CpeFinder {
    store: HomeStore,
    cache: TimestampedMap<Option<String>>,
    dictionary_path: PathBuf,
    cache_only: bool,
    changed: bool,
}

impl CpeFinder {
    pub fn new(store: HomeStore) -> Self {
        let cache = store.load(&store.cpe_cache_path());
        let dictionary_path = store.cpe_dictionary_path();
        Self {
            store,
            cache,
            dictionary_path,
            cache_only: false,
            changed: false,
        }
    }

    /// Disables the on-demand dictionary scan; uncached names resolve to
    /// nothing. Useful once the cache has been bulk-built.
    pub fn with_cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    pub fn should_refresh(&self, interval_secs: Option<u64>) -> bool {
        self.cache.is_stale(interval_secs)
    }

    /// Drops cached not-found entries so they get re-resolved against a
    /// freshly downloaded dictionary. Resolved identifiers survive.
    pub fn refresh(&mut self) {
        tracing::info!("refreshing cpe cache, purging not-found entries");
        self.cache.entries.retain(|_, value| value.is_some());
        self.cache.last_updated = chrono::Utc::now();
        self.changed = true;
    }

    pub fn save_if_changed(&mut self) {
        if !self.changed {
            return;
        }
        if let Err(e) = self.store.save(&self.store.cpe_cache_path(), &self.cache) {
            tracing::error!(error = %e, "could not save cpe cache");
        } else {
            self.changed = false;
        }
    }

    /// All cached (name, identifier) pairs with a resolved identifier.
    pub fn resolved_entries(&self) -> impl Iterator<Item = (&String, &String)> {
        self.cache
            .entries
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|cpe| (name, cpe)))
    }

    fn cache_negative(&mut self, name: &str) -> Option<String> {
        self.cache.entries.insert(name.to_string(), None);
        self.changed = true;
        None
    }

    /// Resolves the product-level CPE for a canonical library name.
    pub fn find_cpe(&mut self, name: &str) -> Option<String> {
        tracing::debug!(name, "finding cpe");

        if let Some(cached) = self.cache.entries.get(name) {
            tracing::debug!(name, cached = ?cached, "cpe cache hit");
            return cached.clone();
        }

        // only hosting-style owner/repo names can match dictionary titles
        if !name.contains('/') {
            tracing::debug!(name, "name is not owner/repo shaped, caching not-found");
            return self.cache_negative(name);
        }

        if self.cache_only {
            tracing::debug!(name, "cache-only mode, skipping dictionary scan");
            return None;
        }

        let file = match File::open(&self.dictionary_path) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(path = %self.dictionary_path.display(), error = %e,
                    "cpe dictionary not readable");
                return self.cache_negative(name);
            }
        };

        let needle = name.to_lowercase();
        let mut item_found = false;

        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let line = line.to_lowercase();

            if line.contains(&needle) {
                item_found = true;
            }

            if item_found {
                if line.contains(CPE_ITEM_END) {
                    item_found = false;
                }

                if let Some(cpe) = extract_cpe23(&line) {
                    let cleaned = wildcard_version(&cpe);
                    tracing::debug!(name, cpe = %cleaned, "resolved cpe from dictionary");
                    self.cache
                        .entries
                        .insert(name.to_string(), Some(cleaned.clone()));
                    self.changed = true;
                    return Some(cleaned);
                }
            }
        }

        self.cache_negative(name)
    }

    /// Bulk index build: walks every dictionary entry, derives canonical
    /// names from its GitHub/Bitbucket reference URLs, and caches the
    /// wildcarded identifier under each derived name. The cache is
    /// checkpointed to disk every `checkpoint_every` new entries so a long
    /// build survives interruption. Returns the number of entries added.
    pub fn build_index(&mut self, checkpoint_every: usize) -> Result<usize> {
        let file = File::open(&self.dictionary_path)?;
        let mut block_names: Vec<String> = Vec::new();
        let mut added = 0usize;

        for line in BufReader::new(file).lines() {
            let line = line?;

            if line.contains("<cpe-item ") {
                block_names.clear();
            }

            if let Some(url) = extract_reference(&line) {
                if let Some(name) = owner_repo_from_url(&url) {
                    if !block_names.contains(&name) {
                        block_names.push(name);
                    }
                }
            }

            if let Some(cpe) = extract_cpe23(&line.to_lowercase()) {
                let cleaned = wildcard_version(&cpe);
                for name in block_names.drain(..) {
                    if self.cache.entries.contains_key(&name) {
                        continue;
                    }
                    self.cache.entries.insert(name, Some(cleaned.clone()));
                    self.changed = true;
                    added += 1;

                    if checkpoint_every > 0 && added % checkpoint_every == 0 {
                        self.store.save(&self.store.cpe_cache_path(), &self.cache)?;
                        tracing::info!(added, "checkpointed cpe index");
                    }
                }
            }
        }

        self.save_if_changed();
        tracing::info!(added, "cpe index build finished");
        Ok(added)
    }
}

fn extract_cpe23(line: &str) -> Option<String> {
    let rest = line.split(CPE23_ITEM_MARKER).nth(1)?;
    Some(rest.trim_end().trim_end_matches("\"/>").to_string())
}

fn extract_reference(line: &str) -> Option<String> {
    let rest = line.split(REFERENCE_MARKER).nth(1)?;
    Some(rest.split('"').next()?.to_string())
}

/// Rewrites the version field of a CPE 2.3 string to a wildcard so the
/// cached identifier stays product-level.
fn wildcard_version(cpe: &str) -> String {
    let mut fields: Vec<&str> = cpe.split(':').collect();
    if fields.len() > CPE_VERSION_FIELD {
        fields[CPE_VERSION_FIELD] = "*";
    }
    fields.join(":")
}

/// Extracts a lowercased `owner/repo` pair from a GitHub or Bitbucket URL.
fn owner_repo_from_url(url: &str) -> Option<String> {
    let rest = url
        .split_once("github.com/")
        .or_else(|| url.split_once("bitbucket.org/"))
        .map(|(_, rest)| rest)?;

    let mut parts = rest.split('/');
    let owner = parts.next()?.trim();
    let repo = parts
        .next()?
        .trim()
        .trim_end_matches(".git")
        .split(['#', '?'])
        .next()?;

    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("{}/{}", owner, repo).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DICTIONARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cpe-list>
  <cpe-item name="cpe:/a:alamofireswift:alamofire:4.8.2">
    <title xml:lang="en-US">Alamofire/Alamofire 4.8.2</title>
    <references>
      <reference href="https://github.com/Alamofire/Alamofire">Product</reference>
    </references>
    <cpe-23:cpe23-item name="cpe:2.3:a:alamofireswift:alamofire:4.8.2:*:*:*:*:*:*:*"/>
  </cpe-item>
  <cpe-item name="cpe:/a:other:tool:1.0">
    <title xml:lang="en-US">Unrelated Tool 1.0</title>
    <references>
      <reference href="https://example.com/tool">Vendor</reference>
    </references>
    <cpe-23:cpe23-item name="cpe:2.3:a:other:tool:1.0:*:*:*:*:*:*:*"/>
  </cpe-item>
</cpe-list>
"#;

    fn finder(home: &TempDir) -> CpeFinder {
        let store = HomeStore::new(home.path());
        fs::create_dir_all(home.path()).unwrap();
        fs::write(store.cpe_dictionary_path(), DICTIONARY).unwrap();
        CpeFinder::new(store)
    }

    #[test]
    fn resolves_and_wildcards_version_field() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home);

        let cpe = finder.find_cpe("alamofire/alamofire").unwrap();
        assert_eq!(cpe, "cpe:2.3:a:alamofireswift:alamofire:*:*:*:*:*:*:*:*");
    }

    #[test]
    fn names_without_slash_are_cached_negative() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home);

        assert!(finder.find_cpe("alamofire").is_none());
        assert!(finder.cache.entries.contains_key("alamofire"));
        assert_eq!(finder.cache.entries["alamofire"], None);
    }

    #[test]
    fn negative_result_scans_only_once() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home);

        assert!(finder.find_cpe("unknown/library").is_none());
        // remove the dictionary: a second lookup must hit the cached None
        fs::remove_file(finder.store.cpe_dictionary_path()).unwrap();
        assert!(finder.find_cpe("unknown/library").is_none());
    }

    #[test]
    fn cache_only_mode_never_scans_and_never_caches() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home).with_cache_only(true);

        assert!(finder.find_cpe("alamofire/alamofire").is_none());
        assert!(!finder.cache.entries.contains_key("alamofire/alamofire"));
    }

    #[test]
    fn bulk_index_builds_from_reference_urls() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home);

        let added = finder.build_index(100).unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            finder.find_cpe("alamofire/alamofire").as_deref(),
            Some("cpe:2.3:a:alamofireswift:alamofire:*:*:*:*:*:*:*:*")
        );
    }

    #[test]
    fn refresh_purges_only_not_found_entries() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home);

        finder.find_cpe("alamofire/alamofire").unwrap();
        finder.find_cpe("unknown/library");
        assert_eq!(finder.cache.entries.len(), 2);

        finder.refresh();
        assert_eq!(finder.cache.entries.len(), 1);
        assert!(finder.cache.entries.contains_key("alamofire/alamofire"));
    }

    #[test]
    fn cache_persists_across_instances() {
        let home = TempDir::new().unwrap();
        let mut finder = finder(&home);
        finder.find_cpe("alamofire/alamofire").unwrap();
        finder.save_if_changed();

        let store = HomeStore::new(home.path());
        fs::remove_file(store.cpe_dictionary_path()).unwrap();
        let mut reloaded = CpeFinder::new(store);
        assert!(reloaded.find_cpe("alamofire/alamofire").is_some());
    }
}
