//! The analysis orchestrator.
//!
//! Wires the pipeline together: manifest discovery, identity translation,
//! CPE resolution, vulnerability queries and version matching. Missing
//! ecosystems are skipped and query failures degrade to the cached data;
//! the only fatal condition is a project root that cannot be read.

mod nvd;

pub use nvd::NvdChecker;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::cpe::CpeFinder;
use crate::error::{Error, Result};
use crate::fetch::{DictionaryFetcher, SpecRepo};
use crate::locator;
use crate::manifest;
use crate::matcher;
use crate::model::{CveData, Ecosystem, FileLocation, Library, VulnerableUse};
use crate::store::{HomeStore, TimestampedMap};
use crate::translator::SpecTranslator;

/// Provider of vulnerability data for a product-level CPE identifier.
#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn query(&self, cpe: &str) -> AnyResult<Vec<CveData>>;
}

/// One canonical library with every version of it found in the project.
#[derive(Debug, Clone)]
pub struct AnalysedLibrary {
    pub name: String,
    pub versions: Vec<Library>,
}

/// Groups used libraries by canonical name so identity resolution and
/// vulnerability queries run once per library instead of once per version.
pub fn group_libraries(libraries: &[Library]) -> Vec<AnalysedLibrary> {
    let mut grouped: Vec<AnalysedLibrary> = Vec::new();

    for library in libraries {
        match grouped.iter_mut().find(|g| g.name == library.name) {
            Some(group) => group.versions.push(library.clone()),
            None => grouped.push(AnalysedLibrary {
                name: library.name.clone(),
                versions: vec![library.clone()],
            }),
        }
    }

    grouped
}

pub struct DependencyChecker {
    settings: Settings,
    store: HomeStore,
    translator: SpecTranslator,
    cpe_finder: CpeFinder,
    source: Box<dyn VulnerabilitySource>,
    vulnerabilities: TimestampedMap<Vec<CveData>>,
    vulnerabilities_changed: bool,
    platform: Option<Ecosystem>,
    only_direct: bool,
}

impl DependencyChecker {
    pub fn new(settings: Settings) -> Self {
        let source = Box::new(NvdChecker::new(settings.nvd_api_url.clone()));
        Self::with_source(settings, source)
    }

    /// Builds a checker with a custom vulnerability source. Tests use this
    /// to run the pipeline against canned data.
    pub fn with_source(settings: Settings, source: Box<dyn VulnerabilitySource>) -> Self {
        let store = HomeStore::new(settings.home_folder());
        let translator = SpecTranslator::new(store.clone(), &settings.spec_directory());
        let cpe_finder = CpeFinder::new(store.clone());
        let mut vulnerabilities: TimestampedMap<Vec<CveData>> =
            store.load(&Self::vulnerabilities_path(&store));
        let mut vulnerabilities_changed = false;

        if vulnerabilities.is_stale(settings.vulnerability_refresh_interval_secs) {
            tracing::info!("discarding stale vulnerability query cache");
            vulnerabilities = TimestampedMap::default();
            vulnerabilities_changed = true;
        }

        Self {
            settings,
            store,
            translator,
            cpe_finder,
            source,
            vulnerabilities,
            vulnerabilities_changed,
            platform: None,
            only_direct: false,
        }
    }

    /// Restricts analysis to one ecosystem.
    pub fn with_platform(mut self, platform: Option<Ecosystem>) -> Self {
        self.platform = platform;
        self
    }

    /// Restricts analysis to directly declared dependencies.
    pub fn with_only_direct(mut self, only_direct: bool) -> Self {
        self.only_direct = only_direct;
        self
    }

    /// Disables on-demand CPE dictionary scans.
    pub fn with_cache_only(mut self, cache_only: bool) -> Self {
        self.cpe_finder = self.cpe_finder.with_cache_only(cache_only);
        self
    }

    fn vulnerabilities_path(store: &HomeStore) -> PathBuf {
        store.dir().join("vulnerabilities.json")
    }

    /// Brings the external resources up to date: clones or pulls the Specs
    /// checkout, downloads the CPE dictionary, and purges stale negative
    /// cache entries. Every failure here degrades to the local state.
    pub async fn sync_resources(&mut self) {
        let repo = SpecRepo::new(
            self.settings.spec_directory(),
            self.settings.spec_repository_url.clone(),
        );
        let fetcher = DictionaryFetcher::new(self.settings.cpe_dictionary_url.clone());
        let dictionary = self.store.cpe_dictionary_path();

        if !repo.is_checked_out() {
            repo.clone_repo().await;
        } else if self
            .translator
            .should_refresh(self.settings.spec_refresh_interval_secs)
        {
            repo.pull().await;
            self.translator.refresh();
        }

        if !dictionary.exists() {
            fetcher.ensure(&dictionary).await;
        } else if self
            .cpe_finder
            .should_refresh(self.settings.cpe_refresh_interval_secs)
        {
            fetcher.refresh(&dictionary).await;
            self.cpe_finder.refresh();
        }
    }

    /// Persists every dirty cache.
    pub fn save_caches(&mut self) {
        self.translator.save_if_changed();
        self.cpe_finder.save_if_changed();
        if self.vulnerabilities_changed {
            let path = Self::vulnerabilities_path(&self.store);
            if let Err(e) = self.store.save(&path, &self.vulnerabilities) {
                tracing::error!(error = %e, "could not save vulnerability cache");
            } else {
                self.vulnerabilities_changed = false;
            }
        }
    }

    /// Enumerates the libraries a project uses, per its resolved manifests.
    ///
    /// Fails only when the project root itself cannot be read; a missing
    /// manifest just skips that ecosystem.
    pub fn dependencies(&mut self, root: &Path) -> Result<Vec<Library>> {
        fs::read_dir(root).map_err(|source| Error::ProjectRoot {
            path: root.to_path_buf(),
            source,
        })?;

        let mut libraries = Vec::new();
        for file in manifest::discover(root) {
            if let Some(platform) = self.platform {
                if file.ecosystem != platform {
                    continue;
                }
            }
            if !file.is_resolved() {
                tracing::info!(ecosystem = %file.ecosystem, "no resolved manifest, skipping");
                continue;
            }
            libraries.extend(manifest::parse_resolved(
                &file,
                &mut self.translator,
                self.only_direct,
            ));
        }

        self.translator.save_if_changed();
        if let Err(e) = self.store.save_project_libraries(root, &libraries) {
            tracing::error!(error = %e, "could not record project libraries");
        }

        tracing::info!(count = libraries.len(), "libraries found");
        Ok(libraries)
    }

    async fn query_vulnerabilities(&mut self, cpe: &str) -> Vec<CveData> {
        if let Some(cached) = self.vulnerabilities.entries.get(cpe) {
            tracing::debug!(cpe, "vulnerability cache hit");
            return cached.clone();
        }

        match self.source.query(cpe).await {
            Ok(found) => {
                self.vulnerabilities
                    .entries
                    .insert(cpe.to_string(), found.clone());
                self.vulnerabilities_changed = true;
                found
            }
            Err(e) => {
                tracing::error!(source = self.source.name(), cpe, error = %e,
                    "vulnerability query failed, treating as no known vulnerabilities");
                Vec::new()
            }
        }
    }

    /// Full analysis of one project folder: which used library versions fall
    /// inside a known vulnerable range.
    pub async fn analyse_folder(&mut self, root: &Path) -> Result<Vec<VulnerableUse>> {
        tracing::info!(path = %root.display(), "analysing project");
        let libraries = self.dependencies(root)?;
        let matches = self.analyse_libraries(&libraries).await;
        self.save_caches();
        Ok(matches)
    }

    /// Matches a set of used libraries against the vulnerability data.
    pub async fn analyse_libraries(&mut self, libraries: &[Library]) -> Vec<VulnerableUse> {
        let mut matches = Vec::new();

        for group in group_libraries(libraries) {
            let Some(cpe) = self.cpe_finder.find_cpe(&group.name) else {
                tracing::debug!(library = %group.name, "no cpe, skipping");
                continue;
            };

            let vulnerabilities = self.query_vulnerabilities(&cpe).await;
            matches.extend(matcher::vulnerable_uses(&group.versions, &vulnerabilities));
        }

        matches
    }

    /// Re-analyses every library recorded from past project runs. Used to
    /// keep long-lived caches warm without re-parsing the projects.
    pub async fn analyse_all_libraries(&mut self) -> Vec<VulnerableUse> {
        let projects: crate::store::Projects = self.store.load(&self.store.projects_path());
        let mut libraries: Vec<Library> = Vec::new();

        for recorded in projects.used_libraries.into_values() {
            for library in recorded {
                if !libraries
                    .iter()
                    .any(|l| l.name == library.name && l.version == library.version)
                {
                    libraries.push(library);
                }
            }
        }

        tracing::info!(count = libraries.len(), "re-analysing recorded libraries");
        let matches = self.analyse_libraries(&libraries).await;
        self.save_caches();
        matches
    }

    /// Analysis plus source location: file/line positions that reference the
    /// flagged libraries.
    pub async fn analyse_sources(&mut self, root: &Path) -> Result<Vec<FileLocation>> {
        let matches = self.analyse_folder(root).await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        Ok(locator::locate_references(root, &matches))
    }

    /// Translation of a single ecosystem-local (name, version) pair, for the
    /// standalone subcommand.
    pub fn translate(&mut self, name: &str, version: &str) -> Option<crate::translator::TranslatedLibrary> {
        use crate::translator::Translate;
        let translated = self.translator.translate(name, version);
        self.translator.save_if_changed();
        translated
    }

    /// Single CPE lookup, for the standalone subcommand.
    pub fn find_cpe(&mut self, name: &str) -> Option<String> {
        let cpe = self.cpe_finder.find_cpe(&name.to_lowercase());
        self.cpe_finder.save_if_changed();
        cpe
    }

    /// Single vulnerability query against a raw CPE string.
    pub async fn query_cve(&mut self, cpe: &str) -> Vec<CveData> {
        let found = self.query_vulnerabilities(cpe).await;
        self.save_caches();
        found
    }

    /// Bulk CPE index build from the full dictionary.
    pub fn build_cpe_index(&mut self, checkpoint_every: usize) -> AnyResult<usize> {
        let added = self.cpe_finder.build_index(checkpoint_every)?;
        Ok(added)
    }

    /// Cached translations and CPE mappings, for inspection.
    pub fn cache_summary(&self) -> (HashMap<String, String>, Vec<(String, String)>) {
        let translations = self
            .translator
            .entries()
            .iter()
            .filter_map(|(name, t)| {
                t.library_name
                    .as_ref()
                    .map(|canonical| (name.clone(), canonical.clone()))
            })
            .collect();
        let cpes = self
            .cpe_finder
            .resolved_entries()
            .map(|(name, cpe)| (name.clone(), cpe.clone()))
            .collect();
        (translations, cpes)
    }
}
