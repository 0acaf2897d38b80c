//! Persistent JSON documents under the depcheck home folder.
//!
//! Three documents live here: `translation.json` (spec-corpus identity
//! translations), `cpes.json` (product-identifier cache) and `projects.json`
//! (last analyzed libraries per project). Each wraps its data with a
//! `lastUpdated` timestamp used for staleness checks.
//!
//! An undecodable document is discarded and rebuilt empty rather than failing
//! startup; losing a cache only costs re-resolution time.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Library;

/// A persisted map wrapped with its last-update timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedMap<V> {
    pub last_updated: DateTime<Utc>,
    pub entries: HashMap<String, V>,
}

impl<V> Default for TimestampedMap<V> {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            entries: HashMap::new(),
        }
    }
}

impl<V> TimestampedMap<V> {
    /// True when the document is older than `interval_secs`. A `None`
    /// interval disables refreshing entirely.
    pub fn is_stale(&self, interval_secs: Option<u64>) -> bool {
        match interval_secs {
            Some(secs) => {
                let age = Utc::now().signed_duration_since(self.last_updated);
                age.num_seconds() >= 0 && age.num_seconds() as u64 > secs
            }
            None => false,
        }
    }
}

/// Per-project record of the libraries found on the last analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projects {
    pub used_libraries: HashMap<String, Vec<Library>>,
}

/// Handle to the home folder holding all persisted documents.
#[derive(Debug, Clone)]
pub struct HomeStore {
    dir: PathBuf,
}

impl HomeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn translation_path(&self) -> PathBuf {
        self.dir.join("translation.json")
    }

    pub fn cpe_cache_path(&self) -> PathBuf {
        self.dir.join("cpes.json")
    }

    pub fn projects_path(&self) -> PathBuf {
        self.dir.join("projects.json")
    }

    pub fn cpe_dictionary_path(&self) -> PathBuf {
        self.dir.join("official-cpe-dictionary_v2.3.xml")
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    /// Loads a JSON document, falling back to the default value when the file
    /// is missing or undecodable.
    pub fn load<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return T::default(),
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding corrupt document");
                T::default()
            }
        }
    }

    /// Writes a JSON document, creating the home folder if needed.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_dir()?;
        let content = serde_json::to_string(value)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Records the libraries found for a project path.
    pub fn save_project_libraries(&self, project: &Path, libraries: &[Library]) -> Result<()> {
        let path = self.projects_path();
        let mut projects: Projects = self.load(&path);
        projects
            .used_libraries
            .insert(project.to_string_lossy().into_owned(), libraries.to_vec());
        self.save(&path, &projects)
    }
}
