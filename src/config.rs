//! Configuration file handling.
//!
//! Settings are stored as TOML at the platform config location
//! (`~/.config/depcheck/config.toml` on Linux). The home folder defaults to
//! `~/DependencyInfo` and holds the persisted caches, the CPE dictionary and
//! the CocoaPods Specs checkout.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const DAY_SECS: u64 = 60 * 60 * 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder holding caches, the CPE dictionary and the Specs checkout.
    pub home_folder: Option<PathBuf>,

    /// Checkout location of the CocoaPods Specs repository. Defaults to
    /// `<home_folder>/specs`.
    pub spec_directory: Option<PathBuf>,

    /// Seconds before the Specs checkout and translation cache are refreshed.
    /// `None` disables refreshing.
    pub spec_refresh_interval_secs: Option<u64>,

    /// Seconds before the CPE dictionary and cache are refreshed.
    pub cpe_refresh_interval_secs: Option<u64>,

    /// Seconds before cached vulnerability query results expire.
    pub vulnerability_refresh_interval_secs: Option<u64>,

    /// Git URL of the specification corpus.
    pub spec_repository_url: String,

    /// Download URL of the gzipped CPE dictionary.
    pub cpe_dictionary_url: String,

    /// Base URL of the NVD CVE API.
    pub nvd_api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_folder: None,
            spec_directory: None,
            spec_refresh_interval_secs: Some(7 * DAY_SECS),
            cpe_refresh_interval_secs: Some(7 * DAY_SECS),
            vulnerability_refresh_interval_secs: Some(DAY_SECS),
            spec_repository_url: "https://github.com/CocoaPods/Specs.git".to_string(),
            cpe_dictionary_url:
                "https://nvd.nist.gov/feeds/xml/cpe/dictionary/official-cpe-dictionary_v2.3.xml.gz"
                    .to_string(),
            nvd_api_url: "https://services.nvd.nist.gov/rest/json/cves/2.0".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from the config file, or defaults if it doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Saves the settings, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depcheck")
            .join("config.toml")
    }

    /// Resolved home folder, defaulting to `~/DependencyInfo`.
    pub fn home_folder(&self) -> PathBuf {
        self.home_folder.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("DependencyInfo")
        })
    }

    /// Resolved Specs checkout directory.
    pub fn spec_directory(&self) -> PathBuf {
        self.spec_directory
            .clone()
            .unwrap_or_else(|| self.home_folder().join("specs"))
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Settings::default()).unwrap_or_default()
    }
}
