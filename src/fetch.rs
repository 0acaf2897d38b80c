//! External resource acquisition: the Specs checkout and the CPE dictionary.
//!
//! Failures here are never fatal to an analysis run; the pipeline proceeds
//! with whatever local data already exists and logs the degradation.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Narrow subprocess interface. A run that produces no output is retried
/// exactly once, then gives up and returns empty output.
pub struct ProcessRunner;

impl ProcessRunner {
    pub async fn run(command: &str, args: &[&str]) -> String {
        tracing::debug!(command, ?args, "running subprocess");

        if let Some(output) = Self::run_once(command, args).await {
            return output;
        }
        if let Some(output) = Self::run_once(command, args).await {
            return output;
        }

        tracing::debug!(command, "subprocess produced no output");
        String::new()
    }

    async fn run_once(command: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(command)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .ok()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.is_empty() {
            return None;
        }
        Some(combined)
    }
}

/// Local mirror of the CocoaPods Specs repository, maintained with
/// clone/pull semantics.
pub struct SpecRepo {
    directory: PathBuf,
    url: String,
}

impl SpecRepo {
    pub fn new(directory: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            url: url.into(),
        }
    }

    /// The checkout exists and contains the Specs tree.
    pub fn is_checked_out(&self) -> bool {
        self.directory.join("Specs").exists()
    }

    pub async fn clone_repo(&self) {
        tracing::info!(directory = %self.directory.display(), "cloning spec repository");
        let out = ProcessRunner::run(
            "git",
            &["clone", &self.url, &self.directory.to_string_lossy()],
        )
        .await;
        tracing::debug!(output = %out, "git clone finished");
    }

    pub async fn pull(&self) {
        tracing::info!(directory = %self.directory.display(), "updating spec repository");
        let git_dir = self.directory.join(".git");
        let out = ProcessRunner::run(
            "git",
            &[
                "--git-dir",
                &git_dir.to_string_lossy(),
                "--work-tree",
                &self.directory.to_string_lossy(),
                "pull",
            ],
        )
        .await;
        tracing::debug!(output = %out, "git pull finished");
    }
}

/// Downloads and decompresses the official CPE dictionary.
pub struct DictionaryFetcher {
    client: reqwest::Client,
    url: String,
}

impl DictionaryFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Downloads the gzipped dictionary and writes the decompressed XML to
    /// `dest`.
    pub async fn download(&self, dest: &Path) -> Result<()> {
        tracing::info!(url = %self.url, "downloading cpe dictionary");

        let bytes = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let mut decoder = GzDecoder::new(bytes.as_ref());
        let mut xml = Vec::new();
        decoder
            .read_to_end(&mut xml)
            .context("decompressing cpe dictionary")?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, xml)?;
        Ok(())
    }

    /// Downloads only when `dest` does not exist yet.
    pub async fn ensure(&self, dest: &Path) {
        if dest.exists() {
            return;
        }
        if let Err(e) = self.download(dest).await {
            tracing::error!(error = %e, "cpe dictionary download failed, proceeding with local data");
        }
    }

    /// Replaces an existing dictionary with a fresh download.
    pub async fn refresh(&self, dest: &Path) {
        if dest.exists() {
            if let Err(e) = std::fs::remove_file(dest) {
                tracing::error!(error = %e, "could not remove stale cpe dictionary");
            }
        }
        if let Err(e) = self.download(dest).await {
            tracing::error!(error = %e, "cpe dictionary refresh failed, proceeding with local data");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn runner_returns_command_output() {
        let output = ProcessRunner::run("echo", &["hello"]).await;
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn runner_gives_up_after_one_retry() {
        let output = ProcessRunner::run("true", &[]).await;
        assert_eq!(output, "");
    }

    #[test]
    fn checkout_detection_requires_specs_tree() {
        let dir = TempDir::new().unwrap();
        let repo = SpecRepo::new(dir.path(), "https://example.invalid/specs.git");
        assert!(!repo.is_checked_out());

        fs::create_dir_all(dir.path().join("Specs")).unwrap();
        assert!(repo.is_checked_out());
    }
}
