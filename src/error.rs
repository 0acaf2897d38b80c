use std::path::PathBuf;

/// Errors surfaced by the analysis pipeline.
///
/// Almost everything degrades instead of failing: missing manifests skip an
/// ecosystem, malformed data falls back to conservative matching, unreachable
/// corpora fall back to the local caches. The only fatal condition is being
/// unable to enumerate the project root at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read project path {path}")]
    ProjectRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("vulnerability query failed")]
    Query(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
