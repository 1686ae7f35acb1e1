//! Error types for parts-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from profile and preference persistence.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse profile at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON serialization error (preference store save path).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed preference store document.
    #[error("failed to parse preferences at {path}: {source}")]
    PrefsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.parts/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The profile YAML file did not exist at the expected path.
    #[error("device profile not found at {path}; run `parts init` first")]
    ProfileNotFound { path: PathBuf },

    /// The profile parsed but its tables contradict each other.
    #[error("invalid device profile: {0}")]
    InvalidProfile(String),
}
