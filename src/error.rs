//! Error type shared by discovery, resolution and VCS operations.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Could not read manifest '{}': {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    #[error("'{command}' failed with exit code {code}: {stderr}")]
    InstallFailure {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("'{command}' failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("'{command}' did not finish within {secs}s")]
    CommandTimeout { command: String, secs: u64 },

    #[error("Could not start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("VCS operation failed: {0}")]
    Vcs(String),

    #[error("Unexpected tool output: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regular expression error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

impl AnalyzerError {
    pub fn manifest(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ManifestParse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn vcs(msg: impl Into<String>) -> Self {
        Self::Vcs(msg.into())
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }
}
