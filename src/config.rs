use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Root configuration structure, deserialized from `.pran/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// Tuning of dependency resolution.
#[derive(Debug, Deserialize)]
pub struct AnalyzerConfig {
    /// Upper bound for a single external tool invocation, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Levels expanded below the direct dependencies of each scope.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Definition files resolved concurrently.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_command_timeout() -> u64 {
    600
}

fn default_max_depth() -> usize {
    1
}

fn default_jobs() -> usize {
    4
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            max_depth: default_max_depth(),
            jobs: default_jobs(),
        }
    }
}

/// Load the analyzer configuration, searching in order:
///
/// 1. `config_override`, the path passed via `--config`
/// 2. `<project_path>/.pran/config.toml`
/// 3. `~/.config/pran/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".pran").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("pran").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config '{}'", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_file;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(dir.path(), Some(&missing)).is_err());

        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.analyzer.command_timeout_secs, 600);
        assert_eq!(config.analyzer.max_depth, 1);
        assert_eq!(config.analyzer.jobs, 4);
    }

    #[test]
    fn test_project_config_is_found() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(".pran").join("config.toml"),
            "[analyzer]\nmax_depth = 3\n",
        );

        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.analyzer.max_depth, 3);
        assert_eq!(config.analyzer.jobs, 4);
    }

    #[test]
    fn test_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join(".pran").join("config.toml"), "[analyzer]\njobs = 2\n");
        let other = dir.path().join("custom.toml");
        write_file(&other, "[analyzer]\njobs = 8\ncommand_timeout_secs = 30\n");

        let config = load_config(dir.path(), Some(&other)).unwrap();
        assert_eq!(config.analyzer.jobs, 8);
        assert_eq!(config.analyzer.command_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.toml");
        write_file(&file, "[analyzer]\nmax_depth = \"deep\"\n");
        let err = load_config(dir.path(), Some(&file)).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
