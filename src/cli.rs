use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pran",
    about = "Resolve project dependency graphs and their version-control provenance",
    version
)]
pub struct Cli {
    /// Project paths to scan (directories or definition files)
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Comma-separated package managers to activate [default: all]
    #[arg(short = 'm', long = "package-managers", value_delimiter = ',', value_name = "NAMES")]
    pub package_managers: Vec<String>,

    /// Analyzer config file [default: <PATH>/.pran/config.toml, fallback ~/.config/pran/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub output: OutputFormat,

    /// Dependency levels expanded below the direct dependencies
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Timeout for each external tool invocation
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Print the dependency tree of every scope
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_list_is_split() {
        let cli = Cli::try_parse_from(["pran", "-m", "composer,npm", "--max-depth", "2", "proj"]).unwrap();
        assert_eq!(cli.package_managers, vec!["composer", "npm"]);
        assert_eq!(cli.max_depth, Some(2));
        assert_eq!(cli.output, OutputFormat::Terminal);
        assert_eq!(cli.paths, vec![PathBuf::from("proj")]);
    }

    #[test]
    fn test_paths_are_required() {
        let err = Cli::try_parse_from(["pran"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_help_is_reported_as_error_kind() {
        let err = Cli::try_parse_from(["pran", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
