//! `pran`: resolve project dependency graphs and their version-control provenance.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and initialise logging.
//! 2. Load analyzer config ([`config::load_config`]).
//! 3. Select the active package managers from the [`registry`].
//! 4. Discover definition files and resolve each one ([`orchestrator`]).
//! 5. Render the requested report ([`report`]).

mod analyzer;
mod cli;
mod command;
mod config;
mod error;
mod manifest;
mod models;
mod orchestrator;
mod registry;
mod report;
#[cfg(test)]
mod test_helpers;
mod vcs;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use analyzer::{PackageManager, ResolveContext};
use cli::{Cli, OutputFormat};
use command::ProcessRunner;
use config::load_config;
use models::ManagerId;
use orchestrator::Orchestrator;
use registry::ManagerRegistry;
use vcs::VcsRegistry;

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("pran")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

/// Parse arguments; help exits with 1, usage errors with 2.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp => 1,
                clap::error::ErrorKind::DisplayVersion => 0,
                _ => 2,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

/// Active managers from `-m`; unknown names are reported and skipped.
fn active_managers(registry: &ManagerRegistry, names: &[String]) -> Vec<ManagerId> {
    if names.is_empty() {
        return registry.ids();
    }

    let mut ids = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        match ManagerId::from_name(name) {
            Some(id) if registry.get(id).is_some() => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            _ => log::warn!("Ignoring unknown package manager '{}'", name.trim()),
        }
    }
    ids
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();
    initialize_logger(cli.debug)?;

    let mut roots: Vec<PathBuf> = Vec::with_capacity(cli.paths.len());
    for path in &cli.paths {
        match path.canonicalize() {
            Ok(root) => roots.push(root),
            Err(e) => {
                log::error!("Cannot scan '{}': {}", path.display(), e);
                std::process::exit(2);
            }
        }
    }

    let config = load_config(&roots[0], cli.config.as_deref())?;
    let max_depth = cli.max_depth.unwrap_or(config.analyzer.max_depth);
    let timeout = Duration::from_secs(cli.timeout.unwrap_or(config.analyzer.command_timeout_secs));

    let registry = ManagerRegistry::new()?;
    let active = active_managers(&registry, &cli.package_managers);
    if active.is_empty() {
        log::error!("No known package manager selected");
        std::process::exit(2);
    }

    let managers = registry.select(&active);
    let show_progress = cli.output == OutputFormat::Terminal;
    if show_progress {
        let names: Vec<String> = managers.iter().map(|m| m.descriptor().summary()).collect();
        eprintln!(" {} {}", "Package managers:".bold(), names.join(", "));
        for root in &roots {
            eprintln!(" {} {}", "Scanning:".bold(), root.display());
        }
    }

    let runner = ProcessRunner::new(tokio::runtime::Handle::current(), timeout);
    let ctx = ResolveContext::new(Arc::new(runner), Arc::new(VcsRegistry::new()), max_depth);
    let orchestrator = Orchestrator::new(
        managers,
        Arc::new(ctx),
        config.analyzer.jobs,
        show_progress,
    );

    let reports = orchestrator.analyze(&roots).await;

    match cli.output {
        OutputFormat::Terminal => report::terminal::render(&reports, cli.verbose)?,
        OutputFormat::Json => report::json::render(&reports)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_managers_default_to_all() {
        let registry = ManagerRegistry::new().unwrap();
        assert_eq!(active_managers(&registry, &[]), ManagerId::ALL.to_vec());
    }

    #[test]
    fn test_unknown_managers_are_ignored() {
        let registry = ManagerRegistry::new().unwrap();
        let names = vec!["npm".to_string(), "maven".to_string(), "NPM".to_string()];
        assert_eq!(active_managers(&registry, &names), vec![ManagerId::Npm]);

        let names = vec!["bower".to_string()];
        assert!(active_managers(&registry, &names).is_empty());
    }
}
