use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::command::CommandRunner;
use crate::error::{AnalyzerError, Result};

use super::{
    find_marker, parse_tool_version, relative_path, requested_version, url_host, VcsKind,
    VersionControlSystem, WorkingDirectory,
};

const GIT: &str = "git";

/// Hosts that only serve Git repositories, with or without a `.git` suffix.
const GIT_HOSTS: &[&str] = &["github.com", "gitlab.com"];

pub struct Git;

impl VersionControlSystem for Git {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn is_applicable_url(&self, url: &str) -> bool {
        let url = url.trim().trim_end_matches('/');
        url.starts_with("git://")
            || url.starts_with("git+")
            || url.starts_with("git@")
            || url.ends_with(".git")
            || GIT_HOSTS.contains(&url_host(url))
    }

    fn is_applicable_directory(&self, dir: &Path) -> bool {
        find_marker(dir, ".git").is_some()
    }

    fn version(&self, runner: &dyn CommandRunner) -> Result<String> {
        let out = runner.run_checked(Path::new("."), GIT, &["--version"])?;
        parse_tool_version(&out.stdout)
    }

    fn download(
        &self,
        runner: &dyn CommandRunner,
        url: &str,
        revision: Option<&str>,
        path: Option<&str>,
        version: Option<&str>,
        target_dir: &Path,
    ) -> Result<String> {
        std::fs::create_dir_all(target_dir)?;
        let url = url.trim_start_matches("git+");

        runner.run_checked(target_dir, GIT, &["init", "--quiet"])?;
        runner.run_checked(target_dir, GIT, &["remote", "add", "origin", url])?;

        if let Some(path) = path.filter(|p| !p.is_empty()) {
            runner.run_checked(target_dir, GIT, &["config", "core.sparseCheckout", "true"])?;
            let info_dir = target_dir.join(".git").join("info");
            std::fs::create_dir_all(&info_dir)?;
            std::fs::write(
                info_dir.join("sparse-checkout"),
                format!("{}/\n", path.trim_matches('/')),
            )?;
        }

        let wanted = match requested_version(version) {
            Some(version) => resolve_version_tag(runner, target_dir, version)?,
            None => revision.unwrap_or("HEAD").to_string(),
        };
        log::info!("Fetching '{}' at '{}'", url, wanted);

        // Servers only hand out full object names or refs to a shallow fetch.
        if is_abbreviated_sha(&wanted) {
            runner.run_checked(target_dir, GIT, &["fetch", "--quiet", "--tags", "origin"])?;
            runner.run_checked(target_dir, GIT, &["checkout", "--quiet", wanted.as_str()])?;
        } else {
            runner.run_checked(target_dir, GIT, &["fetch", "--quiet", "--depth", "1", "origin", wanted.as_str()])?;
            runner.run_checked(target_dir, GIT, &["checkout", "--quiet", "FETCH_HEAD"])?;
        }

        let out = runner.run_checked(target_dir, GIT, &["rev-parse", "HEAD"])?;
        Ok(out.stdout.trim().to_string())
    }

    fn working_directory(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<WorkingDirectory> {
        let root = runner.run_checked(dir, GIT, &["rev-parse", "--show-toplevel"])?;
        let root = PathBuf::from(root.stdout.trim());
        let revision = runner.run_checked(dir, GIT, &["rev-parse", "HEAD"])?;

        // A repository without an `origin` remote still has a revision.
        let remote = runner.run(dir, GIT, &["remote", "get-url", "origin"])?;
        let url = if remote.success() {
            remote.stdout.trim().to_string()
        } else {
            String::new()
        };

        Ok(WorkingDirectory {
            kind: VcsKind::Git,
            path: relative_path(&root, dir),
            root,
            url,
            revision: revision.stdout.trim().to_string(),
        })
    }
}

fn is_abbreviated_sha(revision: &str) -> bool {
    (4..40).contains(&revision.len()) && revision.chars().all(|c| c.is_ascii_hexdigit())
}

/// Map a version to the commit of its tag (`1.2` or `v1.2`), preferring the
/// peeled commit of annotated tags.
fn resolve_version_tag(runner: &dyn CommandRunner, repo: &Path, version: &str) -> Result<String> {
    let out = runner.run_checked(repo, GIT, &["ls-remote", "--tags", "origin"])?;
    let tags = parse_ls_remote_tags(&out.stdout);

    [version.to_string(), format!("v{version}")]
        .iter()
        .find_map(|name| tags.get(name).cloned())
        .ok_or_else(|| AnalyzerError::vcs(format!("No tag matches version '{version}'")))
}

fn parse_ls_remote_tags(output: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    let mut peeled = HashMap::new();

    for line in output.lines() {
        let Some((sha, reference)) = line.split_once('\t') else {
            continue;
        };
        let Some(name) = reference.trim().strip_prefix("refs/tags/") else {
            continue;
        };
        match name.strip_suffix("^{}") {
            Some(name) => peeled.insert(name.to_string(), sha.trim().to_string()),
            None => tags.insert(name.to_string(), sha.trim().to_string()),
        };
    }

    tags.extend(peeled);
    tags
}
