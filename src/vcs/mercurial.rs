use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::command::CommandRunner;
use crate::error::{AnalyzerError, Result};

use super::{
    find_marker, is_at_least, parse_tool_version, relative_path, requested_version, url_host,
    VcsKind, VersionControlSystem, WorkingDirectory,
};

const HG: &str = "hg";

/// First release shipping the `sparse` extension.
const SPARSE_MIN_VERSION: &str = "4.3";

pub struct Mercurial;

impl Mercurial {
    pub fn is_at_least_version(&self, runner: &dyn CommandRunner, required: &str) -> bool {
        match self.version(runner) {
            Ok(version) => !version.is_empty() && is_at_least(&version, required),
            Err(_) => false,
        }
    }
}

impl VersionControlSystem for Mercurial {
    fn kind(&self) -> VcsKind {
        VcsKind::Mercurial
    }

    fn is_applicable_url(&self, url: &str) -> bool {
        let url = url.trim().trim_end_matches('/');
        let host = url_host(url);
        if url.starts_with("hg://") || url.starts_with("hg+") || host.starts_with("hg.") {
            return true;
        }
        if ["git@", "git+", "git://"].iter().any(|scheme| url.starts_with(scheme)) {
            return false;
        }
        // Bitbucket serves both; Git repositories are addressed with `.git`.
        host == "bitbucket.org" && !url.ends_with(".git")
    }

    fn is_applicable_directory(&self, dir: &Path) -> bool {
        find_marker(dir, ".hg").is_some()
    }

    fn version(&self, runner: &dyn CommandRunner) -> Result<String> {
        let out = runner.run_checked(Path::new("."), HG, &["--version", "--quiet"])?;
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
        let url = url.trim_start_matches("hg+");

        runner.run_checked(target_dir, HG, &["clone", "--noupdate", url, "."])?;

        if let Some(path) = path.filter(|p| !p.is_empty()) {
            if self.is_at_least_version(runner, SPARSE_MIN_VERSION) {
                enable_sparse(&target_dir.join(".hg").join("hgrc"))?;
                runner.run_checked(target_dir, HG, &["debugsparse", "--include", path])?;
            } else {
                log::warn!(
                    "Mercurial {}+ is required for sparse checkouts, fetching all of '{}'",
                    SPARSE_MIN_VERSION,
                    url
                );
            }
        }

        let wanted = match requested_version(version) {
            Some(version) => Some(resolve_version_tag(runner, target_dir, version)?),
            None => revision.map(str::to_string),
        };

        match &wanted {
            Some(rev) => runner.run_checked(target_dir, HG, &["update", "--rev", rev.as_str()])?,
            None => runner.run_checked(target_dir, HG, &["update"])?,
        };

        current_revision(runner, target_dir)
    }

    fn working_directory(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<WorkingDirectory> {
        let root = runner.run_checked(dir, HG, &["root"])?;
        let root = PathBuf::from(root.stdout.trim());
        let revision = current_revision(runner, dir)?;

        let remote = runner.run(dir, HG, &["paths", "default"])?;
        let url = if remote.success() {
            remote.stdout.trim().to_string()
        } else {
            String::new()
        };

        Ok(WorkingDirectory {
            kind: VcsKind::Mercurial,
            path: relative_path(&root, dir),
            root,
            url,
            revision,
        })
    }
}

fn current_revision(runner: &dyn CommandRunner, dir: &Path) -> Result<String> {
    let out = runner.run_checked(dir, HG, &["id", "-i"])?;
    // A trailing `+` marks uncommitted changes.
    Ok(out.stdout.trim().trim_end_matches('+').to_string())
}

fn enable_sparse(hgrc: &Path) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(hgrc)?;
    writeln!(file, "\n[extensions]\nsparse =")?;
    Ok(())
}

fn resolve_version_tag(runner: &dyn CommandRunner, repo: &Path, version: &str) -> Result<String> {
    let out = runner.run_checked(repo, HG, &["tags"])?;
    let tags = parse_tags(&out.stdout)?;

    [version.to_string(), format!("v{version}")]
        .iter()
        .find_map(|name| tags.get(name).cloned())
        .ok_or_else(|| AnalyzerError::vcs(format!("No tag matches version '{version}'")))
}

/// Parse `hg tags` lines such as `1.1    12:562fed42b4f3`.
fn parse_tags(output: &str) -> Result<HashMap<String, String>> {
    let re = Regex::new(r"^(\S+)\s+\d+:([0-9a-f]+)")?;
    Ok(output
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::test_helpers::{calls, scripted_runner, scripted_runner_with};

    const REPO_URL: &str = "https://bitbucket.org/creaceed/mercurial-xcode-plugin";
    const TAGS: &str = "tip                               25:02098fc8bdac\n1.1                               12:562fed42b4f3\n1.0                                8:0a1b2c3d4e5f\n";

    #[test]
    fn test_url_detection() {
        assert!(Mercurial.is_applicable_url("https://bitbucket.org/paniq/masagin"));
        assert!(!Mercurial.is_applicable_url("https://bitbucket.org/yevster/spdxtraxample.git"));
        assert!(Mercurial.is_applicable_url("https://hg.mozilla.org/mozilla-central/"));
        assert!(!Mercurial.is_applicable_url("https://github.com/a/b"));
        assert!(!Mercurial.is_applicable_url("git@bitbucket.org:team/repo"));
        assert!(!Mercurial.is_applicable_url("git+https://bitbucket.org/team/repo"));
        assert!(!Mercurial.is_applicable_url("git://bitbucket.org/team/repo"));
    }

    #[test]
    fn test_version_is_detected() {
        let (mock, _) = scripted_runner(vec![(
            "hg --version",
            CommandOutput::ok("Mercurial Distributed SCM (version 4.5.3)\n"),
        )]);
        assert_eq!(Mercurial.version(&mock).unwrap(), "4.5.3");
    }

    #[test]
    fn test_download_version_maps_to_revision() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, log) = scripted_runner(vec![
            ("hg tags", CommandOutput::ok(TAGS)),
            ("hg id -i", CommandOutput::ok("562fed42b4f3\n")),
        ]);

        let rev = Mercurial
            .download(&mock, REPO_URL, None, None, Some("1.1"), dir.path())
            .unwrap();

        assert_eq!(rev, "562fed42b4f3");
        let calls = calls(&log);
        assert!(calls.contains(&"hg update --rev 562fed42b4f3".to_string()));
        assert!(!calls.iter().any(|c| c.contains("debugsparse")));
    }

    #[test]
    fn test_download_single_revision() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, _) = scripted_runner(vec![("hg id -i", CommandOutput::ok("02098fc8bdac\n"))]);

        let rev = Mercurial
            .download(&mock, REPO_URL, Some("02098fc8bdac"), None, Some(""), dir.path())
            .unwrap();
        assert_eq!(rev, "02098fc8bdac");
    }

    #[test]
    fn test_download_sub_path_only() {
        let dir = tempfile::tempdir().unwrap();
        // Simulate the sparse update materializing only the included subtree.
        let (mock, log) = scripted_runner_with(
            vec![
                ("hg --version", CommandOutput::ok("Mercurial Distributed SCM (version 4.5.3)\n")),
                ("hg id -i", CommandOutput::ok("02098fc8bdac+\n")),
            ],
            |dir, line| {
                if line.starts_with("hg clone") {
                    std::fs::create_dir_all(dir.join(".hg")).unwrap();
                }
                if line == "hg update" {
                    std::fs::create_dir_all(dir.join("Classes")).unwrap();
                }
            },
        );

        let rev = Mercurial
            .download(&mock, REPO_URL, None, Some("Classes"), Some(""), dir.path())
            .unwrap();

        assert_eq!(rev, "02098fc8bdac");
        assert!(calls(&log).contains(&"hg debugsparse --include Classes".to_string()));
        let hgrc = std::fs::read_to_string(dir.path().join(".hg/hgrc")).unwrap();
        assert!(hgrc.contains("sparse ="));
        assert!(dir.path().join("Classes").is_dir());
        assert!(!dir.path().join("Resources").exists());
    }

    #[test]
    fn test_old_client_falls_back_to_full_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, log) = scripted_runner(vec![
            ("hg --version", CommandOutput::ok("Mercurial Distributed SCM (version 4.1)\n")),
            ("hg id -i", CommandOutput::ok("02098fc8bdac\n")),
        ]);

        Mercurial
            .download(&mock, REPO_URL, None, Some("Classes"), None, dir.path())
            .unwrap();
        assert!(!calls(&log).iter().any(|c| c.contains("debugsparse")));
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(TAGS).unwrap();
        assert_eq!(tags["1.1"], "562fed42b4f3");
        assert_eq!(tags["tip"], "02098fc8bdac");
    }
}
