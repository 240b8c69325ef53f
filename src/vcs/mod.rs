//! Version-control provenance: detect which backend manages a directory or
//! remote URL, check out revisions/versions/sub-paths, and report the
//! concrete revision that was materialized.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::command::CommandRunner;
use crate::error::Result;
use crate::models::VcsInfo;

pub mod git;
pub mod mercurial;
pub mod subversion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
}

impl VcsKind {
    /// Map a source type as reported by package tooling (`[git]`, `hg`, ...).
    pub fn from_source_type(kind: &str) -> Option<Self> {
        match kind.to_lowercase().as_str() {
            "git" => Some(VcsKind::Git),
            "hg" | "mercurial" => Some(VcsKind::Mercurial),
            "svn" | "subversion" => Some(VcsKind::Subversion),
            _ => None,
        }
    }
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VcsKind::Git => write!(f, "Git"),
            VcsKind::Mercurial => write!(f, "Mercurial"),
            VcsKind::Subversion => write!(f, "Subversion"),
        }
    }
}

/// State of an already materialized working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    pub kind: VcsKind,
    /// Root of the working tree.
    pub root: PathBuf,
    pub url: String,
    pub revision: String,
    /// Inspected directory relative to `root`, `/`-separated, empty at the root.
    pub path: String,
}

impl WorkingDirectory {
    pub fn provider(&self) -> String {
        self.kind.to_string()
    }

    pub fn to_vcs_info(&self) -> VcsInfo {
        VcsInfo {
            provider: self.provider(),
            url: self.url.clone(),
            revision: self.revision.clone(),
            path: self.path.clone(),
        }
    }
}

pub trait VersionControlSystem: Send + Sync {
    fn kind(&self) -> VcsKind;

    /// Whether `url` looks like a repository of this backend.
    fn is_applicable_url(&self, url: &str) -> bool;

    /// Whether `dir` lies inside a working tree of this backend.
    fn is_applicable_directory(&self, dir: &Path) -> bool;

    /// Version of the installed client tool.
    fn version(&self, runner: &dyn CommandRunner) -> Result<String>;

    /// Materialize `url` into `target_dir` and return the checked-out revision.
    ///
    /// A non-blank `version` is mapped to a revision by the backend and wins
    /// over `revision`. With `path`, only that subtree needs to be present
    /// afterwards.
    fn download(
        &self,
        runner: &dyn CommandRunner,
        url: &str,
        revision: Option<&str>,
        path: Option<&str>,
        version: Option<&str>,
        target_dir: &Path,
    ) -> Result<String>;

    fn working_directory(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<WorkingDirectory>;
}

/// The VCS backends known to the analyzer, tried in order.
pub struct VcsRegistry {
    backends: Vec<Box<dyn VersionControlSystem>>,
}

impl VcsRegistry {
    pub fn new() -> Self {
        Self {
            backends: vec![
                Box::new(git::Git),
                Box::new(mercurial::Mercurial),
                Box::new(subversion::Subversion),
            ],
        }
    }

    pub fn for_directory(&self, dir: &Path) -> Option<&dyn VersionControlSystem> {
        self.backends
            .iter()
            .find(|b| b.is_applicable_directory(dir))
            .map(|b| b.as_ref())
    }

    pub fn for_url(&self, url: &str) -> Option<&dyn VersionControlSystem> {
        self.backends
            .iter()
            .find(|b| b.is_applicable_url(url))
            .map(|b| b.as_ref())
    }

    /// Provenance of a local directory, or [`VcsInfo::EMPTY`] when it is not
    /// under version control or the client tool cannot describe it.
    pub fn info_for_directory(&self, runner: &dyn CommandRunner, dir: &Path) -> VcsInfo {
        let Some(backend) = self.for_directory(dir) else {
            return VcsInfo::EMPTY;
        };

        match backend.working_directory(runner, dir) {
            Ok(wd) => wd.to_vcs_info(),
            Err(e) => {
                log::warn!(
                    "Could not read {} working tree at '{}': {}",
                    backend.kind(),
                    dir.display(),
                    e
                );
                VcsInfo::EMPTY
            }
        }
    }

    /// Provenance for a remote URL with an optional known revision.
    pub fn info_for_url(&self, url: &str, revision: &str) -> VcsInfo {
        if url.is_empty() {
            return VcsInfo::EMPTY;
        }
        VcsInfo {
            provider: self
                .for_url(url)
                .map(|b| b.kind().to_string())
                .unwrap_or_default(),
            url: url.to_string(),
            revision: revision.to_string(),
            path: String::new(),
        }
    }
}

impl Default for VcsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest ancestor of `dir` (inclusive) containing a `marker` entry.
pub(crate) fn find_marker(dir: &Path, marker: &str) -> Option<PathBuf> {
    dir.ancestors()
        .find(|d| d.join(marker).exists())
        .map(Path::to_path_buf)
}

/// Treat a blank version request as absent.
pub(crate) fn requested_version(version: Option<&str>) -> Option<&str> {
    version.map(str::trim).filter(|v| !v.is_empty())
}

/// Host part of a URL, for the common `scheme://host/...` and
/// `user@host:path` shapes.
pub(crate) fn url_host(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => url,
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    authority.split(':').next().unwrap_or_default()
}

/// `dir` relative to `root`, `/`-separated.
pub(crate) fn relative_path(root: &Path, dir: &Path) -> String {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    dir.strip_prefix(&root)
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

/// First dotted version number in a tool's `--version` banner.
pub(crate) fn parse_tool_version(banner: &str) -> Result<String> {
    let re = Regex::new(r"(\d+(?:\.\d+)+)")?;
    Ok(re
        .captures(banner)
        .map(|c| c[1].to_string())
        .unwrap_or_default())
}

/// Whether dotted version `actual` is at least `required`.
pub(crate) fn is_at_least(actual: &str, required: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    let (mut a, mut r) = (parse(actual), parse(required));
    let len = a.len().max(r.len());
    a.resize(len, 0);
    r.resize(len, 0);
    a >= r
}
