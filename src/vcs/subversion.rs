use std::path::{Path, PathBuf};

use crate::command::CommandRunner;
use crate::error::Result;

use super::{
    find_marker, parse_tool_version, relative_path, requested_version, url_host, VcsKind,
    VersionControlSystem, WorkingDirectory,
};

const SVN: &str = "svn";

/// Path segments conventionally used by Subversion repository layouts.
const LAYOUT_SEGMENTS: &[&str] = &["/svn/", "/trunk", "/branches/", "/tags/"];

pub struct Subversion;

impl VersionControlSystem for Subversion {
    fn kind(&self) -> VcsKind {
        VcsKind::Subversion
    }

    fn is_applicable_url(&self, url: &str) -> bool {
        let url = url.trim();
        if url.ends_with(".git") {
            return false;
        }
        url.starts_with("svn://")
            || url.starts_with("svn+")
            || url_host(url).starts_with("svn.")
            || LAYOUT_SEGMENTS.iter().any(|segment| url.contains(segment))
    }

    fn is_applicable_directory(&self, dir: &Path) -> bool {
        find_marker(dir, ".svn").is_some()
    }

    fn version(&self, runner: &dyn CommandRunner) -> Result<String> {
        let out = runner.run_checked(Path::new("."), SVN, &["--version", "--quiet"])?;
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

        let mut base = url.trim_end_matches('/').to_string();
        let version = requested_version(version);
        if let Some(version) = version {
            base = format!("{}/tags/{}", base.trim_end_matches("/trunk"), version);
        }

        let (checkout_url, destination) = match path.filter(|p| !p.is_empty()) {
            Some(path) => {
                let path = path.trim_matches('/');
                (format!("{base}/{path}"), target_dir.join(path))
            }
            None => (base, target_dir.to_path_buf()),
        };
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let destination_arg = destination.to_string_lossy().into_owned();
        let mut args = vec!["checkout", "--quiet", checkout_url.as_str(), destination_arg.as_str()];
        if let (None, Some(rev)) = (version, revision) {
            args.extend(["--revision", rev]);
        }
        log::info!("Checking out '{}'", checkout_url);
        runner.run_checked(target_dir, SVN, &args)?;

        let out = runner.run_checked(
            target_dir,
            SVN,
            &["info", "--show-item", "revision", destination_arg.as_str()],
        )?;
        Ok(out.stdout.trim().to_string())
    }

    fn working_directory(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<WorkingDirectory> {
        let root = runner.run_checked(dir, SVN, &["info", "--show-item", "wc-root"])?;
        let root = PathBuf::from(root.stdout.trim());
        let root_arg = root.to_string_lossy().into_owned();

        let url = runner.run_checked(dir, SVN, &["info", "--show-item", "url", root_arg.as_str()])?;
        let revision = runner.run_checked(dir, SVN, &["info", "--show-item", "revision"])?;

        Ok(WorkingDirectory {
            kind: VcsKind::Subversion,
            path: relative_path(&root, dir),
            root,
            url: url.stdout.trim().to_string(),
            revision: revision.stdout.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::test_helpers::{calls, scripted_runner};

    #[test]
    fn test_url_detection() {
        assert!(Subversion.is_applicable_url("svn://svn.apache.org/repos/asf"));
        assert!(Subversion.is_applicable_url("https://svn.code.sf.net/p/project/code"));
        assert!(Subversion.is_applicable_url("https://example.org/repos/project/trunk"));
        assert!(!Subversion.is_applicable_url("https://github.com/a/b.git"));
    }

    #[test]
    fn test_download_version_uses_tag_path() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, log) = scripted_runner(vec![("svn info", CommandOutput::ok("1842\n"))]);

        let rev = Subversion
            .download(
                &mock,
                "https://example.org/repos/project/trunk",
                Some("1700"),
                None,
                Some("1.1"),
                dir.path(),
            )
            .unwrap();

        assert_eq!(rev, "1842");
        let checkout = calls(&log)
            .into_iter()
            .find(|c| c.starts_with("svn checkout"))
            .unwrap();
        assert!(checkout.contains("https://example.org/repos/project/tags/1.1 "));
        assert!(!checkout.contains("--revision"));
    }

    #[test]
    fn test_download_sub_path_into_matching_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, log) = scripted_runner(vec![("svn info", CommandOutput::ok("77\n"))]);

        let rev = Subversion
            .download(&mock, "svn://example.org/repo", Some("77"), Some("Classes"), None, dir.path())
            .unwrap();

        assert_eq!(rev, "77");
        let expected_dest = dir.path().join("Classes").to_string_lossy().into_owned();
        let checkout = calls(&log)
            .into_iter()
            .find(|c| c.starts_with("svn checkout"))
            .unwrap();
        assert_eq!(
            checkout,
            format!("svn checkout --quiet svn://example.org/repo/Classes {expected_dest} --revision 77")
        );
    }
}
