//! Runs discovery over the project roots and resolves every definition
//! file found, several at a time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::analyzer::{PackageManager, ResolveContext};
use crate::models::{AnalyzerResult, ManagerId};
use crate::registry::discovery::find_managed_files;
use crate::registry::ManagerDescriptor;

/// Outcome for one definition file; `result` is `None` when the file could
/// not be analyzed at all.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionResult {
    pub definition_file: PathBuf,
    pub result: Option<AnalyzerResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerReport {
    pub manager: ManagerId,
    pub files: Vec<DefinitionResult>,
}

pub struct Orchestrator {
    managers: Vec<Arc<dyn PackageManager>>,
    ctx: Arc<ResolveContext>,
    jobs: usize,
    show_progress: bool,
}

impl Orchestrator {
    pub fn new(
        managers: Vec<Arc<dyn PackageManager>>,
        ctx: Arc<ResolveContext>,
        jobs: usize,
        show_progress: bool,
    ) -> Self {
        Self {
            managers,
            ctx,
            jobs: jobs.max(1),
            show_progress,
        }
    }

    /// Definition files per active manager across all `roots`, each file
    /// listed once.
    pub fn discover(&self, roots: &[PathBuf]) -> BTreeMap<ManagerId, Vec<PathBuf>> {
        let descriptors: Vec<&ManagerDescriptor> =
            self.managers.iter().map(|m| m.descriptor()).collect();
        let mut merged: BTreeMap<ManagerId, Vec<PathBuf>> = BTreeMap::new();

        for root in roots {
            for (id, files) in find_managed_files(root, &descriptors) {
                let known = merged.entry(id).or_default();
                for file in files {
                    if !known.contains(&file) {
                        known.push(file);
                    }
                }
            }
        }

        merged
    }

    /// Discover and resolve. Every active manager gets a report, in
    /// registry order, even when no files were found for it.
    pub async fn analyze(&self, roots: &[PathBuf]) -> Vec<ManagerReport> {
        let discovered = self.discover(roots);

        let work: Vec<(Arc<dyn PackageManager>, PathBuf)> = self
            .managers
            .iter()
            .flat_map(|manager| {
                discovered
                    .get(&manager.id())
                    .into_iter()
                    .flatten()
                    .map(move |file| (Arc::clone(manager), file.clone()))
            })
            .collect();

        let pb = if self.show_progress && !work.is_empty() {
            let pb = ProgressBar::new(work.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let mut outcomes: Vec<(ManagerId, DefinitionResult)> = Vec::with_capacity(work.len());
        for batch in work.chunks(self.jobs) {
            let tasks: Vec<_> = batch
                .iter()
                .map(|(manager, file)| {
                    let manager = Arc::clone(manager);
                    let file = file.clone();
                    let ctx = Arc::clone(&self.ctx);
                    tokio::task::spawn_blocking(move || {
                        let dir = containing_dir(&file);
                        log::info!("Resolving {} dependencies of '{}'", manager.id(), file.display());
                        manager.resolve_dependencies(&ctx, &dir, &dir, &file)
                    })
                })
                .collect();

            let results = join_all(tasks).await;

            for ((manager, file), joined) in batch.iter().zip(results) {
                let result = joined.unwrap_or_else(|e| {
                    log::error!("Resolution of '{}' panicked: {}", file.display(), e);
                    None
                });
                outcomes.push((
                    manager.id(),
                    DefinitionResult {
                        definition_file: file.clone(),
                        result,
                    },
                ));
                if let Some(pb) = &pb {
                    pb.set_message(file_label(file));
                    pb.inc(1);
                }
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("Done");
        }

        self.managers
            .iter()
            .map(|manager| ManagerReport {
                manager: manager.id(),
                files: outcomes
                    .iter()
                    .filter(|(id, _)| *id == manager.id())
                    .map(|(_, r)| r.clone())
                    .collect(),
            })
            .collect()
    }
}

fn containing_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_label(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandRunner;
    use crate::error::{AnalyzerError, Result};
    use crate::models::{Package, Project};
    use crate::test_helpers::write_file;
    use crate::vcs::VcsRegistry;
    use std::collections::BTreeSet;

    /// Resolves any file except those in a directory named `broken`.
    struct StubManager {
        descriptor: ManagerDescriptor,
    }

    impl StubManager {
        fn new() -> Self {
            Self {
                descriptor: ManagerDescriptor::new(ManagerId::Composer, "", &["deps.json"], &[]).unwrap(),
            }
        }
    }

    impl PackageManager for StubManager {
        fn descriptor(&self) -> &ManagerDescriptor {
            &self.descriptor
        }

        fn resolve(
            &self,
            _ctx: &ResolveContext,
            project_dir: &Path,
            _working_dir: &Path,
            definition_file: &Path,
        ) -> Result<AnalyzerResult> {
            if project_dir.ends_with("broken") {
                return Err(AnalyzerError::manifest(definition_file, "unexpected end of input"));
            }
            let name = file_label(project_dir);
            Ok(AnalyzerResult {
                success: true,
                project: Project {
                    package_manager: ManagerId::Composer,
                    namespace: String::new(),
                    name: name.clone(),
                    version: String::new(),
                    declared_licenses: BTreeSet::new(),
                    aliases: Vec::new(),
                    vcs: Default::default(),
                    homepage_url: String::new(),
                    scopes: BTreeSet::new(),
                },
                packages: BTreeSet::from([Package::bare(ManagerId::Composer, "", &name, "1.0")]),
                errors: Vec::new(),
            })
        }
    }

    fn orchestrator(jobs: usize) -> Orchestrator {
        let ctx = ResolveContext::new(
            Arc::new(MockCommandRunner::new()),
            Arc::new(VcsRegistry::new()),
            1,
        );
        Orchestrator::new(vec![Arc::new(StubManager::new())], Arc::new(ctx), jobs, false)
    }

    #[tokio::test]
    async fn test_failed_file_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("alpha/deps.json"), "{}");
        write_file(&dir.path().join("broken/deps.json"), "{}");
        write_file(&dir.path().join("gamma/deps.json"), "{}");

        let reports = orchestrator(2).analyze(&[dir.path().to_path_buf()]).await;

        assert_eq!(reports.len(), 1);
        let files = &reports[0].files;
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].result.as_ref().unwrap().project.name, "alpha");
        assert!(files[1].result.is_none());
        assert_eq!(files[2].result.as_ref().unwrap().project.name, "gamma");
    }

    #[test]
    fn test_discover_merges_roots_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a/deps.json"), "{}");
        write_file(&dir.path().join("b/deps.json"), "{}");

        let roots = vec![dir.path().to_path_buf(), dir.path().join("a")];
        let found = orchestrator(1).discover(&roots);
        assert_eq!(found[&ManagerId::Composer].len(), 2);
    }

    #[test]
    fn test_containing_dir_of_bare_file_name() {
        assert_eq!(containing_dir(Path::new("composer.json")), PathBuf::from("."));
        assert_eq!(containing_dir(Path::new("/p/composer.json")), PathBuf::from("/p"));
    }
}
