use std::path::Path;
use std::sync::Arc;

use crate::command::{CommandRunner, Platform};
use crate::error::Result;
use crate::models::{AnalyzerResult, ManagerId};
use crate::registry::ManagerDescriptor;
use crate::vcs::VcsRegistry;

pub mod composer;
pub mod gradle;
pub mod graph;
pub mod npm;

/// Shared collaborators for resolving definition files.
pub struct ResolveContext {
    pub runner: Arc<dyn CommandRunner>,
    pub vcs: Arc<VcsRegistry>,
    /// How many levels below the direct dependencies are expanded.
    pub max_depth: usize,
    pub platform: Platform,
}

impl ResolveContext {
    pub fn new(runner: Arc<dyn CommandRunner>, vcs: Arc<VcsRegistry>, max_depth: usize) -> Self {
        Self {
            runner,
            vcs,
            max_depth,
            platform: Platform::current(),
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

pub trait PackageManager: Send + Sync {
    fn descriptor(&self) -> &ManagerDescriptor;

    fn id(&self) -> ManagerId {
        self.descriptor().id
    }

    /// Resolve one definition file into a dependency graph.
    ///
    /// Errors returned here abort the whole file; failures confined to a
    /// single scope are recorded in [`AnalyzerResult::errors`] instead.
    fn resolve(
        &self,
        ctx: &ResolveContext,
        project_dir: &Path,
        working_dir: &Path,
        definition_file: &Path,
    ) -> Result<AnalyzerResult>;

    /// [`resolve`](Self::resolve), logging a failure and returning `None`.
    fn resolve_dependencies(
        &self,
        ctx: &ResolveContext,
        project_dir: &Path,
        working_dir: &Path,
        definition_file: &Path,
    ) -> Option<AnalyzerResult> {
        match self.resolve(ctx, project_dir, working_dir, definition_file) {
            Ok(result) => Some(result),
            Err(e) => {
                log::error!("Could not analyze '{}': {}", definition_file.display(), e);
                None
            }
        }
    }
}
