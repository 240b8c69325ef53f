//! Building scope trees and assembling [`AnalyzerResult`]s.
//!
//! [`resolve_scopes`] isolates failures per scope. [`resolve_installed`] is
//! the shared algorithm for managers that install dependencies next to the
//! project and expose each installed package's own manifest (Composer, npm).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;
use crate::manifest::{declared_licenses, dependency_entries, read_manifest, text};
use crate::models::{AnalyzerResult, ManagerId, Package, PackageReference, Project, Scope};

use super::ResolveContext;

/// A scope a manager knows how to resolve.
#[derive(Debug, Clone, Copy)]
pub struct ScopeSpec {
    pub name: &'static str,
    pub delivered: bool,
}

/// One scope's tree plus the packages discovered while building it.
pub struct ScopeGraph {
    pub scope: Scope,
    pub packages: Vec<Package>,
}

/// Merged output of all scopes of one definition file.
#[derive(Default)]
pub struct ResolvedScopes {
    pub scopes: BTreeSet<Scope>,
    pub packages: BTreeSet<Package>,
    pub errors: Vec<String>,
}

/// Build every scope independently with `build`.
///
/// `Ok(None)` means the scope is not declared. An error drops only that
/// scope and is recorded as text; packages are merged after each scope so
/// the first record for an identity wins.
pub fn resolve_scopes<F>(specs: &[ScopeSpec], mut build: F) -> ResolvedScopes
where
    F: FnMut(&ScopeSpec) -> Result<Option<ScopeGraph>>,
{
    let mut resolved = ResolvedScopes::default();

    for spec in specs {
        match build(spec) {
            Ok(Some(graph)) => {
                resolved.packages.extend(graph.packages);
                resolved.scopes.insert(graph.scope);
            }
            Ok(None) => log::debug!("Scope '{}' is not declared", spec.name),
            Err(e) => {
                log::warn!("Failed to parse scope {}: {}", spec.name, e);
                resolved
                    .errors
                    .push(format!("Failed to parse scope {}: {}", spec.name, e));
            }
        }
    }

    resolved
}

/// Ecosystem specifics of managers with an install directory of manifests.
pub trait InstalledLayout: Send + Sync {
    fn manager(&self) -> ManagerId;

    fn scopes(&self) -> &[ScopeSpec];

    /// Materialize dependencies into `working_dir`.
    fn install(&self, ctx: &ResolveContext, working_dir: &Path) -> Result<()>;

    /// Manifest of the installed dependency `name`.
    fn installed_manifest(&self, working_dir: &Path, name: &str) -> PathBuf;

    /// Metadata of the installed dependency `name`; `None` when the tooling
    /// has nothing installed under that name.
    fn lookup_package(&self, ctx: &ResolveContext, working_dir: &Path, name: &str)
        -> Result<Option<Package>>;

    /// `(namespace, name)` for a dependency name as written in a manifest.
    fn coordinates(&self, name: &str) -> (String, String);

    /// Entries that name the runtime or platform rather than a package.
    fn is_platform_requirement(&self, _name: &str) -> bool {
        false
    }
}

/// Install, read the project manifest and build all scopes.
pub fn resolve_installed(
    layout: &dyn InstalledLayout,
    ctx: &ResolveContext,
    project_dir: &Path,
    working_dir: &Path,
    definition_file: &Path,
) -> Result<AnalyzerResult> {
    layout.install(ctx, working_dir)?;

    let manifest = read_manifest(definition_file)?;
    let resolved = resolve_scopes(layout.scopes(), |spec| {
        build_scope(layout, ctx, working_dir, &manifest, spec)
    });

    let (namespace, name) = layout.coordinates(&text(&manifest, "name"));
    let project = Project {
        package_manager: layout.manager(),
        namespace,
        name,
        version: text(&manifest, "version"),
        declared_licenses: declared_licenses(manifest.get("license")),
        aliases: Vec::new(),
        vcs: ctx.vcs.info_for_directory(ctx.runner(), project_dir),
        homepage_url: text(&manifest, "homepage"),
        scopes: resolved.scopes,
    };

    Ok(AnalyzerResult {
        success: true,
        project,
        packages: resolved.packages,
        errors: resolved.errors,
    })
}

fn build_scope(
    layout: &dyn InstalledLayout,
    ctx: &ResolveContext,
    working_dir: &Path,
    manifest: &Value,
    spec: &ScopeSpec,
) -> Result<Option<ScopeGraph>> {
    let Some(entries) = dependency_entries(manifest, spec.name) else {
        return Ok(None);
    };

    let mut expander = Expander {
        layout,
        ctx,
        working_dir,
        scope: spec.name,
        packages: Vec::new(),
    };
    let mut roots = BTreeSet::new();
    for (name, constraint) in entries {
        if layout.is_platform_requirement(&name) {
            continue;
        }
        roots.insert(expander.expand(&name, &constraint, 0)?);
    }

    Ok(Some(ScopeGraph {
        scope: Scope {
            name: spec.name.to_string(),
            delivered: spec.delivered,
            dependencies: roots,
        },
        packages: expander.packages,
    }))
}

struct Expander<'a> {
    layout: &'a dyn InstalledLayout,
    ctx: &'a ResolveContext,
    working_dir: &'a Path,
    scope: &'a str,
    packages: Vec<Package>,
}

impl Expander<'_> {
    /// Reference for `name` at `level` (0 = direct dependency), with children
    /// from the same scope of its installed manifest while `level` is below
    /// the configured depth.
    fn expand(&mut self, name: &str, constraint: &str, level: usize) -> Result<PackageReference> {
        let Some(package) = self.layout.lookup_package(self.ctx, self.working_dir, name)? else {
            log::warn!("No installed metadata for '{}', keeping the declared edge only", name);
            let (namespace, name) = self.layout.coordinates(name);
            return Ok(PackageReference::new(&namespace, &name, constraint));
        };

        let mut reference = package.to_reference();
        self.packages.push(package);

        if level >= self.ctx.max_depth {
            return Ok(reference);
        }

        let manifest = read_manifest(&self.layout.installed_manifest(self.working_dir, name))?;

        // Only the same scope is followed into dependencies.
        for (child, child_constraint) in dependency_entries(&manifest, self.scope).unwrap_or_default() {
            if self.layout.is_platform_requirement(&child) {
                continue;
            }
            let child_ref = self.expand(&child, &child_constraint, level + 1)?;
            reference.dependencies.insert(child_ref);
        }

        Ok(reference)
    }
}
