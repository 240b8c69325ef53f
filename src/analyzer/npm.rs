use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::command::{command_line, Platform};
use crate::error::{AnalyzerError, Result};
use crate::manifest::{declared_licenses, read_manifest, text};
use crate::models::{AnalyzerResult, ManagerId, Package, RemoteArtifact};
use crate::registry::ManagerDescriptor;

use super::graph::{resolve_installed, InstalledLayout, ScopeSpec};
use super::{PackageManager, ResolveContext};

const SCOPES: [ScopeSpec; 3] = [
    ScopeSpec { name: "dependencies", delivered: true },
    ScopeSpec { name: "devDependencies", delivered: false },
    ScopeSpec { name: "optionalDependencies", delivered: true },
];

const INSTALL_ARGS: [&str; 4] = ["install", "--ignore-scripts", "--no-audit", "--no-fund"];

pub struct Npm {
    descriptor: ManagerDescriptor,
}

impl Npm {
    pub fn new() -> Result<Self> {
        Ok(Self {
            descriptor: ManagerDescriptor::new(
                ManagerId::Npm,
                "https://www.npmjs.com/",
                &["package.json"],
                &[],
            )?,
        })
    }
}

pub fn command_for(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "npm.cmd",
        Platform::Unix => "npm",
    }
}

/// Split `@scope/name` into its scope and bare name.
fn split_name(name: &str) -> (String, String) {
    match name.split_once('/') {
        Some((scope, bare)) if scope.starts_with('@') => (scope.to_string(), bare.to_string()),
        _ => (String::new(), name.to_string()),
    }
}

impl InstalledLayout for Npm {
    fn manager(&self) -> ManagerId {
        ManagerId::Npm
    }

    fn scopes(&self) -> &[ScopeSpec] {
        &SCOPES
    }

    fn install(&self, ctx: &ResolveContext, working_dir: &Path) -> Result<()> {
        let program = command_for(ctx.platform);
        let output = ctx.runner().run(working_dir, program, &INSTALL_ARGS)?;
        if !output.success() {
            return Err(AnalyzerError::InstallFailure {
                command: command_line(program, &INSTALL_ARGS),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn installed_manifest(&self, working_dir: &Path, name: &str) -> PathBuf {
        working_dir.join("node_modules").join(name).join("package.json")
    }

    fn lookup_package(&self, ctx: &ResolveContext, working_dir: &Path, name: &str)
        -> Result<Option<Package>> {
        let path = self.installed_manifest(working_dir, name);
        if !path.is_file() {
            log::warn!("'{}' is not installed under node_modules", name);
            return Ok(None);
        }

        let manifest = read_manifest(&path)?;
        Ok(Some(package_from_manifest(ctx, &manifest, name)))
    }

    fn coordinates(&self, name: &str) -> (String, String) {
        split_name(name)
    }
}

impl PackageManager for Npm {
    fn descriptor(&self) -> &ManagerDescriptor {
        &self.descriptor
    }

    fn resolve(
        &self,
        ctx: &ResolveContext,
        project_dir: &Path,
        working_dir: &Path,
        definition_file: &Path,
    ) -> Result<AnalyzerResult> {
        resolve_installed(self, ctx, project_dir, working_dir, definition_file)
    }
}

fn package_from_manifest(ctx: &ResolveContext, manifest: &Value, requested: &str) -> Package {
    let full_name = match text(manifest, "name") {
        n if n.is_empty() => requested.to_string(),
        n => n,
    };
    let (namespace, name) = split_name(&full_name);

    let mut package = Package::bare(ManagerId::Npm, &namespace, &name, &text(manifest, "version"));
    package.description = text(manifest, "description");
    package.homepage_url = text(manifest, "homepage");
    package.declared_licenses = declared_licenses(manifest.get("license"));
    if package.declared_licenses.is_empty() {
        package.declared_licenses = declared_licenses(manifest.get("licenses"));
    }

    let repository = match manifest.get("repository") {
        Some(Value::String(url)) => url.clone(),
        Some(repo @ Value::Object(_)) => text(repo, "url"),
        _ => String::new(),
    };
    package.vcs = ctx.vcs.info_for_url(&repository, &text(manifest, "gitHead"));

    // Registry installs record where the tarball came from.
    let dist = manifest.get("dist").cloned().unwrap_or(Value::Null);
    let url = first_non_empty(text(&dist, "tarball"), text(manifest, "_resolved"));
    if !url.is_empty() {
        package.source_artifact = RemoteArtifact {
            url,
            hash: first_non_empty(text(&dist, "integrity"), text(manifest, "_integrity")),
        };
    }

    package
}

fn first_non_empty(a: String, b: String) -> String {
    if a.is_empty() {
        b
    } else {
        a
    }
}
