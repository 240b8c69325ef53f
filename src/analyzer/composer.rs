use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::command::{command_line, CommandOutput, Platform};
use crate::error::{AnalyzerError, Result};
use crate::models::{AnalyzerResult, ManagerId, Package, RemoteArtifact, VcsInfo};
use crate::registry::ManagerDescriptor;
use crate::vcs::VcsKind;

use super::graph::{resolve_installed, InstalledLayout, ScopeSpec};
use super::{PackageManager, ResolveContext};

const COMPOSER_PHAR: &str = "composer.phar";

const SCOPES: [ScopeSpec; 2] = [
    ScopeSpec { name: "require", delivered: true },
    ScopeSpec { name: "require-dev", delivered: false },
];

pub struct Composer {
    descriptor: ManagerDescriptor,
}

impl Composer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            descriptor: ManagerDescriptor::new(
                ManagerId::Composer,
                "https://getcomposer.org/",
                &["composer.json"],
                &[],
            )?,
        })
    }

    /// Run Composer with `args`; returns the rendered command line with the output.
    fn invoke(&self, ctx: &ResolveContext, working_dir: &Path, args: &[&str])
        -> Result<(String, CommandOutput)> {
        let has_phar = working_dir.join(COMPOSER_PHAR).is_file();
        let (program, args) = match command_for(ctx.platform, has_phar) {
            COMPOSER_PHAR => {
                let mut phar_args = vec![COMPOSER_PHAR];
                phar_args.extend_from_slice(args);
                ("php", phar_args)
            }
            program => (program, args.to_vec()),
        };
        let output = ctx.runner().run(working_dir, program, &args)?;
        Ok((command_line(program, &args), output))
    }
}

/// Composer entry point: a project-local `composer.phar` on Unix (run
/// through `php`), otherwise the globally installed script.
pub fn command_for(platform: Platform, has_local_phar: bool) -> &'static str {
    match platform {
        Platform::Windows => "composer.bat",
        Platform::Unix if has_local_phar => COMPOSER_PHAR,
        Platform::Unix => "composer",
    }
}

impl InstalledLayout for Composer {
    fn manager(&self) -> ManagerId {
        ManagerId::Composer
    }

    fn scopes(&self) -> &[ScopeSpec] {
        &SCOPES
    }

    fn install(&self, ctx: &ResolveContext, working_dir: &Path) -> Result<()> {
        let (command, output) = self.invoke(ctx, working_dir, &["install", "--no-interaction"])?;
        if !output.success() {
            return Err(AnalyzerError::InstallFailure {
                command,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn installed_manifest(&self, working_dir: &Path, name: &str) -> PathBuf {
        working_dir.join("vendor").join(name).join("composer.json")
    }

    fn lookup_package(&self, ctx: &ResolveContext, working_dir: &Path, name: &str)
        -> Result<Option<Package>> {
        let (command, output) = self.invoke(ctx, working_dir, &["show", name])?;
        if !output.success() {
            log::warn!("'{}' exited with code {}", command, output.code);
            return Ok(None);
        }
        parse_show_output(&output.stdout, name).map(Some)
    }

    fn coordinates(&self, name: &str) -> (String, String) {
        let namespace = name.split_once('/').map(|(ns, _)| ns).unwrap_or_default();
        (namespace.to_string(), name.to_string())
    }

    /// `php`, `ext-*`, `lib-*` and friends carry no vendor prefix.
    fn is_platform_requirement(&self, name: &str) -> bool {
        !name.contains('/')
    }
}

impl PackageManager for Composer {
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

/// Build a [`Package`] from the header block of `composer show <name>`.
///
/// ```text
/// name     : monolog/monolog
/// descrip. : Sends your logs to files, sockets, inboxes, databases and various web services
/// versions : * 1.23.0
/// license  : MIT License (MIT) (OSI approved) https://spdx.org/licenses/MIT.html#licenseText
/// source   : [git] https://github.com/Seldaek/monolog.git fd8c7877
/// ```
fn parse_show_output(stdout: &str, requested: &str) -> Result<Package> {
    let fields = show_fields(stdout)?;
    let field = |key: &str| fields.get(key).cloned().unwrap_or_default();

    let name = match field("name") {
        n if n.is_empty() => requested.to_string(),
        n => n,
    };
    let namespace = name.split_once('/').map(|(ns, _)| ns).unwrap_or_default();

    let version_re = Regex::new(r"\*\s*([^\s,]+)")?;
    let version = version_re
        .captures(&field("versions"))
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let mut package = Package::bare(ManagerId::Composer, namespace, &name, &version);
    package.description = field("descrip.");
    package.homepage_url = field("homepage");
    package.declared_licenses = parse_licenses(&field("license"))?;

    if let Some((kind, url, reference)) = parse_source(&field("source"))? {
        package.vcs = VcsInfo {
            provider: VcsKind::from_source_type(&kind)
                .map(|k| k.to_string())
                .unwrap_or(kind),
            url,
            revision: reference,
            path: String::new(),
        };
    }
    if let Some((_, url, _)) = parse_source(&field("dist"))? {
        package.source_artifact = RemoteArtifact {
            url,
            hash: String::new(),
        };
    }

    Ok(package)
}

/// `key : value` pairs of the header block, first occurrence wins.
fn show_fields(stdout: &str) -> Result<BTreeMap<String, String>> {
    let re = Regex::new(r"^([\w.]+)\s*:\s*(.*)$")?;
    let mut fields = BTreeMap::new();

    for line in stdout.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some(caps) = re.captures(line) {
            fields
                .entry(caps[1].to_string())
                .or_insert_with(|| caps[2].trim().to_string());
        }
    }

    Ok(fields)
}

/// SPDX identifiers in parentheses, or the leading token when there are none.
fn parse_licenses(value: &str) -> Result<BTreeSet<String>> {
    let re = Regex::new(r"\(([^()\s]+)\)")?;
    let mut licenses: BTreeSet<String> =
        re.captures_iter(value).map(|c| c[1].to_string()).collect();

    if licenses.is_empty() {
        if let Some(first) = value.split([',', ' ']).find(|t| !t.is_empty()) {
            licenses.insert(first.to_string());
        }
    }

    Ok(licenses)
}

/// `[type] url reference`
fn parse_source(value: &str) -> Result<Option<(String, String, String)>> {
    let re = Regex::new(r"^\[(\w+)\]\s+(\S+)\s*(\S*)")?;
    Ok(re
        .captures(value)
        .map(|c| (c[1].to_string(), c[2].to_string(), c[3].to_string())))
}
