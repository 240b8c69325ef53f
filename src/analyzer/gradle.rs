//! Gradle projects, resolved from the report of the `dependencies` task.
//!
//! Gradle has no installed manifests to walk: the tool prints the whole
//! resolved tree per configuration, e.g.
//!
//! ```text
//! runtimeClasspath - Runtime classpath of source set 'main'.
//! +--- com.google.guava:guava:30.0-jre -> 31.1-jre
//! |    \--- com.google.guava:failureaccess:1.0.1
//! \--- project :lib
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::command::{command_line, CommandOutput, Platform};
use crate::error::{AnalyzerError, Result};
use crate::models::{AnalyzerResult, ManagerId, Package, PackageReference, Project, Scope};
use crate::registry::ManagerDescriptor;

use super::graph::{resolve_scopes, ScopeGraph, ScopeSpec};
use super::{PackageManager, ResolveContext};

const SCOPES: [ScopeSpec; 4] = [
    ScopeSpec { name: "compileClasspath", delivered: true },
    ScopeSpec { name: "runtimeClasspath", delivered: true },
    ScopeSpec { name: "testCompileClasspath", delivered: false },
    ScopeSpec { name: "testRuntimeClasspath", delivered: false },
];

/// Width of one indentation level in the report tree.
const LEVEL_WIDTH: usize = 5;

pub struct Gradle {
    descriptor: ManagerDescriptor,
}

impl Gradle {
    pub fn new() -> Result<Self> {
        Ok(Self {
            descriptor: ManagerDescriptor::new(
                ManagerId::Gradle,
                "https://gradle.org/",
                &["build.gradle", "build.gradle.kts"],
                &["settings.gradle", "settings.gradle.kts"],
            )?,
        })
    }

    fn invoke(&self, ctx: &ResolveContext, working_dir: &Path, task: &str) -> Result<(String, CommandOutput)> {
        let wrapper = wrapper_name(ctx.platform);
        let has_wrapper = working_dir.join(wrapper).is_file();
        let program = match command_for(ctx.platform, has_wrapper) {
            p if p == wrapper => working_dir.join(p).to_string_lossy().into_owned(),
            p => p.to_string(),
        };
        let args = ["--quiet", task];
        let output = ctx.runner().run(working_dir, &program, &args)?;
        Ok((command_line(&program, &args), output))
    }
}

fn wrapper_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "gradlew.bat",
        Platform::Unix => "gradlew",
    }
}

/// The project's wrapper script when it ships one, else the installed Gradle.
pub fn command_for(platform: Platform, has_wrapper: bool) -> &'static str {
    match (platform, has_wrapper) {
        (_, true) => wrapper_name(platform),
        (Platform::Windows, false) => "gradle.bat",
        (Platform::Unix, false) => "gradle",
    }
}

impl PackageManager for Gradle {
    fn descriptor(&self) -> &ManagerDescriptor {
        &self.descriptor
    }

    fn resolve(
        &self,
        ctx: &ResolveContext,
        project_dir: &Path,
        working_dir: &Path,
        _definition_file: &Path,
    ) -> Result<AnalyzerResult> {
        let (command, report) = self.invoke(ctx, working_dir, "dependencies")?;
        if !report.success() {
            return Err(AnalyzerError::InstallFailure {
                command,
                code: report.code,
                stderr: report.stderr.trim().to_string(),
            });
        }

        let (command, props) = self.invoke(ctx, working_dir, "properties")?;
        if !props.success() {
            return Err(AnalyzerError::manifest(
                working_dir,
                format!("'{}' exited with code {}", command, props.code),
            ));
        }
        let properties = parse_properties(&props.stdout);
        let property = |key: &str| match properties.get(key).map(String::as_str) {
            None | Some("unspecified") => String::new(),
            Some(value) => value.to_string(),
        };

        let sections = split_sections(&report.stdout);
        let resolved = resolve_scopes(&SCOPES, |spec| {
            let Some(lines) = sections.get(spec.name) else {
                return Ok(None);
            };
            let (dependencies, packages) = parse_tree(lines, ctx.max_depth)?;
            Ok(Some(ScopeGraph {
                scope: Scope {
                    name: spec.name.to_string(),
                    delivered: spec.delivered,
                    dependencies,
                },
                packages,
            }))
        });

        let project = Project {
            package_manager: ManagerId::Gradle,
            namespace: property("group"),
            name: property("name"),
            version: property("version"),
            declared_licenses: BTreeSet::new(),
            aliases: Vec::new(),
            vcs: ctx.vcs.info_for_directory(ctx.runner(), project_dir),
            homepage_url: String::new(),
            scopes: resolved.scopes,
        };

        Ok(AnalyzerResult {
            success: true,
            project,
            packages: resolved.packages,
            errors: resolved.errors,
        })
    }
}

/// `key: value` lines printed by the `properties` task.
fn parse_properties(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Tree lines of every configuration in the report, keyed by configuration.
fn split_sections(report: &str) -> BTreeMap<String, Vec<&str>> {
    let mut sections: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in report.lines() {
        if line.trim().is_empty() {
            current = None;
            continue;
        }
        match &current {
            Some(name) => {
                if is_tree_line(line) {
                    sections.entry(name.clone()).or_default().push(line);
                }
            }
            None => {
                let header = line.split(" - ").next().unwrap_or_default().trim();
                if !header.is_empty() && !header.contains(char::is_whitespace) {
                    sections.entry(header.to_string()).or_default();
                    current = Some(header.to_string());
                }
            }
        }
    }

    sections
}

fn is_tree_line(line: &str) -> bool {
    line.contains("+--- ") || line.contains("\\--- ")
}

#[derive(Debug, PartialEq)]
struct Entry {
    group: String,
    name: String,
    version: String,
    failed: bool,
}

/// One report entry such as `g:a:1.0 -> 2.0 (*)`, or `None` for
/// inter-project edges.
fn parse_entry(text: &str) -> Result<Option<Entry>> {
    let mut text = text.trim();
    if text.starts_with("project ") {
        return Ok(None);
    }
    for marker in [" (*)", " (c)", " (n)"] {
        text = text.strip_suffix(marker).unwrap_or(text);
    }
    let failed = text.ends_with(" FAILED");
    let text = text.trim_end_matches(" FAILED");

    let (requested, selected) = match text.split_once(" -> ") {
        Some((requested, selected)) => (requested.trim(), Some(selected.trim())),
        None => (text, None),
    };

    let mut parts = requested.splitn(3, ':');
    let (Some(group), Some(name)) = (parts.next(), parts.next()) else {
        return Err(AnalyzerError::report(format!("unexpected dependency entry '{}'", text)));
    };
    let mut entry = Entry {
        group: group.to_string(),
        name: name.to_string(),
        version: parts.next().unwrap_or_default().to_string(),
        failed,
    };

    match selected {
        // Substituted by another module altogether.
        Some(s) if s.contains(':') => return parse_entry(s).map(|e| e.map(|e| Entry { failed, ..e })),
        Some(s) => entry.version = s.to_string(),
        None => {}
    }

    Ok(Some(entry))
}

/// Build the references and packages of one configuration. Entries deeper
/// than `max_depth` (0 = direct dependencies) are dropped.
fn parse_tree(lines: &[&str], max_depth: usize) -> Result<(BTreeSet<PackageReference>, Vec<Package>)> {
    let mut roots = BTreeSet::new();
    let mut packages = Vec::new();
    let mut stack: Vec<(usize, PackageReference)> = Vec::new();
    let mut skip_below: Option<usize> = None;

    for line in lines {
        let Some(marker) = line.find("+--- ").or_else(|| line.find("\\--- ")) else {
            continue;
        };
        let depth = marker / LEVEL_WIDTH;

        match skip_below {
            Some(level) if depth > level => continue,
            _ => skip_below = None,
        }
        if depth > max_depth {
            continue;
        }

        let Some(entry) = parse_entry(&line[marker + LEVEL_WIDTH..])? else {
            skip_below = Some(depth);
            continue;
        };

        while stack.last().is_some_and(|(d, _)| *d >= depth) {
            attach(&mut stack, &mut roots);
        }

        if entry.failed {
            log::warn!("Gradle could not resolve {}:{}:{}", entry.group, entry.name, entry.version);
        } else {
            packages.push(Package::bare(ManagerId::Gradle, &entry.group, &entry.name, &entry.version));
        }
        stack.push((depth, PackageReference::new(&entry.group, &entry.name, &entry.version)));
    }

    while !stack.is_empty() {
        attach(&mut stack, &mut roots);
    }

    Ok((roots, packages))
}

/// Pop the innermost open reference into its parent or the roots.
fn attach(stack: &mut Vec<(usize, PackageReference)>, roots: &mut BTreeSet<PackageReference>) {
    if let Some((_, reference)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => {
                parent.dependencies.insert(reference);
            }
            None => {
                roots.insert(reference);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{calls, scripted_runner, write_file};
    use crate::vcs::VcsRegistry;
    use std::sync::Arc;

    const REPORT: &str = "
------------------------------------------------------------
Root project 'app'
------------------------------------------------------------

compileClasspath - Compile classpath for source set 'main'.
+--- com.google.guava:guava:30.0-jre -> 31.1-jre
|    +--- com.google.guava:failureaccess:1.0.1
|    |    \\--- org.example:deep:1.0
|    \\--- com.google.code.findbugs:jsr305:3.0.2 (*)
+--- project :lib
|    \\--- org.lib:only-in-lib:2.0
+--- org.slf4j:slf4j-api:{strictly 1.7.30} -> 1.7.30 (c)
\\--- org.missing:gone:9.9 FAILED

runtimeClasspath - Runtime classpath of source set 'main'.
No dependencies

testCompileClasspath - Compile classpath for source set 'test'.
\\--- junit:junit:4.13.2
     \\--- org.hamcrest:hamcrest-core:1.3

testRuntimeClasspath - Runtime classpath of source set 'test'.
\\--- broken-entry
";

    const PROPERTIES: &str = "name: app\nversion: 1.4.0\ngroup: com.acme\ndescription: null\n";

    fn context(runner: crate::command::MockCommandRunner, max_depth: usize) -> ResolveContext {
        let mut ctx = ResolveContext::new(Arc::new(runner), Arc::new(VcsRegistry::new()), max_depth);
        ctx.platform = Platform::Unix;
        ctx
    }

    #[test]
    fn test_resolves_configurations_from_report() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("build.gradle");
        write_file(&definition, "");
        let (runner, log) = scripted_runner(vec![
            ("gradle --quiet dependencies", CommandOutput::ok(REPORT)),
            ("gradle --quiet properties", CommandOutput::ok(PROPERTIES)),
        ]);
        let ctx = context(runner, 1);

        let result = Gradle::new()
            .unwrap()
            .resolve_dependencies(&ctx, dir.path(), dir.path(), &definition)
            .unwrap();

        assert_eq!(calls(&log)[..2], ["gradle --quiet dependencies", "gradle --quiet properties"]);
        assert_eq!(result.project.namespace, "com.acme");
        assert_eq!(result.project.name, "app");
        assert_eq!(result.project.version, "1.4.0");

        let compile = result.project.scope("compileClasspath").unwrap();
        let roots: Vec<_> = compile.dependencies.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(roots, vec!["guava", "gone", "slf4j-api"]);

        let guava = compile.dependencies.iter().find(|r| r.name == "guava").unwrap();
        assert_eq!(guava.version, "31.1-jre");
        assert_eq!(guava.dependencies.len(), 2);
        assert!(guava.dependencies.iter().all(|c| c.dependencies.is_empty()));

        let slf4j = result.package("slf4j-api").unwrap();
        assert_eq!(slf4j.version, "1.7.30");
        assert!(result.package("gone").is_none());
        assert!(result.package("deep").is_none());
        assert!(result.package("only-in-lib").is_none());

        assert!(result.project.scope("runtimeClasspath").unwrap().dependencies.is_empty());
        assert!(!result.project.scope("testCompileClasspath").unwrap().delivered);

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("testRuntimeClasspath"));
    }

    #[test]
    fn test_depth_zero_keeps_direct_dependencies_only() {
        let lines: Vec<&str> = REPORT.lines().filter(|l| is_tree_line(l)).take(7).collect();
        let (roots, packages) = parse_tree(&lines, 0).unwrap();
        assert!(roots.iter().all(|r| r.dependencies.is_empty()));
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn test_failed_report_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("build.gradle");
        write_file(&definition, "");
        let (runner, _) = scripted_runner(vec![(
            "gradle --quiet dependencies",
            CommandOutput::failed(1, "Could not resolve all files"),
        )]);
        let ctx = context(runner, 1);

        assert!(Gradle::new()
            .unwrap()
            .resolve_dependencies(&ctx, dir.path(), dir.path(), &definition)
            .is_none());
    }

    #[test]
    fn test_wrapper_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("settings.gradle");
        write_file(&definition, "");
        write_file(&dir.path().join("gradlew"), "#!/bin/sh\n");
        let (runner, log) = scripted_runner(vec![]);
        let ctx = context(runner, 1);

        Gradle::new()
            .unwrap()
            .resolve_dependencies(&ctx, dir.path(), dir.path(), &definition)
            .unwrap();
        let expected = format!("{} --quiet dependencies", dir.path().join("gradlew").display());
        assert_eq!(calls(&log)[0], expected);
    }

    #[test]
    fn test_parse_entry_forms() {
        let entry = parse_entry("org.a:b:1.0 -> org.c:d:2.0 (*)").unwrap().unwrap();
        assert_eq!((entry.group.as_str(), entry.name.as_str(), entry.version.as_str()), ("org.c", "d", "2.0"));
        let entry = parse_entry("org.a:b -> 3.1 (n)").unwrap().unwrap();
        assert_eq!(entry.version, "3.1");
        assert!(parse_entry("project :core").unwrap().is_none());
        assert!(parse_entry("nonsense").is_err());
    }

    #[test]
    fn test_command_for_platform() {
        assert_eq!(command_for(Platform::Unix, false), "gradle");
        assert_eq!(command_for(Platform::Windows, false), "gradle.bat");
        assert_eq!(command_for(Platform::Windows, true), "gradlew.bat");
    }
}
