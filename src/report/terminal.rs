use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::{AnalyzerResult, PackageReference};
use crate::orchestrator::ManagerReport;

/// Render a colored terminal report.
pub fn render(reports: &[ManagerReport], verbose: bool) -> Result<()> {
    for report in reports {
        println!(
            "\n {} {} definition file(s)",
            report.manager.to_string().bold(),
            report.files.len()
        );

        if report.files.is_empty() {
            continue;
        }
        println!("{}", files_table(report));

        for file in &report.files {
            let Some(result) = &file.result else {
                continue;
            };
            println!(
                "\n {} {}",
                "→".cyan(),
                file.definition_file.display().to_string().bold()
            );
            for error in &result.errors {
                println!("   {} {}", "[ERROR]".red().bold(), error);
            }
            if !result.packages.is_empty() {
                println!("{}", packages_table(result));
            }
            if verbose {
                print_scopes(result);
            }
        }
    }

    let (resolved, failed) = totals(reports);
    println!(
        "\n Resolved: {}  Failed: {}",
        resolved.to_string().green(),
        failed.to_string().red()
    );

    Ok(())
}

fn files_table(report: &ManagerReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Definition file").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Packages").add_attribute(Attribute::Bold),
            Cell::new("Scopes").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for file in &report.files {
        let path = file.definition_file.display().to_string();
        let row = match &file.result {
            Some(result) => {
                let (status, color) = if result.errors.is_empty() {
                    ("✓ resolved".to_string(), Color::Green)
                } else {
                    (format!("⚠ {} error(s)", result.errors.len()), Color::Yellow)
                };
                vec![
                    Cell::new(path),
                    Cell::new(project_label(result)),
                    Cell::new(result.packages.len()).set_alignment(CellAlignment::Right),
                    Cell::new(result.project.scopes.len()).set_alignment(CellAlignment::Right),
                    Cell::new(status).fg(color),
                ]
            }
            None => vec![
                Cell::new(path),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
                Cell::new("✗ failed").fg(Color::Red),
            ],
        };
        table.add_row(row);
    }

    table
}

fn packages_table(result: &AnalyzerResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Licenses").add_attribute(Attribute::Bold),
            Cell::new("VCS").add_attribute(Attribute::Bold),
        ]);

    for pkg in &result.packages {
        let name = if pkg.namespace.is_empty() || pkg.name.starts_with(&pkg.namespace) {
            pkg.name.clone()
        } else {
            format!("{}/{}", pkg.namespace, pkg.name)
        };
        let licenses = if pkg.declared_licenses.is_empty() {
            Cell::new("unknown").fg(Color::DarkGrey)
        } else {
            Cell::new(pkg.declared_licenses.iter().cloned().collect::<Vec<_>>().join(", "))
        };
        let vcs = if pkg.vcs.is_empty() {
            String::new()
        } else {
            format!("{} {} {}", pkg.vcs.provider, pkg.vcs.url, short_revision(&pkg.vcs.revision))
        };

        table.add_row(vec![Cell::new(name), Cell::new(&pkg.version), licenses, Cell::new(vcs.trim())]);
    }

    table
}

fn print_scopes(result: &AnalyzerResult) {
    for scope in &result.project.scopes {
        let marker = if scope.delivered { "" } else { " (not delivered)" };
        println!("   {}{}", scope.name.bold(), marker.dimmed());
        let mut lines = Vec::new();
        tree_lines(&scope.dependencies, 2, &mut lines);
        for line in lines {
            println!("{}", line);
        }
    }
}

fn tree_lines(refs: &std::collections::BTreeSet<PackageReference>, indent: usize, out: &mut Vec<String>) {
    for reference in refs {
        out.push(format!(
            "{}{} {}",
            "  ".repeat(indent),
            reference.name,
            reference.version.dimmed()
        ));
        tree_lines(&reference.dependencies, indent + 1, out);
    }
}

fn project_label(result: &AnalyzerResult) -> String {
    let project = &result.project;
    match (project.name.is_empty(), project.version.is_empty()) {
        (true, _) => String::new(),
        (false, true) => project.name.clone(),
        (false, false) => format!("{} {}", project.name, project.version),
    }
}

fn short_revision(revision: &str) -> &str {
    revision.get(..12).unwrap_or(revision)
}

fn totals(reports: &[ManagerReport]) -> (usize, usize) {
    reports
        .iter()
        .flat_map(|r| &r.files)
        .fold((0, 0), |(ok, failed), f| match f.result {
            Some(_) => (ok + 1, failed),
            None => (ok, failed + 1),
        })
}
