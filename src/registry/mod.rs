//! The table of supported package managers.
//!
//! Each entry pairs an immutable [`ManagerDescriptor`] (identity and
//! definition-file patterns) with the [`PackageManager`] implementation that
//! resolves those files. The registry is built once in `main` and shared.

use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::analyzer::composer::Composer;
use crate::analyzer::gradle::Gradle;
use crate::analyzer::npm::Npm;
use crate::analyzer::PackageManager;
use crate::error::Result;
use crate::models::ManagerId;

pub mod discovery;

/// Identity and definition-file patterns of a package manager.
#[derive(Debug)]
pub struct ManagerDescriptor {
    pub id: ManagerId,
    pub homepage: &'static str,
    pub patterns: Vec<&'static str>,
    /// Fallback manifests, ignored in directories that also hold a primary one.
    pub secondary_patterns: Vec<&'static str>,
    primary: GlobSet,
    secondary: GlobSet,
}

impl ManagerDescriptor {
    pub fn new(
        id: ManagerId,
        homepage: &'static str,
        patterns: &[&'static str],
        secondary_patterns: &[&'static str],
    ) -> Result<Self> {
        Ok(Self {
            id,
            homepage,
            patterns: patterns.to_vec(),
            secondary_patterns: secondary_patterns.to_vec(),
            primary: build_set(patterns)?,
            secondary: build_set(secondary_patterns)?,
        })
    }

    /// Whether `file_name` is a primary definition file of this manager.
    pub fn is_primary(&self, file_name: &str) -> bool {
        self.primary.is_match(file_name)
    }

    pub fn is_secondary(&self, file_name: &str) -> bool {
        self.secondary.is_match(file_name)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.is_primary(file_name) || self.is_secondary(file_name)
    }

    /// `Name (primary, ...; secondary, ...)` for status output.
    pub fn summary(&self) -> String {
        let mut files = self.patterns.join(", ");
        if !self.secondary_patterns.is_empty() {
            files.push_str("; ");
            files.push_str(&self.secondary_patterns.join(", "));
        }
        format!("{} ({})", self.id, files)
    }
}

fn build_set(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

pub struct ManagerRegistry {
    managers: Vec<Arc<dyn PackageManager>>,
}

impl ManagerRegistry {
    /// Registry with every supported package manager.
    pub fn new() -> Result<Self> {
        Ok(Self::from_managers(vec![
            Arc::new(Composer::new()?),
            Arc::new(Npm::new()?),
            Arc::new(Gradle::new()?),
        ]))
    }

    pub fn from_managers(managers: Vec<Arc<dyn PackageManager>>) -> Self {
        Self { managers }
    }

    pub fn get(&self, id: ManagerId) -> Option<Arc<dyn PackageManager>> {
        self.managers.iter().find(|m| m.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<ManagerId> {
        self.managers.iter().map(|m| m.id()).collect()
    }

    /// The registered managers among `ids`, in registry order.
    pub fn select(&self, ids: &[ManagerId]) -> Vec<Arc<dyn PackageManager>> {
        self.managers
            .iter()
            .filter(|m| ids.contains(&m.id()))
            .cloned()
            .collect()
    }
}
