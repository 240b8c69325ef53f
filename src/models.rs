use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier of a supported package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManagerId {
    Composer,
    Npm,
    Gradle,
}

impl ManagerId {
    pub const ALL: [ManagerId; 3] = [ManagerId::Composer, ManagerId::Npm, ManagerId::Gradle];

    /// Parse a manager name as given on the command line, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "composer" | "phpcomposer" => Some(ManagerId::Composer),
            "npm" => Some(ManagerId::Npm),
            "gradle" => Some(ManagerId::Gradle),
            _ => None,
        }
    }
}

impl std::fmt::Display for ManagerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerId::Composer => write!(f, "Composer"),
            ManagerId::Npm => write!(f, "NPM"),
            ManagerId::Gradle => write!(f, "Gradle"),
        }
    }
}

/// Version-control coordinates of a project or package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    pub provider: String,
    pub url: String,
    pub revision: String,
    pub path: String,
}

impl VcsInfo {
    /// Sentinel for "no version control detected".
    pub const EMPTY: VcsInfo = VcsInfo {
        provider: String::new(),
        url: String::new(),
        revision: String::new(),
        path: String::new(),
    };

    pub fn is_empty(&self) -> bool {
        self.provider.is_empty() && self.url.is_empty() && self.revision.is_empty()
    }
}

/// Location of a downloadable artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtifact {
    pub url: String,
    pub hash: String,
}

impl RemoteArtifact {
    pub const EMPTY: RemoteArtifact = RemoteArtifact {
        url: String::new(),
        hash: String::new(),
    };
}

/// A resolved third-party package.
///
/// Equality and ordering only consider the identity
/// `(package_manager, namespace, name, version)`, so a `BTreeSet<Package>`
/// keeps exactly one record per coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub package_manager: ManagerId,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub declared_licenses: BTreeSet<String>,
    pub description: String,
    pub homepage_url: String,
    pub binary_artifact: RemoteArtifact,
    pub source_artifact: RemoteArtifact,
    pub vcs: VcsInfo,
}

impl Package {
    /// A package known only by its coordinates.
    pub fn bare(package_manager: ManagerId, namespace: &str, name: &str, version: &str) -> Self {
        Package {
            package_manager,
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            declared_licenses: BTreeSet::new(),
            description: String::new(),
            homepage_url: String::new(),
            binary_artifact: RemoteArtifact::EMPTY,
            source_artifact: RemoteArtifact::EMPTY,
            vcs: VcsInfo::EMPTY,
        }
    }

    fn identity(&self) -> (ManagerId, &str, &str, &str) {
        (self.package_manager, &self.namespace, &self.name, &self.version)
    }

    /// A reference edge pointing at this package, without children.
    pub fn to_reference(&self) -> PackageReference {
        PackageReference::new(&self.namespace, &self.name, &self.version)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Package {}

impl PartialOrd for Package {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Package {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

/// One edge position in a scope's dependency tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageReference {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub dependencies: BTreeSet<PackageReference>,
}

impl PackageReference {
    pub fn new(namespace: &str, name: &str, version: &str) -> Self {
        PackageReference {
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            dependencies: BTreeSet::new(),
        }
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.namespace, &self.name, &self.version)
    }
}

impl PartialEq for PackageReference {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for PackageReference {}

impl PartialOrd for PackageReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

/// A named group of dependencies, e.g. `require` or `require-dev`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    /// Whether the dependencies ship with the delivered artifact.
    pub delivered: bool,
    pub dependencies: BTreeSet<PackageReference>,
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Scope {}

impl PartialOrd for Scope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub package_manager: ManagerId,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub declared_licenses: BTreeSet<String>,
    pub aliases: Vec<String>,
    pub vcs: VcsInfo,
    pub homepage_url: String,
    pub scopes: BTreeSet<Scope>,
}

impl Project {
    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name == name)
    }
}

/// Outcome of resolving one definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub success: bool,
    pub project: Project,
    pub packages: BTreeSet<Package>,
    pub errors: Vec<String>,
}

impl AnalyzerResult {
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }
}
