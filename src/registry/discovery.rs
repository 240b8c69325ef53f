use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::models::ManagerId;

use super::ManagerDescriptor;

/// Directories holding installed dependencies or tool state rather than
/// project definition files.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn", ".gradle", "build", "node_modules", "vendor"];

/// Find the definition files under `root` for each of `managers`.
///
/// The tree is walked once. A file may belong to several managers. Within a
/// directory, a manager's secondary manifests are dropped when one of its
/// primary manifests is present. When a single manager is active and `root`
/// is a file, that file is taken as its definition file whatever its name.
pub fn find_managed_files(
    root: &Path,
    managers: &[&ManagerDescriptor],
) -> BTreeMap<ManagerId, Vec<PathBuf>> {
    let mut found: BTreeMap<ManagerId, Vec<PathBuf>> = BTreeMap::new();

    if root.is_file() {
        if let [only] = managers {
            found.insert(only.id, vec![root.to_path_buf()]);
        } else {
            // Several managers: a file root only counts if its name matches.
            let name = file_name(root);
            for manager in managers {
                if manager.is_primary(&name) {
                    found.entry(manager.id).or_default().push(root.to_path_buf());
                }
            }
        }
        return found;
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_skipped(e.path())));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let files = list_files(entry.path());
        for manager in managers {
            let matched = managed_in_directory(manager, &files);
            if !matched.is_empty() {
                found.entry(manager.id).or_default().extend(matched);
            }
        }
    }

    found
}

/// Definition files of `manager` among one directory's `files`.
fn managed_in_directory(manager: &ManagerDescriptor, files: &[PathBuf]) -> Vec<PathBuf> {
    let has_primary = files.iter().any(|f| manager.is_primary(&file_name(f)));

    files
        .iter()
        .filter(|f| {
            let name = file_name(f);
            manager.is_primary(&name) || (!has_primary && manager.is_secondary(&name))
        })
        .cloned()
        .collect()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            log::warn!("Could not list '{}': {}", dir.display(), e);
            Vec::new()
        }
    };
    files.sort();
    files
}

fn is_skipped(path: &Path) -> bool {
    SKIPPED_DIRS.contains(&file_name(path).as_str())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
