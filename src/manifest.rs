//! Reading JSON definition files into a node tree and pulling common
//! fields out of it.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

use crate::error::{AnalyzerError, Result};

/// Parse a JSON manifest into a [`Value`] tree.
pub fn read_manifest(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).map_err(|e| AnalyzerError::manifest(path, e))?;
    serde_json::from_str(&content).map_err(|e| AnalyzerError::manifest(path, e))
}

/// String value of `key`, or empty when absent or not a string.
pub fn text(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Normalize a `license` field into a set.
///
/// A single value becomes a one-element set; an array is joined with `;`
/// and split again, so entries are de-duplicated and blanks dropped. npm's
/// legacy `{ "type": "MIT" }` object form is accepted too.
pub fn declared_licenses(license: Option<&Value>) -> BTreeSet<String> {
    let joined = match license {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(license_entry)
            .collect::<Vec<_>>()
            .join(";"),
        Some(obj @ Value::Object(_)) => license_entry(obj),
        _ => String::new(),
    };

    joined
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn license_entry(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => text(value, "type"),
        other => other.to_string(),
    }
}

/// `(name, version constraint)` entries of a dependency map such as
/// `require` or `devDependencies`. Absent sections yield `None`.
pub fn dependency_entries(node: &Value, section: &str) -> Option<Vec<(String, String)>> {
    let map = node.get(section)?.as_object()?;
    Some(
        map.iter()
            .map(|(name, constraint)| {
                let constraint = constraint
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| constraint.to_string());
                (name.clone(), constraint)
            })
            .collect(),
    )
}
