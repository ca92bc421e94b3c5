//! Dependency extraction from package manifests.
//!
//! Each manifest is handled independently: a missing manifest is skipped silently and a
//! malformed one is logged and skipped without affecting the others.

use super::LOG_TARGET;
use crate::acquisition::dataset::{Dependency, Ecosystem};
use std::fs;
use std::io;
use std::path::Path;

const UNSPECIFIED: &str = "unspecified";

/// Version separators for `requirements.txt`, in the order they are tried
const REQUIREMENT_SEPARATORS: [&str; 7] = ["==", ">=", "<=", "~=", "!=", "<", ">"];

type Parser = fn(&str) -> Result<Vec<Dependency>, String>;

const MANIFESTS: [(&str, Parser); 4] = [
    ("requirements.txt", |text| Ok(parse_requirements(text))),
    ("package.json", parse_package_json),
    ("go.mod", |text| Ok(parse_go_mod(text))),
    ("Cargo.toml", parse_cargo_toml),
];

/// Collect the dependencies declared by every supported manifest at the root of `repo`
#[must_use]
pub fn extract_dependencies(repo: &Path) -> Vec<Dependency> {
    let mut dependencies = Vec::new();

    for (file_name, parse) in MANIFESTS {
        let path = repo.join(file_name);
        let text = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read '{}': {e}", path.display());
                continue;
            }
        };

        match parse(&text) {
            Ok(deps) => {
                log::debug!(target: LOG_TARGET, "Found {} dependencies in {file_name}", deps.len());
                dependencies.extend(deps);
            }
            Err(e) => log::warn!(target: LOG_TARGET, "Could not parse {file_name}: {e}"),
        }
    }

    dependencies
}

/// Parse a pip `requirements.txt`
#[must_use]
pub fn parse_requirements(text: &str) -> Vec<Dependency> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| !line.starts_with("-e") && !line.starts_with("http"))
        .map(|line| {
            REQUIREMENT_SEPARATORS
                .iter()
                .find_map(|sep| line.split_once(sep))
                .map_or_else(
                    || Dependency::new(line, UNSPECIFIED, Ecosystem::Python),
                    |(name, version)| Dependency::new(name.trim(), version.trim(), Ecosystem::Python),
                )
        })
        .collect()
}

/// Parse the `dependencies` and `devDependencies` of a `package.json`, in file order
pub fn parse_package_json(text: &str) -> Result<Vec<Dependency>, String> {
    let manifest: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;

    let mut dependencies = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        let Some(entries) = manifest.get(section).and_then(serde_json::Value::as_object) else {
            continue;
        };

        for (name, version) in entries {
            let version = version.as_str().map_or_else(|| version.to_string(), str::to_string);
            dependencies.push(Dependency::new(name.as_str(), version, Ecosystem::NodeJs));
        }
    }

    Ok(dependencies)
}

/// Parse the `require` directives of a `go.mod`
#[must_use]
pub fn parse_go_mod(text: &str) -> Vec<Dependency> {
    let mut dependencies = Vec::new();
    let mut in_require_block = false;

    for line in text.lines().map(str::trim) {
        if line.starts_with("require (") {
            in_require_block = true;
            continue;
        }

        if in_require_block && line == ")" {
            in_require_block = false;
            continue;
        }

        let entry = match line.strip_prefix("require ") {
            Some(rest) => rest.trim(),
            None if in_require_block => line,
            None => continue,
        };

        if entry.is_empty() || entry.starts_with("//") {
            continue;
        }

        let mut parts = entry.split_whitespace();
        if let (Some(name), Some(version)) = (parts.next(), parts.next()) {
            dependencies.push(Dependency::new(name, version, Ecosystem::Go));
        }
    }

    dependencies
}

/// Parse the `[dependencies]` table of a `Cargo.toml`.
///
/// Only entries written inside the `[dependencies]` table itself are considered; the
/// version comes from a plain string or from the `version` key of an inline table.
pub fn parse_cargo_toml(text: &str) -> Result<Vec<Dependency>, String> {
    let doc: toml_edit::DocumentMut = text.parse().map_err(|e: toml_edit::TomlError| e.to_string())?;

    let Some(table) = doc.get("dependencies").and_then(toml_edit::Item::as_table) else {
        return Ok(Vec::new());
    };

    let dependencies = table
        .iter()
        .filter_map(|(name, item)| {
            let value = item.as_value()?;
            let version = value
                .as_str()
                .or_else(|| value.as_inline_table()?.get("version")?.as_str())
                .unwrap_or(UNSPECIFIED);
            Some(Dependency::new(name, version, Ecosystem::Rust))
        })
        .collect();

    Ok(dependencies)
}
