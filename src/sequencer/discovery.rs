//! Unit discovery.
//!
//! A unit is any directory under the project root holding both the engine
//! manifest and the unit entry point.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::{ENTRY_POINT_FILE, MANIFEST_FILE};
use crate::error::{ConfigError, Result};

/// Units excluded from every run unless overridden.
pub const DEFAULT_EXCLUDES: &[&str] = &["app/test"];

/// Top-level directory holding infrastructure units.
const INFRA_DIR: &str = "infra";

/// Deployment group of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitGroup {
    /// Shared infrastructure under `infra/`.
    Infra,
    /// Applications, everything else.
    App,
}

impl fmt::Display for UnitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infra => f.write_str("infra"),
            Self::App => f.write_str("app"),
        }
    }
}

/// A deployable unit directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    /// Absolute unit directory.
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative: String,
    /// Deployment group.
    pub group: UnitGroup,
}

impl Unit {
    fn new(root: &Path, path: PathBuf) -> Self {
        let relative = relative_path(root, &path);
        let group = if relative == INFRA_DIR || relative.starts_with(&format!("{INFRA_DIR}/")) {
            UnitGroup::Infra
        } else {
            UnitGroup::App
        };
        Self {
            path,
            relative,
            group,
        }
    }

    /// Returns true if the unit is, or lies under, an excluded path.
    #[must_use]
    pub fn is_excluded(&self, excludes: &[String]) -> bool {
        excludes.iter().any(|exclude| {
            let exclude = exclude.trim_matches('/');
            self.relative == exclude || self.relative.starts_with(&format!("{exclude}/"))
        })
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns true if `dir` holds a manifest and an entry point.
fn is_unit_dir(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file() && dir.join(ENTRY_POINT_FILE).is_file()
}

/// Discovers every unit under `root` in sorted path order.
///
/// Hidden directories are not searched. Excluded units are dropped.
///
/// # Errors
///
/// Returns an error if the root does not exist or cannot be read.
pub fn discover_units(root: &Path, excludes: &[String]) -> Result<Vec<Unit>> {
    if !root.is_dir() {
        return Err(ConfigError::FileNotFound {
            path: root.to_path_buf(),
        }
        .into());
    }

    let mut dirs = Vec::new();
    walk(root, &mut dirs)?;
    dirs.sort();

    let units: Vec<Unit> = dirs
        .into_iter()
        .map(|dir| Unit::new(root, dir))
        .filter(|unit| {
            let excluded = unit.is_excluded(excludes);
            if excluded {
                debug!("Excluding unit {}", unit.relative);
            }
            !excluded
        })
        .collect();

    debug!("Discovered {} units under {}", units.len(), root.display());
    Ok(units)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    if is_unit_dir(dir) {
        found.push(dir.to_path_buf());
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        walk(&entry.path(), found)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_unit(root: &Path, rel: &str) {
        let dir = root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), "name: x\nruntime: yaml\n").unwrap();
        std::fs::write(dir.join(ENTRY_POINT_FILE), "kind: network\n").unwrap();
    }

    fn defaults() -> Vec<String> {
        DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_discover_and_partition() {
        let root = tempfile::tempdir().unwrap();
        make_unit(root.path(), "infra/sg/default");
        make_unit(root.path(), "infra/network");
        make_unit(root.path(), "app/web");
        make_unit(root.path(), "app/test");
        make_unit(root.path(), ".cache/stale");
        std::fs::create_dir_all(root.path().join("docs")).unwrap();
        std::fs::write(root.path().join("docs").join(MANIFEST_FILE), "name: docs\n").unwrap();

        let units = discover_units(root.path(), &defaults()).unwrap();
        let names: Vec<&str> = units.iter().map(|u| u.relative.as_str()).collect();
        assert_eq!(names, vec!["app/web", "infra/network", "infra/sg/default"]);

        assert_eq!(units[0].group, UnitGroup::App);
        assert_eq!(units[1].group, UnitGroup::Infra);
        assert_eq!(units[1].path, root.path().join("infra/network"));
    }

    #[test]
    fn test_exclusion_covers_nested_units() {
        let root = tempfile::tempdir().unwrap();
        make_unit(root.path(), "app/test");
        make_unit(root.path(), "app/test/inner");
        make_unit(root.path(), "app/testing");

        let units = discover_units(root.path(), &defaults()).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].relative, "app/testing");

        let all = discover_units(root.path(), &[]).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_infrastructure_prefix_is_a_directory() {
        let root = tempfile::tempdir().unwrap();
        make_unit(root.path(), "infrastructure/db");

        let units = discover_units(root.path(), &[]).unwrap();
        assert_eq!(units[0].group, UnitGroup::App);
    }

    #[test]
    fn test_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(discover_units(&root.path().join("missing"), &[]).is_err());
    }
}
