//! Scenario directory loading
//!
//! A scenario directory is walked once and flattened: every `*.yaml` file
//! becomes one entry tagged with its group path (the `/`-joined
//! subdirectories it sits in).

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::model::{Scenario, ScenarioFile};
use crate::common::{Error, Result};

/// One loaded scenario and where it came from
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Group path, empty for top-level scenarios
    pub group: String,
    pub scenario: Scenario,
    pub file: PathBuf,
}

impl CatalogEntry {
    /// `group/name`, or just `name` at the top level
    pub fn path(&self) -> String {
        if self.group.is_empty() {
            self.scenario.name.clone()
        } else {
            format!("{}/{}", self.group, self.scenario.name)
        }
    }
}

/// Flattened view of a scenario directory
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    entries: Vec<CatalogEntry>,
    groups: BTreeSet<String>,
}

/// Summary of one group for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub path: String,
    pub scenarios_count: usize,
    pub subgroups: Vec<String>,
}

impl ScenarioCatalog {
    /// Load every scenario under `dir`; a missing directory is an empty catalog
    pub fn load(dir: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        if dir.is_dir() {
            walk(dir, "", &mut HashSet::new(), &mut entries)?;
        } else {
            tracing::debug!(dir = %dir.display(), "Scenario directory does not exist");
        }
        Ok(Self::from_entries(entries))
    }

    /// Build a catalog from already loaded entries
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by_key(|e| e.path());

        let mut groups = BTreeSet::new();
        for entry in &entries {
            let mut prefix = String::new();
            for segment in entry.group.split('/').filter(|s| !s.is_empty()) {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                groups.insert(prefix.clone());
            }
        }

        Self { entries, groups }
    }

    pub fn all(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find by full path (`group/name`) first, then by bare name
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        let name = name.trim_matches('/');
        self.entries
            .iter()
            .find(|e| e.path() == name)
            .or_else(|| self.entries.iter().find(|e| e.scenario.name == name))
    }

    /// Scenarios in `group` and all groups nested below it
    pub fn in_group(&self, group: &str) -> Vec<&CatalogEntry> {
        let group = group.trim_matches('/');
        self.entries
            .iter()
            .filter(|e| is_within(&e.group, group))
            .collect()
    }

    /// Every group path that holds at least one scenario, directly or nested
    pub fn group_paths(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn has_group(&self, group: &str) -> bool {
        let group = group.trim_matches('/');
        group.is_empty() || self.groups.contains(group)
    }

    pub fn group_summary(&self, group: &str) -> GroupSummary {
        let group = group.trim_matches('/');
        let depth = if group.is_empty() {
            0
        } else {
            group.split('/').count()
        };
        let subgroups = self
            .groups
            .iter()
            .filter(|g| is_within(g, group) && g.split('/').count() == depth + 1)
            .cloned()
            .collect();

        GroupSummary {
            name: group.rsplit('/').next().unwrap_or_default().to_string(),
            path: group.to_string(),
            scenarios_count: self.in_group(group).len(),
            subgroups,
        }
    }
}

fn is_within(path: &str, group: &str) -> bool {
    group.is_empty()
        || path == group
        || (path.starts_with(group) && path.as_bytes().get(group.len()) == Some(&b'/'))
}

/// Symlinked directories are followed, but each real directory is read once
fn walk(
    dir: &Path,
    group: &str,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<CatalogEntry>,
) -> Result<()> {
    let real = dir.canonicalize().map_err(|e| Error::file_read(dir, e))?;
    if !visited.insert(real) {
        tracing::warn!(dir = %dir.display(), "Skipping already visited scenario directory");
        return Ok(());
    }

    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    children.sort();

    for path in children {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            let nested = if group.is_empty() {
                file_name.to_string()
            } else {
                format!("{group}/{file_name}")
            };
            walk(&path, &nested, visited, out)?;
        } else if is_yaml(&path) {
            out.push(CatalogEntry {
                group: group.to_string(),
                scenario: load_file(&path)?,
                file: path,
            });
        }
    }
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parse a single scenario file; its stem is the default name
pub fn load_file(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    let file: ScenarioFile = serde_yaml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse scenario '{}': {}",
            path.display(),
            e
        ))
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scenario");
    Ok(Scenario::from_file(stem, file))
}
