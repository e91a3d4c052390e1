//! Discovery of previously persisted snapshots, grouped by project and layout.
//!
//! Snapshot file names carry the identity (`<project>_<layout>_<Y-M-D>.json`),
//! so discovery is a directory listing plus name parsing; file contents are
//! not read until a layout is actually requested.

use crate::catalog::identity::SnapshotDate;
use crate::catalog::model::SNAPSHOT_SUFFIX;
use crate::config::list_with_suffix;
use crate::error::{CatalogError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotEntry {
    pub date: SnapshotDate,
    pub path: PathBuf,
}

/// Snapshot lists per layout, ascending by date; the last entry is the latest.
pub type LayoutSnapshots = BTreeMap<String, Vec<SnapshotEntry>>;

#[derive(Clone, Debug, Default)]
pub struct SnapshotRepository {
    projects: BTreeMap<String, LayoutSnapshots>,
}

impl SnapshotRepository {
    /// Scan `dir` for snapshot files. Names that do not parse are skipped with
    /// a warning rather than failing the whole scan.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut repository = SnapshotRepository::default();
        for path in list_with_suffix(dir, SNAPSHOT_SUFFIX)? {
            match parse_snapshot_name(&path) {
                Ok((project, layout, date)) => repository.register(project, layout, date, path),
                Err(err) => warn!(%err, "skipping snapshot"),
            }
        }
        for layouts in repository.projects.values_mut() {
            for entries in layouts.values_mut() {
                entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
            }
        }
        debug!(dir = %dir.display(), projects = repository.projects.len(), "discovered snapshots");
        Ok(repository)
    }

    fn register(&mut self, project: String, layout: String, date: SnapshotDate, path: PathBuf) {
        self.projects
            .entry(project)
            .or_default()
            .entry(layout)
            .or_default()
            .push(SnapshotEntry { date, path });
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn get(&self, project: &str) -> Option<&LayoutSnapshots> {
        self.projects.get(project)
    }

    /// Move one project's snapshot lists out of the repository.
    pub fn take_project(&mut self, project: &str) -> Option<LayoutSnapshots> {
        self.projects.remove(project)
    }

    /// Most recent snapshot for a `(project, layout)` pair.
    pub fn latest(&self, project: &str, layout: &str) -> Option<&SnapshotEntry> {
        self.projects.get(project)?.get(layout)?.last()
    }
}

fn parse_snapshot_name(path: &Path) -> Result<(String, String, SnapshotDate)> {
    let malformed = || CatalogError::MalformedSnapshotName {
        path: path.to_path_buf(),
    };
    let basename = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(SNAPSHOT_SUFFIX))
        .ok_or_else(malformed)?;
    let tokens: Vec<&str> = basename.split('_').collect();
    let [project, layout, date] = tokens.as_slice() else {
        return Err(malformed());
    };
    if project.is_empty() || layout.is_empty() {
        return Err(malformed());
    }
    let date = SnapshotDate::parse(date).ok_or_else(malformed)?;
    Ok((project.to_string(), layout.to_string(), date))
}
