//! Per-project layout catalog: build, snapshot, lazily reload, and query.
//!
//! A catalog runs in one of two modes. Authoring mode (no snapshot
//! directory) may build layouts and persist snapshots. User mode (snapshot
//! directory given) only loads the latest existing snapshot per layout and
//! never builds implicitly from a read operation.

use crate::catalog::identity::{LayoutKind, SnapshotDate};
use crate::catalog::model::{
    Snapshot, check_snapshot_readable, load_snapshot_from_path, write_snapshot,
};
use crate::catalog::repository::{LayoutSnapshots, SnapshotRepository};
use crate::config::{ConfigStore, ProjectConfigs};
use crate::error::{CatalogError, Result};
use crate::formats::FormatRegistry;
use crate::layout::{LayoutIndex, LayoutQuery};
use crate::table::Table;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where a catalog gets its layouts from.
#[derive(Clone, Debug)]
pub enum Representation {
    /// No snapshot exists yet; layouts must be built.
    Authoring,
    /// Snapshot lists per layout, ascending by date.
    Snapshots(LayoutSnapshots),
}

pub struct LayoutCatalog {
    project: String,
    representation: Representation,
    conf: ProjectConfigs,
    layouts: BTreeMap<String, LayoutIndex>,
    pub(crate) registry: FormatRegistry,
}

impl LayoutCatalog {
    /// Open a catalog for `project`.
    ///
    /// With `snapshot_dir` the catalog runs in user mode and the project must
    /// have at least one snapshot there; without it the catalog runs in
    /// authoring mode.
    pub fn new(project: &str, config_dir: &Path, snapshot_dir: Option<&Path>) -> Result<Self> {
        let mut store = ConfigStore::discover(config_dir)?;
        let available: Vec<String> = store.projects().map(str::to_string).collect();
        let conf = store
            .take_project(project)
            .ok_or_else(|| CatalogError::UnknownProject {
                project: project.to_string(),
                available,
            })?;

        let representation = match snapshot_dir {
            Some(dir) => {
                let mut repository = SnapshotRepository::discover(dir)?;
                let available: Vec<String> = repository.projects().map(str::to_string).collect();
                let snapshots = repository.take_project(project).ok_or_else(|| {
                    CatalogError::UnknownProjectRepresentation {
                        project: project.to_string(),
                        available,
                    }
                })?;
                Representation::Snapshots(snapshots)
            }
            None => Representation::Authoring,
        };

        Ok(Self {
            project: project.to_string(),
            representation,
            conf,
            layouts: BTreeMap::new(),
            registry: FormatRegistry::default(),
        })
    }

    /// Replace the format registry used by [`LayoutCatalog::load_data`].
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn is_user_mode(&self) -> bool {
        matches!(self.representation, Representation::Snapshots(_))
    }

    /// True when the latest snapshot of every layout in the representation
    /// can be read by this version. Always false in authoring mode.
    pub fn has_loadable_snapshots(&self) -> bool {
        let Representation::Snapshots(snapshots) = &self.representation else {
            return false;
        };
        let mut latest = snapshots.values().filter_map(|entries| entries.last()).peekable();
        latest.peek().is_some()
            && latest.all(|entry| match check_snapshot_readable(&entry.path) {
                Ok(()) => true,
                Err(err) => {
                    warn!(project = %self.project, error = %err, "snapshot is not loadable");
                    false
                }
            })
    }

    /// Index `root_dir/layout_name` and persist it as a dated snapshot in
    /// `out_dir`. With `subset`, only those subdirectories are indexed.
    ///
    /// Snapshots carry day granularity: a second build on the same day
    /// replaces the first.
    pub fn build_and_persist(
        &mut self,
        root_dir: &Path,
        layout_name: &str,
        out_dir: &Path,
        subset: Option<&[String]>,
    ) -> Result<PathBuf> {
        if LayoutKind::parse(layout_name).is_none() {
            return Err(CatalogError::UnsupportedLayout {
                layout: layout_name.to_string(),
                available: LayoutKind::names(),
            });
        }
        if !self.conf.contains(layout_name) {
            return Err(CatalogError::MissingLayoutConfig {
                project: self.project.clone(),
                layout: layout_name.to_string(),
            });
        }
        let layout_root = root_dir.join(layout_name);
        if !layout_root.is_dir() {
            return Err(CatalogError::InvalidRoot { path: layout_root });
        }

        let roots: Vec<PathBuf> = match subset {
            Some(dirs) => dirs.iter().map(|dir| layout_root.join(dir)).collect(),
            None => vec![layout_root.clone()],
        };
        let config = self.conf.load(layout_name)?;
        let index = LayoutIndex::build(layout_name, &layout_root, &roots, config)?;

        let snapshot = Snapshot::new(&self.project, SnapshotDate::today(), index);
        let outfile = write_snapshot(out_dir, &snapshot)?;
        info!(
            project = %self.project,
            layout = layout_name,
            files = snapshot.index.files().len(),
            snapshot = %outfile.display(),
            "persisted layout snapshot"
        );
        self.layouts.insert(layout_name.to_string(), snapshot.index);
        Ok(outfile)
    }

    /// Cached live index, loading the latest snapshot on first access.
    pub(crate) fn get_layout(&mut self, layout_name: &str) -> Result<&LayoutIndex> {
        if !self.layouts.contains_key(layout_name) {
            let latest = match &self.representation {
                Representation::Snapshots(snapshots) => snapshots
                    .get(layout_name)
                    .and_then(|entries| entries.last()),
                Representation::Authoring => None,
            };
            let Some(entry) = latest else {
                return Err(CatalogError::LayoutNotPrebuilt {
                    project: self.project.clone(),
                    layout: layout_name.to_string(),
                });
            };
            let snapshot = load_snapshot_from_path(&entry.path)?;
            info!(
                project = %self.project,
                layout = layout_name,
                snapshot = %entry.path.display(),
                "loaded layout snapshot"
            );
            self.layouts.insert(layout_name.to_string(), snapshot.index);
        }
        self.layouts
            .get(layout_name)
            .ok_or_else(|| CatalogError::LayoutNotPrebuilt {
                project: self.project.clone(),
                layout: layout_name.to_string(),
            })
    }

    /// The whole layout as a table.
    pub fn export_layout(&mut self, layout_name: &str) -> Result<Table> {
        Ok(self.get_layout(layout_name)?.as_table())
    }

    /// Entity keys with the `<layout>.` namespace stripped.
    pub fn list_keys(&mut self, layout_name: &str) -> Result<Vec<String>> {
        let index = self.get_layout(layout_name)?;
        Ok(strip_namespace(layout_name, index.entities()))
    }

    /// Distinct values recorded for entity `key`.
    pub fn list_values(&mut self, layout_name: &str, key: &str) -> Result<BTreeSet<String>> {
        let index = self.get_layout(layout_name)?;
        let namespaced = format!("{layout_name}.{key}");
        if !index.entities().contains(&namespaced) {
            return Err(CatalogError::UnknownKey {
                layout: layout_name.to_string(),
                key: key.to_string(),
            });
        }
        Ok(index.unique(&namespaced))
    }

    /// Select files by extension and entity values.
    ///
    /// The result has a `filename` column (full path) plus every entity
    /// column that is set on at least one matched row. No match yields an
    /// empty table, not an error.
    pub fn filter<K, V>(
        &mut self,
        layout_name: &str,
        extension: Option<&[&str]>,
        entity_filters: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Table>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = LayoutQuery::new();
        if let Some(extensions) = extension {
            query = query.extensions(extensions.iter().copied());
        }
        for (key, value) in entity_filters {
            query = query.entity(key, value);
        }

        let index = self.get_layout(layout_name)?;
        let files = index.get(&query);
        if files.is_empty() {
            return Ok(Table::default());
        }

        let keys = strip_namespace(layout_name, index.entities());
        let mut table =
            Table::with_columns(std::iter::once("filename".to_string()).chain(keys.iter().cloned()));
        for record in files {
            let cells = keys.iter().map(|key| {
                let cell = record
                    .entity(key)
                    .map(|value| Value::String(value.to_string()))
                    .unwrap_or(Value::Null);
                (key.clone(), cell)
            });
            table.push_row(
                std::iter::once(("filename".to_string(), Value::String(record.path.clone())))
                    .chain(cells),
            );
        }
        table.drop_empty_columns();
        Ok(table)
    }
}

fn strip_namespace(layout_name: &str, entities: &BTreeSet<String>) -> Vec<String> {
    let prefix = format!("{layout_name}.");
    entities
        .iter()
        .map(|key| key.strip_prefix(&prefix).unwrap_or(key).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn config_dir() -> TempDir {
        let temp = TempDir::new().expect("temp dir");
        fs::write(
            temp.path().join("hbn_rawdata.conf"),
            json!({"entities": [{"name": "subject", "pattern": "sub-([a-zA-Z0-9]+)"}]})
                .to_string(),
        )
        .unwrap();
        temp
    }

    #[test]
    fn unknown_project_lists_available() {
        let conf = config_dir();
        let err = LayoutCatalog::new("abcd", conf.path(), None)
            .err()
            .expect("abcd is not configured");
        match err {
            CatalogError::UnknownProject { project, available } => {
                assert_eq!(project, "abcd");
                assert_eq!(available, ["hbn"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn user_mode_requires_project_snapshots() {
        let conf = config_dir();
        let snapshots = TempDir::new().expect("temp dir");
        let err = LayoutCatalog::new("hbn", conf.path(), Some(snapshots.path()))
            .err()
            .expect("no snapshots yet");
        assert!(matches!(err, CatalogError::UnknownProjectRepresentation { .. }));
    }

    #[test]
    fn authoring_mode_reads_fail_until_built() {
        let conf = config_dir();
        let mut catalog = LayoutCatalog::new("hbn", conf.path(), None).expect("catalog");
        assert!(!catalog.is_user_mode());
        assert!(matches!(catalog.representation(), Representation::Authoring));
        assert!(!catalog.has_loadable_snapshots());
        assert!(matches!(
            catalog.list_keys("rawdata"),
            Err(CatalogError::LayoutNotPrebuilt { .. })
        ));
    }

    #[test]
    fn build_validates_layout_config_and_root() {
        let conf = config_dir();
        let data = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        let mut catalog = LayoutCatalog::new("hbn", conf.path(), None).expect("catalog");

        let err = catalog
            .build_and_persist(data.path(), "anat", out.path(), None)
            .expect_err("unsupported");
        assert!(matches!(err, CatalogError::UnsupportedLayout { .. }));

        let err = catalog
            .build_and_persist(data.path(), "phenotype", out.path(), None)
            .expect_err("no phenotype config");
        assert!(matches!(err, CatalogError::MissingLayoutConfig { .. }));

        let err = catalog
            .build_and_persist(data.path(), "rawdata", out.path(), None)
            .expect_err("no rawdata dir");
        assert!(matches!(err, CatalogError::InvalidRoot { ref path } if path.ends_with("rawdata")));
    }

    #[test]
    fn built_layout_is_cached_for_reads() {
        let conf = config_dir();
        let data = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        let anat = data.path().join("rawdata/sub-07/anat");
        fs::create_dir_all(&anat).unwrap();
        fs::write(anat.join("sub-07_T1w.nii.gz"), "").unwrap();

        let mut catalog = LayoutCatalog::new("hbn", conf.path(), None).expect("catalog");
        let outfile = catalog
            .build_and_persist(data.path(), "rawdata", out.path(), None)
            .expect("build");
        let name = outfile.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("hbn_rawdata_{}.json", SnapshotDate::today()));

        assert_eq!(catalog.list_keys("rawdata").unwrap(), ["subject"]);
        let values: Vec<_> = catalog
            .list_values("rawdata", "subject")
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, ["07"]);
        assert!(matches!(
            catalog.list_values("rawdata", "session"),
            Err(CatalogError::UnknownKey { .. })
        ));
    }

    #[test]
    fn unreadable_latest_snapshot_is_not_loadable() {
        let conf = config_dir();
        let data = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        fs::create_dir_all(data.path().join("rawdata/sub-07")).unwrap();
        let mut catalog = LayoutCatalog::new("hbn", conf.path(), None).expect("catalog");
        catalog
            .build_and_persist(data.path(), "rawdata", out.path(), None)
            .expect("build");

        let reopened = LayoutCatalog::new("hbn", conf.path(), Some(out.path())).expect("user mode");
        assert!(reopened.has_loadable_snapshots());

        fs::write(out.path().join("hbn_rawdata_2999-1-1.json"), "{\"format_version\": 2}").unwrap();
        let reopened = LayoutCatalog::new("hbn", conf.path(), Some(out.path())).expect("user mode");
        assert!(reopened.is_user_mode());
        assert!(!reopened.has_loadable_snapshots());
    }
}
