//! Regex-driven entity index over a layout directory.
//!
//! Each configured entity is a pattern with one capture group applied to a
//! file's path relative to the layout root; the captured text becomes the
//! entity value. Entity keys are exposed namespaced as `<layout>.<entity>` so
//! several layouts can share one catalog, while file records keep the short
//! names.

use crate::config::LayoutConfig;
use crate::error::{CatalogError, Result};
use crate::table::Table;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// One indexed file and the entity values extracted from its path.
pub struct FileRecord {
    pub path: String,
    pub filename: String,
    pub dirname: String,
    #[serde(default)]
    pub extension: Option<String>,
    pub entities: BTreeMap<String, String>,
}

impl FileRecord {
    /// Entity value by short name.
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default)]
/// Filter for [`LayoutIndex::get`]. Every entity filter must match; within
/// one key any listed value is accepted.
pub struct LayoutQuery {
    entities: BTreeMap<String, Vec<String>>,
    extensions: Vec<String>,
}

impl LayoutQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `value` for entity `key` (short or namespaced name).
    pub fn entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Restrict to files whose extension is one of `extensions`; a leading dot
    /// is optional.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions.extend(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_string()),
        );
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutIndex {
    layout: String,
    roots: Vec<PathBuf>,
    entities: BTreeSet<String>,
    files: BTreeMap<String, FileRecord>,
}

impl LayoutIndex {
    /// Index every file under `roots`, matching entity patterns against paths
    /// relative to `base`.
    pub fn build(layout: &str, base: &Path, roots: &[PathBuf], config: &LayoutConfig) -> Result<Self> {
        let patterns = config
            .entities
            .iter()
            .map(|spec| {
                Regex::new(&spec.pattern)
                    .map(|re| (spec, re))
                    .map_err(|source| CatalogError::InvalidPattern {
                        entity: spec.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let excludes = config
            .index
            .exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| CatalogError::InvalidPattern {
                    entity: format!("index.exclude {pattern}"),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut paths = Vec::new();
        for root in roots {
            collect_from_dir(base, root, &excludes, &mut paths)?;
        }
        paths.sort();
        paths.dedup();

        let mut files = BTreeMap::new();
        'files: for path in paths {
            let relative = relative_str(base, &path);
            let mut entities = BTreeMap::new();
            for (spec, re) in &patterns {
                let value = re
                    .captures(&relative)
                    .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                    .map(|m| m.as_str().to_string());
                match value {
                    Some(value) => {
                        entities.insert(spec.name.clone(), value);
                    }
                    None if spec.mandatory => continue 'files,
                    None => {}
                }
            }
            let record = FileRecord::new(&path, entities);
            files.insert(record.path.clone(), record);
        }

        let entities = config
            .entities
            .iter()
            .map(|spec| format!("{layout}.{}", spec.name))
            .collect();
        debug!(layout, files = files.len(), "built layout index");
        Ok(Self {
            layout: layout.to_string(),
            roots: roots.to_vec(),
            entities,
            files,
        })
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Namespaced entity keys (`<layout>.<entity>`).
    pub fn entities(&self) -> &BTreeSet<String> {
        &self.entities
    }

    pub fn files(&self) -> &BTreeMap<String, FileRecord> {
        &self.files
    }

    /// Distinct values observed for a namespaced entity key.
    pub fn unique(&self, key: &str) -> BTreeSet<String> {
        if !self.entities.contains(key) {
            return BTreeSet::new();
        }
        let short = self.short_key(key);
        self.files
            .values()
            .filter_map(|record| record.entity(short))
            .map(str::to_string)
            .collect()
    }

    /// Files matching `query`, in ascending path order.
    pub fn get(&self, query: &LayoutQuery) -> Vec<&FileRecord> {
        self.files
            .values()
            .filter(|record| self.matches(record, query))
            .collect()
    }

    /// The whole index as a table: `filename` (full path) plus one column per
    /// entity, short names.
    pub fn as_table(&self) -> Table {
        let keys: Vec<&str> = self.entities.iter().map(|key| self.short_key(key)).collect();
        let mut table = Table::with_columns(
            std::iter::once("filename").chain(keys.iter().copied()),
        );
        for record in self.files.values() {
            table.push_row(
                std::iter::once(("filename", Value::String(record.path.clone()))).chain(
                    keys.iter().map(|key| {
                        let cell = record
                            .entity(key)
                            .map(|value| Value::String(value.to_string()))
                            .unwrap_or(Value::Null);
                        (*key, cell)
                    }),
                ),
            );
        }
        table
    }

    fn short_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.layout)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(key)
    }

    fn matches(&self, record: &FileRecord, query: &LayoutQuery) -> bool {
        let entities_match = query.entities.iter().all(|(key, accepted)| {
            record
                .entity(self.short_key(key))
                .is_some_and(|value| accepted.iter().any(|candidate| candidate == value))
        });
        let extension_match = query.extensions.is_empty()
            || record
                .extension
                .as_deref()
                .is_some_and(|ext| query.extensions.iter().any(|candidate| candidate == ext));
        entities_match && extension_match
    }
}

impl FileRecord {
    fn new(path: &Path, entities: BTreeMap<String, String>) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = filename
            .split_once('.')
            .map(|(_, ext)| ext.to_string())
            .filter(|ext| !ext.is_empty());
        Self {
            path: path.to_string_lossy().into_owned(),
            dirname: path
                .parent()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),
            filename,
            extension,
            entities,
        }
    }
}

fn relative_str(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_from_dir(base: &Path, dir: &Path, excludes: &[Regex], acc: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let entries = fs::read_dir(dir).map_err(|err| CatalogError::io(dir, err))?;
    for entry in entries {
        let path = entry.map_err(|err| CatalogError::io(dir, err))?.path();
        let relative = relative_str(base, &path);
        if excludes.iter().any(|re| re.is_match(&relative)) {
            continue;
        }
        if path.is_dir() {
            collect_from_dir(base, &path, excludes, acc)?;
        } else {
            acc.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntitySpec, IndexOptions};
    use tempfile::TempDir;

    fn config() -> LayoutConfig {
        let entity = |name: &str, pattern: &str| EntitySpec {
            name: name.to_string(),
            pattern: pattern.to_string(),
            mandatory: false,
        };
        LayoutConfig {
            name: None,
            entities: vec![
                entity("subject", r"sub-([a-zA-Z0-9]+)"),
                entity("session", r"ses-([a-zA-Z0-9]+)"),
                entity("suffix", r"_([a-zA-Z0-9]+)\.[^/]+$"),
            ],
            index: IndexOptions {
                exclude: vec![r"(^|/)\.".to_string()],
            },
        }
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn fixture() -> (TempDir, LayoutIndex) {
        let temp = TempDir::new().expect("temp dir");
        let root = temp.path().join("rawdata");
        touch(&root, "sub-01/ses-V1/anat/sub-01_ses-V1_T1w.nii.gz");
        touch(&root, "sub-01/ses-V1/anat/sub-01_ses-V1_T1w.json");
        touch(&root, "sub-02/ses-V2/anat/sub-02_ses-V2_T1w.nii.gz");
        touch(&root, "participants.tsv");
        touch(&root, ".hidden/sub-03_T1w.nii.gz");
        let index =
            LayoutIndex::build("rawdata", &root, &[root.clone()], &config()).expect("build");
        (temp, index)
    }

    #[test]
    fn entities_are_namespaced_by_layout() {
        let (_temp, index) = fixture();
        let keys: Vec<_> = index.entities().iter().cloned().collect();
        assert_eq!(keys, ["rawdata.session", "rawdata.subject", "rawdata.suffix"]);
    }

    #[test]
    fn excluded_paths_are_not_indexed() {
        let (_temp, index) = fixture();
        assert_eq!(index.files().len(), 4);
        assert!(index.files().keys().all(|path| !path.contains(".hidden")));
    }

    #[test]
    fn unique_collects_distinct_values() {
        let (_temp, index) = fixture();
        let subjects: Vec<_> = index.unique("rawdata.subject").into_iter().collect();
        assert_eq!(subjects, ["01", "02"]);
        assert!(index.unique("rawdata.unknown").is_empty());
    }

    #[test]
    fn get_combines_entity_and_extension_filters() {
        let (_temp, index) = fixture();
        let hits = index.get(&LayoutQuery::new().entity("subject", "01").extensions([".nii.gz"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "sub-01_ses-V1_T1w.nii.gz");
        assert_eq!(hits[0].entity("suffix"), Some("T1w"));

        let any_subject = index.get(
            &LayoutQuery::new()
                .entity("rawdata.subject", "01")
                .entity("rawdata.subject", "02")
                .extensions(["nii.gz"]),
        );
        assert_eq!(any_subject.len(), 2);

        assert!(
            index
                .get(&LayoutQuery::new().entity("subject", "nonexistent"))
                .is_empty()
        );
    }

    #[test]
    fn mandatory_entities_drop_unmatched_files() {
        let temp = TempDir::new().expect("temp dir");
        let root = temp.path().to_path_buf();
        touch(&root, "sub-01/sub-01_bold.nii.gz");
        touch(&root, "dataset_description.json");
        let mut config = config();
        config.entities[0].mandatory = true;
        let index = LayoutIndex::build("rawdata", &root, &[root.clone()], &config).unwrap();
        assert_eq!(index.files().len(), 1);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let temp = TempDir::new().expect("temp dir");
        let mut config = config();
        config.entities[1].pattern = "ses-(".to_string();
        let err = LayoutIndex::build("rawdata", temp.path(), &[], &config).expect_err("bad regex");
        assert!(matches!(err, CatalogError::InvalidPattern { ref entity, .. } if entity == "session"));
    }

    #[test]
    fn as_table_lists_every_file() {
        let (_temp, index) = fixture();
        let table = index.as_table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.columns(), ["filename", "session", "subject", "suffix"]);
    }
}
