//! Discovery and lazy parsing of per-project layout configurations.
//!
//! A configuration directory holds `<project>_<layout>.conf` JSON files. The
//! store records paths on discovery and only parses a file the first time its
//! `(project, layout)` pair is requested; the parsed value is cached in the
//! entry from then on.

use crate::error::{CatalogError, Result};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_SUFFIX: &str = ".conf";

const LAYOUT_CONFIG_SCHEMA: &str = include_str!("../schema/layout_config.schema.json");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Entity-extraction rules for one layout.
pub struct LayoutConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub index: IndexOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// One entity: its short name and a regex with a single capture group that is
/// matched against each file's path relative to the indexed root.
pub struct EntitySpec {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub mandatory: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Relative-path regexes for files and directories left out of the index.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
/// A configuration slot: the discovered path plus, once requested, its
/// parsed contents.
pub struct ConfigEntry {
    path: PathBuf,
    config: Option<LayoutConfig>,
}

impl ConfigEntry {
    fn unparsed(path: PathBuf) -> Self {
        ConfigEntry { path, config: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parsed(&self) -> Option<&LayoutConfig> {
        self.config.as_ref()
    }
}

#[derive(Clone, Debug, PartialEq)]
/// All layout configurations registered for one project.
pub struct ProjectConfigs {
    project: String,
    layouts: BTreeMap<String, ConfigEntry>,
}

impl ProjectConfigs {
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn contains(&self, layout: &str) -> bool {
        self.layouts.contains_key(layout)
    }

    pub fn layouts(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    pub fn entry(&self, layout: &str) -> Option<&ConfigEntry> {
        self.layouts.get(layout)
    }

    /// Return the parsed configuration for `layout`, parsing it on first use.
    pub fn load(&mut self, layout: &str) -> Result<&LayoutConfig> {
        let entry =
            self.layouts
                .get_mut(layout)
                .ok_or_else(|| CatalogError::UnknownLayoutConfig {
                    project: self.project.clone(),
                    layout: layout.to_string(),
                })?;
        let config = match entry.config.take() {
            Some(config) => config,
            None => {
                let config = parse_layout_config(&entry.path)?;
                debug!(project = %self.project, layout, path = %entry.path.display(), "parsed layout config");
                config
            }
        };
        let config: &LayoutConfig = entry.config.insert(config);
        Ok(config)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Configuration set for every project found in a directory.
pub struct ConfigStore {
    projects: BTreeMap<String, ProjectConfigs>,
}

impl ConfigStore {
    /// Scan `config_dir` for `<project>_<layout>.conf` files.
    ///
    /// Files are visited in sorted name order. Each file name is one
    /// `(project, layout)` pair, so a pair is registered at most once.
    pub fn discover(config_dir: &Path) -> Result<Self> {
        let mut store = ConfigStore::default();
        for path in list_with_suffix(config_dir, CONFIG_SUFFIX)? {
            let (project, layout) = split_config_name(&path)?;
            store
                .projects
                .entry(project.clone())
                .or_insert_with(|| ProjectConfigs {
                    project,
                    layouts: BTreeMap::new(),
                })
                .layouts
                .insert(layout, ConfigEntry::unparsed(path));
        }
        debug!(dir = %config_dir.display(), projects = store.projects.len(), "discovered configurations");
        Ok(store)
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn project(&self, project: &str) -> Option<&ProjectConfigs> {
        self.projects.get(project)
    }

    /// Move one project's configurations out of the store.
    pub fn take_project(&mut self, project: &str) -> Option<ProjectConfigs> {
        self.projects.remove(project)
    }

    /// Parsed configuration for a `(project, layout)` pair.
    pub fn load(&mut self, project: &str, layout: &str) -> Result<&LayoutConfig> {
        match self.projects.get_mut(project) {
            Some(configs) => configs.load(layout),
            None => Err(CatalogError::UnknownLayoutConfig {
                project: project.to_string(),
                layout: layout.to_string(),
            }),
        }
    }
}

/// Sorted regular files in `dir` whose name ends with `suffix`.
pub(crate) fn list_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| CatalogError::io(dir, err))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| CatalogError::io(dir, err))?.path();
        if !path.is_file() {
            continue;
        }
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix))
        {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn split_config_name(path: &Path) -> Result<(String, String)> {
    let malformed = || CatalogError::MalformedConfigName {
        path: path.to_path_buf(),
    };
    let basename = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(CONFIG_SUFFIX))
        .ok_or_else(malformed)?;
    let tokens: Vec<&str> = basename.split('_').collect();
    match tokens.as_slice() {
        [project, layout] if !project.is_empty() && !layout.is_empty() => {
            Ok((project.to_string(), layout.to_string()))
        }
        _ => Err(malformed()),
    }
}

/// Read, schema-check, and deserialize a layout configuration file.
pub fn parse_layout_config(path: &Path) -> Result<LayoutConfig> {
    let data = fs::read_to_string(path).map_err(|err| CatalogError::io(path, err))?;
    let value: Value =
        serde_json::from_str(&data).map_err(|source| CatalogError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

    let schema_value: Value = serde_json::from_str(LAYOUT_CONFIG_SCHEMA).map_err(|err| {
        CatalogError::ConfigSchema {
            path: path.to_path_buf(),
            details: format!("embedded schema is not valid JSON: {err}"),
        }
    })?;
    let schema = JSONSchema::compile(&schema_value).map_err(|err| CatalogError::ConfigSchema {
        path: path.to_path_buf(),
        details: format!("embedded schema failed to compile: {err}"),
    })?;
    if let Err(errors) = schema.validate(&value) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CatalogError::ConfigSchema {
            path: path.to_path_buf(),
            details,
        });
    }

    serde_json::from_value(value).map_err(|source| CatalogError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
