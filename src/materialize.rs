//! Turn a filtered selection into loaded artifacts.
//!
//! Every row is loaded independently through the catalog's format registry.
//! A row that fails to load becomes [`LoadOutcome::Absent`] instead of
//! aborting the batch, so one corrupt or unsupported file does not hide the
//! rest. Tabular artifacts are tagged with the file's base entities and the
//! layout name so tables from different layouts can be concatenated.

use crate::catalog::LayoutCatalog;
use crate::error::{CatalogError, Result};
use crate::formats::{Artifact, HandlerOptions};
use crate::table::Table;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Entities copied onto tabular artifacts.
pub const BASE_ENTITIES: &[&str] = &["subject", "session", "task", "run", "suffix"];

const SUBJECT_PREFIX: &str = "sub-";
const PARTICIPANT_COLUMN: &str = "participant_id";

#[derive(Clone, Debug, PartialEq)]
/// Outcome of loading one selected row.
pub enum LoadOutcome {
    Loaded(Artifact),
    /// The row was attempted and produced nothing.
    Absent { reason: String },
}

impl LoadOutcome {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            LoadOutcome::Loaded(artifact) => Some(artifact),
            LoadOutcome::Absent { .. } => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, LoadOutcome::Absent { .. })
    }
}

impl LayoutCatalog {
    /// Load every file referenced by `selection`'s `filename` column.
    ///
    /// `path_replace = (old, new)` rewrites each path before loading, e.g. to
    /// point at a local mirror. Rows whose `filename` is a JSON object are
    /// inline records: they become a one-row table keyed by their other
    /// columns.
    pub fn load_data(
        &mut self,
        layout_name: &str,
        selection: &Table,
        path_replace: Option<(&str, &str)>,
    ) -> Result<BTreeMap<String, LoadOutcome>> {
        if !selection.has_column("filename") {
            return Err(CatalogError::MissingFilenameColumn);
        }

        let mut data = BTreeMap::new();
        for row in selection.rows() {
            match row.get("filename").unwrap_or(&Value::Null) {
                Value::Object(record) => {
                    let key = inline_key(selection, row);
                    let table = Table::from_records(std::slice::from_ref(record));
                    data.insert(key, LoadOutcome::Loaded(Artifact::Table(table)));
                }
                Value::String(original) => {
                    let path = match path_replace {
                        Some((old, new)) => original.replace(old, new),
                        None => original.clone(),
                    };
                    let outcome = self.load_row(layout_name, original, &path)?;
                    data.insert(path, outcome);
                }
                other => {
                    let key = cell_text(other);
                    data.insert(
                        key,
                        LoadOutcome::Absent {
                            reason: format!("filename cell {other} is not a path"),
                        },
                    );
                }
            }
        }
        Ok(data)
    }

    fn load_row(&mut self, layout_name: &str, original: &str, path: &str) -> Result<LoadOutcome> {
        let mut artifact = match self.registry.load(Path::new(path), &HandlerOptions::new()) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(path, error = %format!("{err:#}"), "load failed; recording absent artifact");
                return Ok(LoadOutcome::Absent {
                    reason: format!("{err:#}"),
                });
            }
        };

        if let Some(table) = artifact.as_table_mut() {
            let index = self.get_layout(layout_name)?;
            let record = index
                .files()
                .get(original)
                .or_else(|| index.files().get(path));
            match record {
                Some(record) => {
                    for (name, value) in &record.entities {
                        if BASE_ENTITIES.contains(&name.as_str()) {
                            table.set_constant(name, Value::String(value.clone()));
                        }
                    }
                }
                None => debug!(path, layout = layout_name, "file not indexed; entity tags skipped"),
            }
            table.set_constant("dtype", Value::String(layout_name.to_string()));
            table.map_column(PARTICIPANT_COLUMN, normalize_participant_id);
        }
        Ok(LoadOutcome::Loaded(artifact))
    }
}

/// `sub-0042` -> `0042`; other values pass through.
pub fn normalize_participant_id(value: &Value) -> Value {
    match value {
        Value::String(id) => Value::String(id.strip_prefix(SUBJECT_PREFIX).unwrap_or(id).to_string()),
        other => other.clone(),
    }
}

fn inline_key(selection: &Table, row: &BTreeMap<String, Value>) -> String {
    selection
        .columns()
        .iter()
        .filter(|column| column.as_str() != "filename")
        .map(|column| {
            let value = row.get(column).unwrap_or(&Value::Null);
            format!("{column}-{}", cell_text(value))
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn participant_prefix_is_stripped_once() {
        assert_eq!(normalize_participant_id(&json!("sub-0042")), json!("0042"));
        assert_eq!(normalize_participant_id(&json!("0042")), json!("0042"));
        assert_eq!(normalize_participant_id(&json!(42)), json!(42));
    }

    #[test]
    fn inline_key_joins_non_filename_columns() {
        let mut selection = Table::with_columns(["filename", "subject", "run"]);
        selection.push_row([
            ("filename", json!({"age": 12})),
            ("subject", json!("01")),
            ("run", json!(2)),
        ]);
        assert_eq!(inline_key(&selection, &selection.rows()[0]), "subject-01_run-2");
    }
}
