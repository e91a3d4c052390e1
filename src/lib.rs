//! Layout catalog for hierarchical scientific datasets.
//!
//! The crate indexes dataset directories into entity-tagged layouts
//! (subject, session, task, run, ...), persists those indexes as dated
//! snapshots so queries do not rescan the filesystem, and materializes
//! selected files through an ordered registry of format handlers.
//!
//! Typical flow: [`ConfigStore`] discovery feeds a [`LayoutCatalog`], which
//! builds or loads a [`LayoutIndex`]; [`LayoutCatalog::filter`] produces a
//! [`Table`] selection and [`LayoutCatalog::load_data`] loads it through the
//! [`FormatRegistry`].

use anyhow::{Result, bail};

pub mod catalog;
pub mod config;
pub mod error;
pub mod formats;
pub mod layout;
pub mod materialize;
pub mod runtime;
pub mod table;

pub use catalog::{
    LayoutCatalog, LayoutKind, LayoutSnapshots, Representation, Snapshot, SnapshotDate,
    SnapshotEntry, SnapshotRepository, load_snapshot_from_path,
};
pub use config::{ConfigEntry, ConfigStore, EntitySpec, IndexOptions, LayoutConfig, ProjectConfigs};
pub use error::CatalogError;
pub use formats::{Artifact, FormatHandler, FormatRegistry, HandlerOptions};
pub use layout::{FileRecord, LayoutIndex, LayoutQuery};
pub use materialize::{BASE_ENTITIES, LoadOutcome};
pub use table::Table;

/// Split comma- or whitespace-delimited lists (subset directories,
/// extensions) into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `key=value` entity filters as given on the command line.
pub fn parse_entity_filters<I, S>(args: I) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut filters = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        let Some((key, value)) = arg.split_once('=') else {
            bail!("Entity filter '{arg}' must look like key=value");
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            bail!("Entity filter '{arg}' has an empty key or value");
        }
        filters.push((key.to_string(), value.to_string()));
    }
    Ok(filters)
}
