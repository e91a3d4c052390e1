//! On-disk snapshot envelope for a built layout index.
//!
//! A snapshot wraps the serialized [`LayoutIndex`] with enough identity to
//! reject files written by an incompatible version of this crate. Writes go
//! through a temporary file in the destination directory and are persisted
//! over the final name, so readers never observe a half-written snapshot.

use crate::catalog::identity::SnapshotDate;
use crate::error::{CatalogError, Result};
use crate::layout::LayoutIndex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_SUFFIX: &str = ".json";
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub project: String,
    pub layout: String,
    pub created: SnapshotDate,
    pub index: LayoutIndex,
}

impl Snapshot {
    pub fn new(project: &str, created: SnapshotDate, index: LayoutIndex) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            project: project.to_string(),
            layout: index.layout().to_string(),
            created,
            index,
        }
    }

    /// `<project>_<layout>_<Y-M-D>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}{SNAPSHOT_SUFFIX}",
            self.project, self.layout, self.created
        )
    }
}

/// Write `snapshot` into `out_dir`, replacing any same-day snapshot.
pub fn write_snapshot(out_dir: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    let target = out_dir.join(snapshot.file_name());
    let temp = NamedTempFile::new_in(out_dir).map_err(|err| CatalogError::io(out_dir, err))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, snapshot).map_err(|err| CatalogError::SnapshotFormat {
            path: target.clone(),
            details: err.to_string(),
        })?;
        writer.flush().map_err(|err| CatalogError::io(&target, err))?;
    }
    temp.persist(&target)
        .map_err(|err| CatalogError::io(&target, err.error))?;
    Ok(target)
}

/// Read and version-check a snapshot from disk.
pub fn load_snapshot_from_path(path: &Path) -> Result<Snapshot> {
    let snapshot: Snapshot = read_json(path)?;
    check_version(path, snapshot.format_version)?;
    Ok(snapshot)
}

#[derive(Deserialize)]
struct SnapshotHeader {
    format_version: u32,
}

/// Check that `path` holds a snapshot this version can read, without
/// keeping its index around.
pub fn check_snapshot_readable(path: &Path) -> Result<()> {
    let header: SnapshotHeader = read_json(path)?;
    check_version(path, header.format_version)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| CatalogError::io(path, err))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| CatalogError::SnapshotFormat {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

fn check_version(path: &Path, format_version: u32) -> Result<()> {
    if format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(CatalogError::SnapshotFormat {
            path: path.to_path_buf(),
            details: format!(
                "format_version {format_version} is not supported (expected {SNAPSHOT_FORMAT_VERSION})"
            ),
        });
    }
    Ok(())
}
