//! Fixture builders shared by the integration suite.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PROJECT: &str = "hbn";

/// A throwaway dataset: configuration, data tree, and snapshot output dirs.
pub struct Dataset {
    pub temp: TempDir,
}

impl Dataset {
    pub fn conf_dir(&self) -> PathBuf {
        self.temp.path().join("conf")
    }

    pub fn data_root(&self) -> PathBuf {
        self.temp.path().join("data")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.temp.path().join("snapshots")
    }

    pub fn rawdata(&self, relative: &str) -> PathBuf {
        self.data_root().join("rawdata").join(relative)
    }
}

pub fn rawdata_config() -> Value {
    json!({
        "name": "rawdata",
        "entities": [
            {"name": "subject", "pattern": "sub-([a-zA-Z0-9]+)", "mandatory": true},
            {"name": "session", "pattern": "ses-([a-zA-Z0-9]+)"},
            {"name": "task", "pattern": "task-([a-zA-Z0-9]+)"},
            {"name": "acquisition", "pattern": "acq-([a-zA-Z0-9]+)"},
            {"name": "run", "pattern": "run-([0-9]+)"},
            {"name": "suffix", "pattern": "_([a-zA-Z0-9]+)\\.[^/]+$"}
        ]
    })
}

pub fn phenotype_config() -> Value {
    json!({
        "entities": [
            {"name": "suffix", "pattern": "([a-zA-Z]+)\\.tsv$"}
        ]
    })
}

pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Two subjects of raw data plus a phenotype table, with configs for both
/// layouts under project `hbn`.
pub fn dataset() -> Result<Dataset> {
    let dataset = Dataset {
        temp: TempDir::new().context("allocating dataset dir")?,
    };
    fs::create_dir_all(dataset.snapshot_dir())?;
    write_json(
        &dataset.conf_dir().join(format!("{PROJECT}_rawdata.conf")),
        &rawdata_config(),
    )?;
    write_json(
        &dataset.conf_dir().join(format!("{PROJECT}_phenotype.conf")),
        &phenotype_config(),
    )?;

    write_file(&dataset.rawdata("sub-01/ses-V1/anat/sub-01_ses-V1_T1w.nii.gz"), "")?;
    write_json(
        &dataset.rawdata("sub-01/ses-V1/anat/sub-01_ses-V1_T1w.json"),
        &json!({"RepetitionTime": 2.0}),
    )?;
    write_file(
        &dataset.rawdata("sub-01/ses-V1/func/sub-01_ses-V1_task-rest_run-01_bold.nii.gz"),
        "",
    )?;
    write_file(
        &dataset.rawdata("sub-01/ses-V1/func/sub-01_ses-V1_task-rest_run-01_events.tsv"),
        "onset\tduration\ttrial_type\n0.5\t1\tgo\n2.5\t1\tstop\n",
    )?;
    write_file(
        &dataset.rawdata("sub-02/ses-V1/anat/sub-02_ses-V1_acq-fast_T1w.nii.gz"),
        "",
    )?;
    write_file(&dataset.rawdata("dataset_description.json"), "{}")?;

    write_file(
        &dataset.data_root().join("phenotype/participants.tsv"),
        "participant_id\tage\nsub-0042\t31\nsub-0043\tn/a\n",
    )?;
    Ok(dataset)
}
