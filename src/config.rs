//! Report configuration.
//!
//! The config file is kept verbatim as [`Config::data`]: both stored documents
//! embed it, and a document is only reused when its embedded copy matches.
use crate::filter::{Filter, FilterSpec};
use crate::stage::Stage;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk shape of the config file.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub output_file: PathBuf,
    pub report_file: PathBuf,
    /// Stages whose raw output is kept in the output document.
    #[serde(default)]
    pub output_stages: Vec<Stage>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

/// Live configuration consumed by a session.
pub struct Config {
    pub data: Value,
    pub output_file: PathBuf,
    pub report_file: PathBuf,
    pub output_stages: BTreeSet<Stage>,
    pub filters: Vec<Box<dyn Filter>>,
}

impl Config {
    pub fn new(
        data: Value,
        output_file: impl Into<PathBuf>,
        report_file: impl Into<PathBuf>,
        output_stages: BTreeSet<Stage>,
        filters: Vec<Box<dyn Filter>>,
    ) -> Self {
        Config {
            data,
            output_file: output_file.into(),
            report_file: report_file.into(),
            output_stages,
            filters,
        }
    }

    /// Build a config from raw JSON, resolving relative paths against `base_dir`.
    pub fn from_value(data: Value, base_dir: &Path) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_value(data.clone()).context("parse config JSON")?;
        validate_config(&file)?;
        let filters = file
            .filters
            .iter()
            .map(|spec| spec.compile().map(|filter| Box::new(filter) as Box<dyn Filter>))
            .collect::<Result<Vec<_>>>()?;
        Ok(Config::new(
            data,
            base_dir.join(&file.output_file),
            base_dir.join(&file.report_file),
            file.output_stages.into_iter().collect(),
            filters,
        ))
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("output_file", &self.output_file)
            .field("report_file", &self.report_file)
            .field("output_stages", &self.output_stages)
            .field("filters", &self.filter_names())
            .finish_non_exhaustive()
    }
}

/// Load a config file; relative store paths are taken from its directory.
pub fn load_config(path: &Path) -> Result<Config> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let data: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    Config::from_value(data, base_dir).with_context(|| format!("load config {}", path.display()))
}

/// Validate store paths and filter names.
pub fn validate_config(file: &ConfigFile) -> Result<()> {
    if file.output_file.as_os_str().is_empty() {
        return Err(anyhow!("output_file must be non-empty"));
    }
    if file.report_file.as_os_str().is_empty() {
        return Err(anyhow!("report_file must be non-empty"));
    }
    if file.output_file == file.report_file {
        return Err(anyhow!(
            "output_file and report_file must differ (both {})",
            file.output_file.display()
        ));
    }
    let mut seen = BTreeSet::new();
    for (idx, spec) in file.filters.iter().enumerate() {
        let name = spec.name();
        if name.trim().is_empty() {
            return Err(anyhow!("filters[{idx}].name must be non-empty"));
        }
        if !seen.insert(name) {
            return Err(anyhow!("duplicate filter name {name:?}"));
        }
    }
    Ok(())
}
