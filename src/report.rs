//! Schema types for the output and report documents.
use crate::stage::Stage;
use crate::store::StoreDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// A compile event's input or output: one path or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileSet {
    One(String),
    Many(Vec<String>),
}

impl FileSet {
    /// One path stays scalar; anything else becomes a list.
    pub fn from_paths(mut paths: Vec<String>) -> Self {
        if paths.len() == 1 {
            FileSet::One(paths.remove(0))
        } else {
            FileSet::Many(paths)
        }
    }

    /// Whether this entry names a single path contained in `paths`.
    ///
    /// A list-valued entry is never a member: summaries select records by
    /// object file, and a multi-output record has no single object file.
    pub fn is_member_of(&self, paths: &BTreeSet<&str>) -> bool {
        match self {
            FileSet::One(path) => paths.contains(path.as_str()),
            FileSet::Many(_) => false,
        }
    }
}

impl fmt::Display for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSet::One(path) => f.write_str(path),
            FileSet::Many(paths) => f.write_str(&paths.join(" ")),
        }
    }
}

/// Raw tool output retained for configured output stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub stage: Stage,
    pub input_file: FileSet,
    pub output_file: FileSet,
    pub stdout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub config: Value,
    pub compils: Vec<OutputRecord>,
}

impl StoreDocument for OutputDocument {
    const REQUIRED_FIELDS: &'static [&'static str] = &["compils"];

    fn fresh(config: &Value) -> Self {
        OutputDocument {
            config: config.clone(),
            compils: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub name: String,
    #[serde(rename = "match")]
    pub value: Value,
}

/// Matches found in one compile event; only stored when non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileRecord {
    pub c_file: FileSet,
    pub obj_file: FileSet,
    pub stage: Stage,
    pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub name: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub executable: String,
    pub obj_files: Vec<String>,
    pub results: Vec<SummaryResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub config: Value,
    pub compils: Vec<CompileRecord>,
    pub summary: Vec<SummaryRecord>,
}

impl StoreDocument for ReportDocument {
    const REQUIRED_FIELDS: &'static [&'static str] = &["compils", "summary"];

    fn fresh(config: &Value) -> Self {
        ReportDocument {
            config: config.clone(),
            compils: Vec::new(),
            summary: Vec::new(),
        }
    }
}
