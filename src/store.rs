//! Load, recover, and save JSON documents tied to a config snapshot.
//!
//! A store file that is missing, empty, or not valid JSON is treated as
//! uninitialized and replaced by a fresh document. A readable document written
//! under a different config is never merged: loading fails with
//! [`ConfigMismatch`].
use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A persisted document that embeds the config it was produced under.
pub trait StoreDocument: Serialize + DeserializeOwned {
    /// Top-level sequences a fresh document starts with, empty.
    const REQUIRED_FIELDS: &'static [&'static str];

    fn fresh(config: &Value) -> Self;
}

/// The stored document was produced under another config.
#[derive(Debug, thiserror::Error)]
#[error("current config and {} config do not match", .path.display())]
pub struct ConfigMismatch {
    pub path: PathBuf,
}

/// Load `path`, creating it if needed and reinitializing it if unreadable.
pub fn load<D: StoreDocument>(path: &Path, config: &Value) -> Result<D> {
    let bytes = read_or_create(path)?;
    let parsed: Value = match serde_json::from_slice(&bytes) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "store not initialized");
            return Ok(D::fresh(config));
        }
    };
    ensure!(
        parsed.is_object(),
        "{} does not contain a JSON object",
        path.display()
    );
    if parsed.get("config").unwrap_or(&Value::Null) != config {
        return Err(ConfigMismatch {
            path: path.to_path_buf(),
        }
        .into());
    }
    for field in D::REQUIRED_FIELDS {
        ensure!(
            parsed.get(*field).is_some_and(Value::is_array),
            "{} is missing array field {field:?}",
            path.display()
        );
    }
    let document: D =
        serde_json::from_value(parsed).with_context(|| format!("parse {}", path.display()))?;
    Ok(document)
}

/// Write `document` as pretty JSON, replacing `path` in one rename.
pub fn save<D: Serialize>(path: &Path, document: &D) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(document).context("serialize document")?;
    bytes.push(b'\n');
    let dir = parent_dir(path);
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut tmp =
        NamedTempFile::new_in(dir).with_context(|| format!("stage {}", path.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

fn read_or_create(path: &Path) -> Result<Vec<u8>> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(bytes)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{OutputDocument, ReportDocument};
    use serde_json::json;

    fn live_config() -> Value {
        json!({"output_stages": ["compile"], "filters": []})
    }

    #[test]
    fn missing_file_is_created_and_initialized() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested/report.json");

        let report: ReportDocument = load(&path, &live_config()).expect("load");

        assert!(path.is_file());
        assert_eq!(report.config, live_config());
        assert!(report.compils.is_empty());
        assert!(report.summary.is_empty());
    }

    #[test]
    fn malformed_files_reinitialize() {
        let dir = tempfile::tempdir().expect("create temp dir");
        for (idx, contents) in ["", "{\"config\": ", "not json", "\u{fffd}\u{0}"]
            .iter()
            .enumerate()
        {
            let path = dir.path().join(format!("output-{idx}.json"));
            fs::write(&path, contents).expect("write store");
            let output: OutputDocument = load(&path, &live_config()).expect("load");
            assert_eq!(output, OutputDocument::fresh(&live_config()));
        }
    }

    #[test]
    fn fresh_document_has_required_fields_as_empty_arrays() {
        let fresh = serde_json::to_value(ReportDocument::fresh(&live_config())).expect("serialize");
        for field in ReportDocument::REQUIRED_FIELDS {
            assert_eq!(fresh[*field], json!([]));
        }
        assert_eq!(fresh["config"], live_config());
    }

    #[test]
    fn config_mismatch_is_fatal() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("report.json");
        let stale = ReportDocument::fresh(&json!({"filters": ["old"]}));
        save(&path, &stale).expect("save");

        let err = load::<ReportDocument>(&path, &live_config()).expect_err("mismatch");
        let mismatch = err.downcast_ref::<ConfigMismatch>().expect("typed mismatch");
        assert_eq!(mismatch.path, path);
        assert!(err.to_string().contains("report.json"));
    }

    #[test]
    fn config_comparison_ignores_key_order() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("output.json");
        fs::write(
            &path,
            r#"{"config": {"filters": [], "output_stages": ["compile"]}, "compils": []}"#,
        )
        .expect("write store");

        let output: OutputDocument = load(&path, &live_config()).expect("load");
        assert!(output.compils.is_empty());
    }

    #[test]
    fn wrong_shape_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("report.json");
        fs::write(
            &path,
            serde_json::to_vec(&json!({"config": live_config(), "compils": []})).expect("json"),
        )
        .expect("write store");

        let err = load::<ReportDocument>(&path, &live_config()).expect_err("missing summary");
        assert!(err.downcast_ref::<ConfigMismatch>().is_none());
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("report.json");
        let mut report = ReportDocument::fresh(&live_config());
        report.summary.push(crate::report::SummaryRecord {
            executable: "app".to_string(),
            obj_files: vec!["a.o".to_string()],
            results: Vec::new(),
        });
        save(&path, &report).expect("save");

        let text = fs::read_to_string(&path).expect("read saved");
        assert!(text.contains("\n  \"summary\""));
        let loaded: ReportDocument = load(&path, &live_config()).expect("load");
        assert_eq!(loaded, report);
    }
}
