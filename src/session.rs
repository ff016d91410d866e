//! One build's view of the output and report documents.
//!
//! Both documents are loaded when the session opens, mutated in memory while
//! events arrive, and written back once by [`OutputSession::finalize`].
use crate::config::Config;
use crate::record::{record_event, CompileEvent};
use crate::report::{OutputDocument, ReportDocument, SummaryRecord};
use crate::store;
use crate::summary::build_summary;
use anyhow::Result;

pub struct OutputSession<'a> {
    config: &'a Config,
    output: OutputDocument,
    report: ReportDocument,
}

impl<'a> OutputSession<'a> {
    /// Load (or initialize) both documents for `config`.
    ///
    /// Fails with [`store::ConfigMismatch`] when either file was written under
    /// another config.
    pub fn open(config: &'a Config) -> Result<Self> {
        let output: OutputDocument = store::load(&config.output_file, &config.data)?;
        let report: ReportDocument = store::load(&config.report_file, &config.data)?;
        tracing::debug!(
            output_records = output.compils.len(),
            report_records = report.compils.len(),
            summaries = report.summary.len(),
            "session opened"
        );
        Ok(OutputSession {
            config,
            output,
            report,
        })
    }

    pub fn record_event(&mut self, event: &CompileEvent) -> Result<bool> {
        record_event(self.config, &mut self.output, &mut self.report, event)
    }

    /// Append a summary for `executable` built from `obj_files`.
    ///
    /// Repeated calls append repeated records.
    pub fn summarize(
        &mut self,
        obj_files: &[String],
        executable: &str,
    ) -> Result<&SummaryRecord> {
        let record = build_summary(self.config, &self.report, obj_files, executable)?;
        tracing::debug!(executable, results = record.results.len(), "summary built");
        self.report.summary.push(record);
        Ok(&self.report.summary[self.report.summary.len() - 1])
    }

    pub fn output_document(&self) -> &OutputDocument {
        &self.output
    }

    pub fn report_document(&self) -> &ReportDocument {
        &self.report
    }

    /// Write both documents back. A failure writing the report leaves the
    /// already written output file in place.
    pub fn finalize(self) -> Result<()> {
        store::save(&self.config.output_file, &self.output)?;
        store::save(&self.config.report_file, &self.report)?;
        tracing::info!(
            output = %self.config.output_file.display(),
            report = %self.config.report_file.display(),
            "reports written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FileSet;
    use crate::stage::Stage;
    use crate::store::{ConfigMismatch, StoreDocument};
    use serde_json::json;
    use std::path::Path;

    fn config(dir: &Path, filters: serde_json::Value) -> Config {
        Config::from_value(
            json!({
                "output_file": "output.json",
                "report_file": "report.json",
                "output_stages": ["compile"],
                "filters": filters,
            }),
            dir,
        )
        .expect("build config")
    }

    fn warn_filter() -> serde_json::Value {
        json!([{"kind": "regex", "name": "warn", "pattern": "^warn:", "summary": "number"}])
    }

    fn event(output: &str, obj: &str) -> CompileEvent {
        CompileEvent {
            output: output.to_string(),
            stage: Stage::Compile,
            input_file: FileSet::One(obj.replace(".o", ".c")),
            output_file: FileSet::One(obj.to_string()),
        }
    }

    #[test]
    fn warning_count_end_to_end() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = config(dir.path(), warn_filter());
        let mut session = OutputSession::open(&config).expect("open");

        assert!(session
            .record_event(&event("warn: foo\nok\n", "obj1.o"))
            .expect("record"));
        assert_eq!(session.report_document().compils.len(), 1);
        assert_eq!(session.report_document().compils[0].matches.len(), 1);

        let summary = session
            .summarize(&["obj1.o".to_string()], "app")
            .expect("summarize");
        assert_eq!(
            serde_json::to_value(&summary.results).expect("serialize"),
            json!([{"name": "warn", "result": 1}])
        );
    }

    #[test]
    fn repeated_summaries_are_not_deduplicated() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = config(dir.path(), warn_filter());
        let mut session = OutputSession::open(&config).expect("open");
        session
            .record_event(&event("warn: a\n", "a.o"))
            .expect("record");

        let inputs = vec!["a.o".to_string()];
        let first = session.summarize(&inputs, "app").expect("first").clone();
        let second = session.summarize(&inputs, "app").expect("second").clone();

        assert_eq!(first, second);
        assert_eq!(session.report_document().summary.len(), 2);
    }

    #[test]
    fn summary_omits_filters_without_matches() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = config(dir.path(), warn_filter());
        let mut session = OutputSession::open(&config).expect("open");
        session
            .record_event(&event("warn: a\n", "a.o"))
            .expect("record");

        let summary = session
            .summarize(&["b.o".to_string()], "other")
            .expect("summarize");
        assert!(summary.results.is_empty());
    }

    #[test]
    fn finalize_then_reopen_appends() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = config(dir.path(), warn_filter());

        let mut session = OutputSession::open(&config).expect("open");
        session
            .record_event(&event("warn: first\n", "a.o"))
            .expect("record");
        session.finalize().expect("finalize");

        let mut session = OutputSession::open(&config).expect("reopen");
        assert_eq!(session.report_document().compils.len(), 1);
        assert_eq!(session.output_document().compils.len(), 1);
        session
            .record_event(&event("warn: second\n", "b.o"))
            .expect("record");
        session.finalize().expect("finalize");

        let text = std::fs::read_to_string(dir.path().join("report.json")).expect("read");
        let report: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(report["compils"].as_array().expect("compils").len(), 2);
        assert_eq!(report["config"], config.data);
    }

    #[test]
    fn reopening_under_changed_config_fails() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let original = config(dir.path(), warn_filter());
        OutputSession::open(&original)
            .expect("open")
            .finalize()
            .expect("finalize");

        let changed = config(dir.path(), json!([]));
        let err = OutputSession::open(&changed)
            .err()
            .expect("config mismatch");
        let mismatch = err.downcast_ref::<ConfigMismatch>().expect("typed mismatch");
        assert_eq!(mismatch.path, dir.path().join("output.json"));
    }

    #[test]
    fn report_written_under_other_config_fails_after_output_loads() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let original = config(dir.path(), warn_filter());
        OutputSession::open(&original)
            .expect("open")
            .finalize()
            .expect("finalize");

        let changed = config(dir.path(), json!([]));
        store::save(&changed.output_file, &OutputDocument::fresh(&changed.data))
            .expect("rewrite output");
        let err = OutputSession::open(&changed)
            .err()
            .expect("config mismatch");
        let mismatch = err.downcast_ref::<ConfigMismatch>().expect("typed mismatch");
        assert_eq!(mismatch.path, dir.path().join("report.json"));
    }
}
