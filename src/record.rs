//! Per-event match recording.
use crate::config::Config;
use crate::filter::{Filter, SearchOutcome};
use crate::report::{
    CompileRecord, FileSet, MatchRecord, OutputDocument, OutputRecord, ReportDocument,
};
use crate::stage::Stage;
use anyhow::{Context, Result};

/// Output of one tool invocation during a build.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileEvent {
    pub output: String,
    pub stage: Stage,
    pub input_file: FileSet,
    pub output_file: FileSet,
}

/// Lines of `text` after dropping one trailing newline.
///
/// Empty text still yields a single empty line.
pub fn output_lines(text: &str) -> impl Iterator<Item = &str> {
    text.strip_suffix('\n').unwrap_or(text).split('\n')
}

/// Record `event` into the in-memory documents.
///
/// Raw output is kept when the stage is an output stage. A compile record is
/// appended to the report only when some filter matched; the return value
/// says whether it was.
pub fn record_event(
    config: &Config,
    output: &mut OutputDocument,
    report: &mut ReportDocument,
    event: &CompileEvent,
) -> Result<bool> {
    if config.output_stages.contains(&event.stage) {
        output.compils.push(OutputRecord {
            stage: event.stage,
            input_file: event.input_file.clone(),
            output_file: event.output_file.clone(),
            stdout: event.output.clone(),
        });
    }

    let mut matches = Vec::new();
    let mut line_count = 0usize;
    for line in output_lines(&event.output) {
        line_count += 1;
        for filter in &config.filters {
            let outcome = filter.search(line, event.stage).with_context(|| {
                format!(
                    "filter {:?} on {} output of {}",
                    filter.name(),
                    event.stage,
                    event.input_file
                )
            })?;
            match outcome {
                SearchOutcome::Match(value) if !value.is_null() => matches.push(MatchRecord {
                    name: filter.name().to_string(),
                    value,
                }),
                SearchOutcome::Match(_) | SearchOutcome::NoMatch | SearchOutcome::InvalidStage => {}
            }
        }
    }
    tracing::debug!(
        stage = %event.stage,
        input = %event.input_file,
        lines = line_count,
        matches = matches.len(),
        "compile event filtered"
    );

    if matches.is_empty() {
        return Ok(false);
    }
    report.compils.push(CompileRecord {
        c_file: event.input_file.clone(),
        obj_file: event.output_file.clone(),
        stage: event.stage,
        matches,
    });
    Ok(true)
}
