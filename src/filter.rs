//! Line filters applied to build output.
//!
//! The accumulator and reducer only see the [`Filter`] trait. Config files
//! describe filters as tagged [`FilterSpec`] entries which compile into
//! [`RuleFilter`] values.
use crate::stage::Stage;
use crate::summary::SummaryPolicy;
use anyhow::{anyhow, ensure, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Result of running one filter over one line.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Match(Value),
    NoMatch,
    /// The filter is not scoped to the requested stage.
    InvalidStage,
}

/// A named line matcher with a declared summary policy.
pub trait Filter {
    fn name(&self) -> &str;

    fn summary(&self) -> SummaryPolicy;

    /// Search a single output line produced during `stage`.
    ///
    /// Errors are reserved for genuine failures (e.g. a capture that cannot be
    /// converted to the configured value kind); an inapplicable stage is
    /// reported as [`SearchOutcome::InvalidStage`].
    fn search(&self, line: &str, stage: Stage) -> Result<SearchOutcome>;
}

fn default_true() -> bool {
    true
}

/// How a regex capture becomes a match value.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Text,
    Integer,
    Float,
    Flag,
}

impl ValueKind {
    fn convert(self, text: &str) -> Result<Value> {
        match self {
            ValueKind::Text => Ok(Value::String(text.to_string())),
            ValueKind::Integer => {
                let parsed: i64 = text
                    .trim()
                    .parse()
                    .with_context(|| format!("capture {text:?} is not an integer"))?;
                Ok(Value::from(parsed))
            }
            ValueKind::Float => {
                let parsed: f64 = text
                    .trim()
                    .parse()
                    .with_context(|| format!("capture {text:?} is not a number"))?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| anyhow!("capture {text:?} is not a finite number"))
            }
            ValueKind::Flag => Ok(Value::Bool(true)),
        }
    }
}

/// Filter entry as written in the config file.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    Regex {
        name: String,
        /// Stages the filter applies to; empty means all of them.
        #[serde(default)]
        stages: Vec<Stage>,
        #[serde(default)]
        summary: SummaryPolicy,
        pattern: String,
        #[serde(default)]
        group: Option<usize>,
        #[serde(default = "default_true")]
        case_sensitive: bool,
        #[serde(default)]
        value: ValueKind,
    },
    Contains {
        name: String,
        #[serde(default)]
        stages: Vec<Stage>,
        #[serde(default)]
        summary: SummaryPolicy,
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
}

impl FilterSpec {
    pub fn name(&self) -> &str {
        match self {
            FilterSpec::Regex { name, .. } | FilterSpec::Contains { name, .. } => name,
        }
    }

    /// Compile the entry, validating its pattern and capture group.
    pub fn compile(&self) -> Result<RuleFilter> {
        match self {
            FilterSpec::Regex {
                name,
                stages,
                summary,
                pattern,
                group,
                case_sensitive,
                value,
            } => {
                let regex = compile_regex(pattern, *case_sensitive, name)?;
                let group = group.unwrap_or(0);
                ensure!(
                    group < regex.captures_len(),
                    "filter {name:?} group {group} exceeds regex groups ({})",
                    regex.captures_len().saturating_sub(1)
                );
                Ok(RuleFilter {
                    name: name.clone(),
                    stages: stages.iter().copied().collect(),
                    summary: *summary,
                    matcher: LineMatcher::Regex {
                        regex,
                        group,
                        value: *value,
                    },
                })
            }
            FilterSpec::Contains {
                name,
                stages,
                summary,
                value,
                case_sensitive,
            } => {
                ensure!(!value.is_empty(), "filter {name:?} value must be non-empty");
                let needle = if *case_sensitive {
                    value.clone()
                } else {
                    value.to_lowercase()
                };
                Ok(RuleFilter {
                    name: name.clone(),
                    stages: stages.iter().copied().collect(),
                    summary: *summary,
                    matcher: LineMatcher::Contains {
                        needle,
                        case_sensitive: *case_sensitive,
                    },
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
enum LineMatcher {
    Regex {
        regex: Regex,
        group: usize,
        value: ValueKind,
    },
    Contains {
        needle: String,
        case_sensitive: bool,
    },
}

/// Config-driven filter: a stage scope, a summary policy and a line matcher.
#[derive(Debug, Clone)]
pub struct RuleFilter {
    name: String,
    stages: BTreeSet<Stage>,
    summary: SummaryPolicy,
    matcher: LineMatcher,
}

impl RuleFilter {
    pub fn applies_to(&self, stage: Stage) -> bool {
        self.stages.is_empty() || self.stages.contains(&stage)
    }
}

impl Filter for RuleFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> SummaryPolicy {
        self.summary
    }

    fn search(&self, line: &str, stage: Stage) -> Result<SearchOutcome> {
        if !self.applies_to(stage) {
            return Ok(SearchOutcome::InvalidStage);
        }
        match &self.matcher {
            LineMatcher::Regex {
                regex,
                group,
                value,
            } => {
                let Some(captured) = regex.captures(line).and_then(|caps| caps.get(*group)) else {
                    return Ok(SearchOutcome::NoMatch);
                };
                let value = value
                    .convert(captured.as_str())
                    .with_context(|| format!("filter {:?}", self.name))?;
                Ok(SearchOutcome::Match(value))
            }
            LineMatcher::Contains {
                needle,
                case_sensitive,
            } => {
                let found = if *case_sensitive {
                    line.contains(needle.as_str())
                } else {
                    line.to_lowercase().contains(needle.as_str())
                };
                if found {
                    Ok(SearchOutcome::Match(Value::Bool(true)))
                } else {
                    Ok(SearchOutcome::NoMatch)
                }
            }
        }
    }
}

fn compile_regex(pattern: &str, case_sensitive: bool, name: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .with_context(|| format!("invalid regex for filter {name:?}"))
}
