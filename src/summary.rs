//! Per-artifact summaries.
//!
//! Matches from every compile record whose object file belongs to an artifact
//! are grouped by filter name, then each group is folded with the filter's
//! [`SummaryPolicy`].
use crate::config::Config;
use crate::filter::Filter;
use crate::report::{ReportDocument, SummaryRecord, SummaryResult};
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Reduction applied to a filter's match values.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPolicy {
    Sum,
    Mean,
    #[default]
    Append,
    Number,
    Or,
    And,
    Count,
}

impl SummaryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryPolicy::Sum => "sum",
            SummaryPolicy::Mean => "mean",
            SummaryPolicy::Append => "append",
            SummaryPolicy::Number => "number",
            SummaryPolicy::Or => "or",
            SummaryPolicy::And => "and",
            SummaryPolicy::Count => "count",
        }
    }

    /// Fold a non-empty list of match values into one result.
    pub fn reduce(self, values: Vec<Value>) -> Result<Value> {
        match self {
            SummaryPolicy::Sum => sum(&values),
            SummaryPolicy::Mean => mean(&values),
            SummaryPolicy::Append => Ok(Value::Array(values)),
            SummaryPolicy::Number => Ok(Value::from(values.len())),
            SummaryPolicy::Or => Ok(Value::Bool(values.iter().any(is_truthy))),
            SummaryPolicy::And => Ok(Value::Bool(values.iter().all(is_truthy))),
            SummaryPolicy::Count => Ok(count(&values)),
        }
    }
}

impl fmt::Display for SummaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the summary of `executable` from the records of its `obj_files`.
///
/// Filters without any match among those records are left out of `results`.
pub fn build_summary(
    config: &Config,
    report: &ReportDocument,
    obj_files: &[String],
    executable: &str,
) -> Result<SummaryRecord> {
    let selected: BTreeSet<&str> = obj_files.iter().map(String::as_str).collect();
    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for compil in report
        .compils
        .iter()
        .filter(|compil| compil.obj_file.is_member_of(&selected))
    {
        for record in &compil.matches {
            grouped
                .entry(record.name.as_str())
                .or_default()
                .push(record.value.clone());
        }
    }

    let mut results = Vec::new();
    for filter in &config.filters {
        let Some(values) = grouped.remove(filter.name()) else {
            continue;
        };
        let result = filter
            .summary()
            .reduce(values)
            .with_context(|| format!("summarize filter {:?} for {executable}", filter.name()))?;
        results.push(SummaryResult {
            name: filter.name().to_string(),
            result,
        });
    }

    Ok(SummaryRecord {
        executable: executable.to_string(),
        obj_files: obj_files.to_vec(),
        results,
    })
}

enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric(value: &Value) -> Result<Numeric> {
    match value {
        Value::Bool(flag) => Ok(Numeric::Int(i64::from(*flag))),
        Value::Number(number) => match number.as_i64() {
            Some(int) => Ok(Numeric::Int(int)),
            None => number
                .as_f64()
                .map(Numeric::Float)
                .ok_or_else(|| anyhow!("value {number} is not representable")),
        },
        other => Err(anyhow!("value {other} is not numeric")),
    }
}

/// Integer total while every value is an integer and the sum fits, float otherwise.
fn sum(values: &[Value]) -> Result<Value> {
    let mut int_total = Some(0i64);
    let mut float_total = 0.0f64;
    for value in values {
        match numeric(value)? {
            Numeric::Int(int) => {
                int_total = int_total.and_then(|total| total.checked_add(int));
                float_total += int as f64;
            }
            Numeric::Float(float) => {
                int_total = None;
                float_total += float;
            }
        }
    }
    match int_total {
        Some(total) => Ok(Value::from(total)),
        None => float_value(float_total),
    }
}

fn mean(values: &[Value]) -> Result<Value> {
    ensure!(!values.is_empty(), "mean of no values");
    let mut total = 0.0f64;
    for value in values {
        total += match numeric(value)? {
            Numeric::Int(int) => int as f64,
            Numeric::Float(float) => float,
        };
    }
    float_value(total / values.len() as f64)
}

fn float_value(float: f64) -> Result<Value> {
    Number::from_f64(float)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("result {float} is not a finite number"))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|float| float != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Occurrences per distinct value, keyed in first-seen order.
fn count(values: &[Value]) -> Value {
    let mut order: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for value in values {
        let key = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        match index.get(&key) {
            Some(&slot) => order[slot].1 += 1,
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, 1));
            }
        }
    }
    let counts: Map<String, Value> = order
        .into_iter()
        .map(|(key, occurrences)| (key, Value::from(occurrences)))
        .collect();
    Value::Object(counts)
}
