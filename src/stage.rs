//! Build stages used to scope filters and raw output retention.
use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocess,
    Compile,
    Assemble,
    Link,
    Archive,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Preprocess,
        Stage::Compile,
        Stage::Assemble,
        Stage::Link,
        Stage::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Compile => "compile",
            Stage::Assemble => "assemble",
            Stage::Link => "link",
            Stage::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| anyhow!("unknown stage {raw:?}"))
    }
}
