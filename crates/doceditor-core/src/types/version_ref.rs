//! Version selector accepted by resolve/download.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Selects one version of a file: a concrete number or whatever is newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionRef {
    /// The highest committed version.
    #[default]
    Latest,
    /// A specific version number.
    Number(u32),
}

impl From<u32> for VersionRef {
    fn from(version: u32) -> Self {
        Self::Number(version)
    }
}

impl From<Option<u32>> for VersionRef {
    fn from(version: Option<u32>) -> Self {
        version.map_or(Self::Latest, Self::Number)
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for VersionRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse::<u32>().map(Self::Number).map_err(|_| {
            AppError::invalid_operation(format!(
                "Invalid version '{s}'. Expected a non-negative number or 'latest'"
            ))
        })
    }
}
