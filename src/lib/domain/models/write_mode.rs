use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How the destination table is treated before rows are inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Drop the table if present, recreate it from the source, insert.
    #[default]
    Replace,
    /// Insert into an existing table with the same column set.
    Append,
    /// Refuse to run if the table exists, otherwise behave like `Replace`.
    Fail,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
            WriteMode::Fail => "fail",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            "fail" => Ok(WriteMode::Fail),
            other => Err(LoadError::InvalidArgument(format!(
                "unknown write mode '{}', expected one of replace, append, fail",
                other
            ))),
        }
    }
}
