use crate::error::JsonLiteError;
use std::fmt;
use std::str::FromStr;

/// What to do when a write violates a UNIQUE index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Duplicates {
    /// Fail with the engine's constraint error.
    #[default]
    Reject,
    /// Replace the conflicting row.
    Replace,
    /// Keep the existing row, skip the new one.
    Ignore,
}

impl Duplicates {
    /// Conflict clause for `INSERT`/`UPDATE`.
    pub fn conflict_clause(self) -> &'static str {
        match self {
            Duplicates::Reject => "",
            Duplicates::Replace => "OR REPLACE ",
            Duplicates::Ignore => "OR IGNORE ",
        }
    }
}

impl FromStr for Duplicates {
    type Err = JsonLiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" | "error" => Ok(Duplicates::Reject),
            "replace" => Ok(Duplicates::Replace),
            "ignore" => Ok(Duplicates::Ignore),
            other => Err(JsonLiteError::InvalidInput(format!(
                "duplicates must be one of reject, replace, ignore; got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Avg,
    Count,
    Max,
    Min,
    Sum,
    Total,
}

impl AggregateFunction {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Total => "TOTAL",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = JsonLiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVG" => Ok(AggregateFunction::Avg),
            "COUNT" => Ok(AggregateFunction::Count),
            "MAX" => Ok(AggregateFunction::Max),
            "MIN" => Ok(AggregateFunction::Min),
            "SUM" => Ok(AggregateFunction::Sum),
            "TOTAL" => Ok(AggregateFunction::Total),
            _ => Err(JsonLiteError::InvalidInput(format!(
                "unallowed aggregate function {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// WAL checkpoint modes, see <https://sqlite.org/wal.html#ckpt>.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    Passive,
    Full,
    Restart,
    Truncate,
}

impl CheckpointMode {
    pub fn as_sql(self) -> &'static str {
        match self {
            CheckpointMode::Passive => "PASSIVE",
            CheckpointMode::Full => "FULL",
            CheckpointMode::Restart => "RESTART",
            CheckpointMode::Truncate => "TRUNCATE",
        }
    }
}

impl FromStr for CheckpointMode {
    type Err = JsonLiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PASSIVE" => Ok(CheckpointMode::Passive),
            "FULL" => Ok(CheckpointMode::Full),
            "RESTART" => Ok(CheckpointMode::Restart),
            "TRUNCATE" => Ok(CheckpointMode::Truncate),
            _ => Err(JsonLiteError::InvalidInput(format!(
                "invalid checkpoint mode {:?}",
                s
            ))),
        }
    }
}
