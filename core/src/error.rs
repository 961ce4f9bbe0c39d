use rusqlite::ErrorCode;
use thiserror::Error;

pub type JsonLiteResult<T> = Result<T, JsonLiteError>;

#[derive(Error, Debug)]
pub enum JsonLiteError {
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Assigned path: {0}")]
    AssignedPath(String),

    #[error("Disallowed: {0}")]
    Disallowed(String),

    #[error("Missing value: {0}")]
    MissingValue(String),

    #[error("rowid {0} not found")]
    RowNotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Engine error: {0}")]
    Engine(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JsonLiteError {
    /// True for engine-level constraint failures such as a UNIQUE index violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            JsonLiteError::Engine(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation
        )
    }

    /// Engine message text, if this error came from the engine.
    pub fn engine_message(&self) -> Option<String> {
        match self {
            JsonLiteError::Engine(rusqlite::Error::SqliteFailure(err, msg)) => {
                Some(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            JsonLiteError::Engine(other) => Some(other.to_string()),
            _ => None,
        }
    }
}
