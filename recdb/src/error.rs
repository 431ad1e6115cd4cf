use crate::field::Location;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecError {
    #[error("{location}: parse error: {message}")]
    Parse { location: Location, message: String },

    #[error("Duplicate record set type: {0}")]
    DuplicateType(String),

    #[error("Record set type not found: {0}")]
    TypeNotFound(String),

    #[error("Record set index {index} out of range (database has {size} record sets)")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Invalid field name: '{0}'")]
    InvalidFieldName(String),

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist file: {0}")]
    Persist(#[from] tempfile::PersistError),

}

impl RecError {
    pub(crate) fn parse(location: Location, message: impl Into<String>) -> Self {
        RecError::Parse {
            location,
            message: message.into(),
        }
    }
}

/// Failures raised while evaluating a selection expression against a record.
/// These never abort a query: the record simply does not match.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid regular expression '{0}'")]
    InvalidRegex(String),

    #[error("Invalid date '{0}'")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, RecError>;
