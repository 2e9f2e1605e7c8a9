use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unsupported file format for {path:?}")]
    UnsupportedFormat { path: PathBuf },

    #[error("File {path:?} contains no data rows")]
    EmptyFile { path: PathBuf },

    #[error("File {path:?} is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Table {schema}.{table} does not exist and table creation was not requested")]
    MissingTable { schema: String, table: String },

    #[error("None of the source columns match a column of {schema}.{table}")]
    NoMatchingColumns { schema: String, table: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ImportError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ImportError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Relation {0} already exists")]
    AlreadyExists(String),

    #[error("Relation {0} does not exist")]
    NotFound(String),

    #[error("Column '{column}' does not exist on {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Null value in column '{column}' violates not-null constraint")]
    NotNullViolation { column: String },

    #[error("Duplicate key value violates unique constraint on '{column}'")]
    UniqueViolation { column: String },

    #[error("Value for column '{column}' does not match type {sql_type}")]
    TypeMismatch { column: String, sql_type: String },

    #[error("Database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot convert '{value}' to {sql_type} for column '{column}'")]
pub struct CoercionError {
    pub column: String,
    pub sql_type: String,
    pub value: String,
}
