use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("database error: {0}")]
    Database(String),

    #[error("schema already present: {0}")]
    SchemaExists(String),

    #[error("failed to read input file {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("{path}: missing column {column}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: malformed row at line {line}: {message}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("invalid sample id (expected <SubjectID>-<VisitID>): {0}")]
    MalformedSampleId(String),

    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: String, key: String },

    #[error("invalid query number {0}; choose between 1 and 9")]
    InvalidQuery(i64),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl From<rusqlite::Error> for KiraError {
    fn from(err: rusqlite::Error) -> Self {
        KiraError::Database(err.to_string())
    }
}
