use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

use crate::data::model::Field;

/// Result type for loading and filtering.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors raised while reading, ingesting or filtering a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{origin}: missing required field '{field}'")]
    MissingField { field: Field, origin: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: top-level JSON value is not an object", path.display())]
    NotAnObject { path: PathBuf },

    #[error("cannot filter a store without fields")]
    EmptyStore,

    #[error("column '{0}' was not loaded")]
    MissingColumn(Field),

    #[error("'{field}' is present in {present} of {records} records")]
    Misaligned {
        field: String,
        present: usize,
        records: usize,
    },

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl DatasetError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DatasetError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
