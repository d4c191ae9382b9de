use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to encode task collection: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unable to write task file `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("task description must not be empty")]
    EmptyDescription,
    #[error("unable to parse `{date} {time}` as DD-MM-YYYY HH:MM:SS AM/PM")]
    Unparseable { date: String, time: String },
    #[error("date and time must be in the future")]
    NotInFuture,
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
