use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Table not found: {0}")]
    MissingTable(String),

    #[error("Unconfigured: {0}")]
    Unconfigured(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by the caller's input (missing goal, bad id or
    /// date). Handlers surface these as client errors, the rest as server
    /// errors.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidParameter(_))
    }

    pub fn is_missing_table(&self) -> bool {
        matches!(self, Error::MissingTable(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        const MARKER: &str = "no such table: ";
        let msg = e.to_string();
        // Prepare errors may carry a " in <sql> at offset N" suffix.
        match msg.find(MARKER).map(|i| &msg[i + MARKER.len()..]) {
            Some(rest) => {
                let table = rest.split_whitespace().next().unwrap_or(rest);
                Error::MissingTable(table.to_string())
            }
            None => Error::DataSource(msg),
        }
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::DataSource(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
