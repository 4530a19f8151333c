//! Provides [`NososError`] and wraps other errors.
use std::fmt::{self, Debug, Display};
use std::io;

/// Crate-wide error type. All simulation errors are fatal: the run is
/// aborted and the error is reported to the caller.
///
/// The domain variants follow the failure taxonomy of the simulation:
/// `Config` for inconsistent parameters or missing inputs, `Data` for
/// malformed input rows or cache offsets, `Index` for messages whose
/// global id does not map to the receiving partition, and `Model` for
/// disease-model violations such as a transition out of a terminal state.
#[derive(Debug)]
pub enum NososError {
    IoError(io::Error),
    CsvError(csv::Error),
    JsonError(serde_json::Error),
    EncodeError(bincode::error::EncodeError),
    DecodeError(bincode::error::DecodeError),
    Config(String),
    Data(String),
    Index(String),
    Model(String),
}

impl From<io::Error> for NososError {
    fn from(error: io::Error) -> Self {
        NososError::IoError(error)
    }
}

impl From<csv::Error> for NososError {
    fn from(error: csv::Error) -> Self {
        NososError::CsvError(error)
    }
}

impl From<serde_json::Error> for NososError {
    fn from(error: serde_json::Error) -> Self {
        NososError::JsonError(error)
    }
}

impl From<bincode::error::EncodeError> for NososError {
    fn from(error: bincode::error::EncodeError) -> Self {
        NososError::EncodeError(error)
    }
}

impl From<bincode::error::DecodeError> for NososError {
    fn from(error: bincode::error::DecodeError) -> Self {
        NososError::DecodeError(error)
    }
}

impl From<String> for NososError {
    fn from(error: String) -> Self {
        NososError::Config(error)
    }
}

impl From<&str> for NososError {
    fn from(error: &str) -> Self {
        NososError::Config(error.to_string())
    }
}

impl std::error::Error for NososError {}

impl Display for NososError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {self:?}")?;
        Ok(())
    }
}
