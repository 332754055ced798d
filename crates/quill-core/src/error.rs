//! Error types for the Quill core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("Unknown account {0}: not loaded into the device address cache")]
    UnknownAddress(String),

    #[error("Expected an account index or a checksum address, not both or neither")]
    AmbiguousArguments,

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
