//! Crate-level error type

use thiserror::Error;

use crate::source::SourceError;

/// Result alias used by the server and source APIs
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the server or its frame source
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
}
