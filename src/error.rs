//! Unified error type.

use crate::store::DataError;

/// The error type returned by the service's fallible startup and serving
/// operations.
///
/// Application-level errors (400, 401, 500, etc.) are expressed as HTTP
/// replies written to the response sink, not as `Error`s. This type surfaces
/// infrastructure failures: binding to a port, building the data source, or
/// installing the log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("data source: {0}")]
    Data(#[from] DataError),

    #[error("logging: {0}")]
    Logging(String),
}
