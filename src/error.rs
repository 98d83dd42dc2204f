//! Error types for configuration loading and upstream relaying.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading the configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file is missing the {0} field")]
    MissingField(&'static str),

    #[error("{field} field exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("invalid {field} address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Errors from relaying a single query upstream.
///
/// These are scoped to the query that produced them; the proxy loop logs
/// them and keeps serving.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to open upstream socket: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to send query upstream: {0}")]
    Send(#[source] io::Error),

    #[error("failed to receive upstream reply: {0}")]
    Receive(#[source] io::Error),

    #[error("upstream did not reply within {0:?}")]
    Timeout(Duration),
}
