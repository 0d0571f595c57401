use thiserror::Error;

use super::connection::PathIndex;

/// Errors of the fallible ambient operations: strategy registration, name
/// parsing, configuration loading and connection membership.
///
/// Congestion control hooks themselves never fail.
#[derive(Debug, Error)]
pub enum LiaError {
    #[error("unknown congestion control algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("congestion control strategy already registered: {0}")]
    DuplicateStrategy(&'static str),

    #[error("path {0} is already a member of this connection")]
    DuplicatePath(PathIndex),

    #[error("connection is not multipath, cannot add a second subflow")]
    NotMultipath,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
