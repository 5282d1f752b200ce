//! Top-level error type.
//!
//! Each layer has its own error enum; this one wraps them for callers that
//! drive a whole node.

use thiserror::Error;

use super::address::NetAddr;
use crate::network::NetworkError;
use crate::transport::TransportError;

/// Top-level stopwait errors.
#[derive(Debug, Error)]
pub enum StopWaitError {
    /// Transport engine error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Network collaborator error.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No node with this address is attached.
    #[error("unknown node: {0}")]
    UnknownNode(NetAddr),

    /// The node task has stopped.
    #[error("node stopped")]
    NodeStopped,
}

/// Result type for node-level operations.
pub type StopWaitResult<T> = Result<T, StopWaitError>;
