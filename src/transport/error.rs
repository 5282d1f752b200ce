//! Transport layer error types.
//!
//! Receive-side errors never reach the application: a frame that fails
//! validation is dropped and the sender's timeout recovers. Only the send
//! path reports errors, and only for misuse.

use thiserror::Error;

use super::frame::FrameError;
use crate::core::NetAddr;

/// Transport layer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Frame parsing or encoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A message is already in flight somewhere on this node.
    #[error("admission gate closed: a message is already awaiting acknowledgment")]
    AdmissionClosed,

    /// Frame was addressed to another node.
    #[error("frame addressed to {0}")]
    Misaddressed(NetAddr),
}

impl TransportError {
    /// Check if this error should result in silent drop (no ACK, no NACK).
    pub fn is_silent_drop(&self) -> bool {
        match self {
            TransportError::Frame(FrameError::PayloadTooLarge { .. }) => false,
            TransportError::Frame(_) | TransportError::Misaddressed(_) => true,
            TransportError::AdmissionClosed => false,
        }
    }

    /// Check if this error indicates corruption on the channel.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            TransportError::Frame(
                FrameError::ChecksumMismatch { .. }
                    | FrameError::LengthMismatch { .. }
                    | FrameError::InvalidKind(_)
                    | FrameError::InvalidSequence(_)
                    | FrameError::TooShort { .. }
            )
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
