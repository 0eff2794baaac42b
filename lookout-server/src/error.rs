//! Server error types

use lookout_core::CodecError;
use thiserror::Error;

/// Errors that can occur in the lookout server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Viewer limit reached; the connection is refused
    #[error("viewer limit of {max} reached")]
    CapacityExceeded { max: usize },

    /// A capture did not finish within the per-cycle budget
    #[error("frame capture exceeded its time budget")]
    FrameBudgetExceeded,

    /// The frame source stayed locked past the wait budget; the operation
    /// may still complete in the background
    #[error("frame source busy for more than {0:?}")]
    SourceBusy(std::time::Duration),

    /// Frame encoding failed
    #[error("frame encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// Outbound message could not be serialized
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
