//! Error types for the File API binding layer.

use bridge_traits::{BridgeError, HostRef, ValueTypeError};
use thiserror::Error;

/// Errors surfaced by the typed wrappers.
#[derive(Error, Debug)]
pub enum FileApiError {
    /// The handle was disposed before this call.
    #[error("Handle {0} has been disposed")]
    Disposed(HostRef),

    /// A synchronous accessor was used on a remote handle.
    #[error("Synchronous access to {0} requires a direct-mode handle")]
    RequiresDirectAccess(HostRef),

    /// A synchronous accessor hit a host call that did not complete on first poll.
    #[error("Synchronous call '{0}' would suspend")]
    WouldSuspend(&'static str),

    /// The host threw.
    #[error(transparent)]
    Host(#[from] BridgeError),

    /// The host answered with a value of the wrong shape.
    #[error("Unexpected value from '{operation}': {source}")]
    UnexpectedValue {
        operation: String,
        #[source]
        source: ValueTypeError,
    },

    /// `readyState` outside EMPTY/LOADING/DONE.
    #[error("Unknown ready state {0}")]
    UnknownReadyState(u16),

    /// `lastModified` does not fit a UTC timestamp.
    #[error("Timestamp {0}ms is out of range")]
    TimestampOutOfRange(i64),

    /// Options could not be encoded for the host.
    #[error("Failed to encode options: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl FileApiError {
    pub(crate) fn unexpected(operation: impl Into<String>, source: ValueTypeError) -> Self {
        FileApiError::UnexpectedValue {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the error is the caller's fault rather than the host's.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            FileApiError::Disposed(_)
                | FileApiError::RequiresDirectAccess(_)
                | FileApiError::WouldSuspend(_)
        )
    }

    /// The host's exception message, if the host threw.
    pub fn host_message(&self) -> Option<String> {
        match self {
            FileApiError::Host(BridgeError::HostException(message)) => Some(message.clone()),
            FileApiError::Host(other) => Some(other.to_string()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileApiError>;
