use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    /// The host threw while servicing a call. The message is the host's own.
    #[error("Host exception: {0}")]
    HostException(String),

    #[error("Unknown host object: {0}")]
    UnknownObject(u64),

    #[error("Host method not found: {target}.{method}")]
    MethodNotFound { target: String, method: String },

    #[error("Invalid argument for {method}: {message}")]
    InvalidArgument { method: String, message: String },
}

impl BridgeError {
    /// Shorthand for a host exception carrying a DOM-style error name.
    pub fn dom(name: &str, message: impl std::fmt::Display) -> Self {
        BridgeError::HostException(format!("{name}: {message}"))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
