//! Error types for the WebAssembly host bridge

use bridge_traits::BridgeError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Result type for WebAssembly bridge operations
pub type WasmResult<T> = Result<T, WasmError>;

/// Errors that can occur while talking to the browser
#[derive(Error, Debug)]
pub enum WasmError {
    /// The browser threw. `name` is the DOM error name when there is one.
    #[error("{name}: {message}")]
    Exception {
        /// Error name, e.g. `NotReadableError`
        name: String,
        /// Error message
        message: String,
    },

    /// No object is held under this id
    #[error("Unknown host object: {0}")]
    UnknownObject(u64),

    /// Property missing or not callable
    #[error("{target} has no method {method}")]
    NotAFunction {
        /// Path or kind of the receiver
        target: String,
        /// Requested method
        method: String,
    },

    /// Value cannot cross the bridge in this direction
    #[error("Unsupported value: {0}")]
    Unsupported(String),
}

impl WasmError {
    /// Classifies a thrown JavaScript value.
    pub fn from_thrown(value: JsValue) -> Self {
        if let Some(dom) = value.dyn_ref::<web_sys::DomException>() {
            return WasmError::Exception {
                name: dom.name(),
                message: dom.message(),
            };
        }
        if let Some(error) = value.dyn_ref::<js_sys::Error>() {
            return WasmError::Exception {
                name: error.name().into(),
                message: error.message().into(),
            };
        }
        let message = value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value));
        WasmError::Exception {
            name: "Error".to_string(),
            message,
        }
    }
}

impl From<JsValue> for WasmError {
    fn from(value: JsValue) -> Self {
        WasmError::from_thrown(value)
    }
}

impl From<WasmError> for BridgeError {
    fn from(err: WasmError) -> Self {
        match err {
            WasmError::Exception { name, message } => BridgeError::dom(&name, message),
            WasmError::UnknownObject(id) => BridgeError::UnknownObject(id),
            WasmError::NotAFunction { target, method } => {
                BridgeError::MethodNotFound { target, method }
            }
            WasmError::Unsupported(message) => BridgeError::NotAvailable(message),
        }
    }
}
