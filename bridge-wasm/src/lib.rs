//! WebAssembly Host Bridge
//!
//! Implements [`HostBridge`](bridge_traits::HostBridge) on top of the browser's
//! own `Blob`, `File`, `FileReader` and `URL` objects through `wasm-bindgen`.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! It will not compile for native targets.
//!
//! # Helper Module
//!
//! The binding layer drives the browser through a small ES module,
//! [`HELPER_SOURCE`]. Serve it next to the application and point
//! `FileApiOptions` at it, or import it inline with [`helper_data_url`].
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_wasm::WasmHost;
//! use core_fileapi::{Blob, BlobPart, BlobPropertyBag, FileApi};
//!
//! let api = FileApi::new(Arc::new(WasmHost::new()));
//! let blob = Blob::new(&api, vec![BlobPart::from("hi")], BlobPropertyBag::default()).await?;
//! assert_eq!(blob.size_now()?, 2);
//! ```

#![cfg(target_arch = "wasm32")]
#![warn(missing_docs)]

pub mod error;
pub mod host;

pub use error::{WasmError, WasmResult};
pub use host::WasmHost;

/// Source of the ES module the binding layer imports.
pub const HELPER_SOURCE: &str = include_str!("../js/fileapi.js");

/// A `data:` URL that imports [`HELPER_SOURCE`] without serving a file.
pub fn helper_data_url() -> String {
    let encoded: String = js_sys::encode_uri_component(HELPER_SOURCE).into();
    format!("data:text/javascript;charset=utf-8,{}", encoded)
}
