//! Workspace façade crate.
//!
//! Re-exports the binding layer together with the host implementation that
//! matches the enabled features, so embedders can depend on
//! `fileapi-workspace` alone:
//!
//! - `native-host` (default): the in-process [`bridge_native::MemoryHost`]
//! - `wasm`: the browser-backed `bridge_wasm::WasmHost` (wasm32 only)

pub use bridge_traits;
pub use core_fileapi;
pub use core_runtime;

#[cfg(all(feature = "native-host", not(target_arch = "wasm32")))]
pub use bridge_native;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use bridge_wasm;
