//! # Host Bridge Traits
//!
//! The contract between the typed File API binding layer and the host that
//! actually owns blobs, files and readers.
//!
//! ## Overview
//!
//! Managed code never touches host bytes directly. It holds opaque
//! [`HostRef`] ids and asks a [`HostBridge`] to invoke named methods on them.
//! Host-fired events come back through an [`EventRelay`], addressed by a
//! [`CallbackToken`] rather than by a managed object reference.
//!
//! ## Implementations
//!
//! | Host | Implementation Crate | Access mode |
//! |------|---------------------|-------------|
//! | Native (in-process) | `bridge-native` | remote or direct |
//! | Browser | `bridge-wasm` | direct |
//!
//! ## Error Handling
//!
//! All bridge calls return [`BridgeError`](error::BridgeError). Host
//! exceptions keep the host's message verbatim (`"NotReadableError: ..."`)
//! so callers can surface it unchanged.
//!
//! ## Thread Safety
//!
//! Bridge traits require [`PlatformSendSync`](platform::PlatformSendSync):
//! `Send + Sync` on native targets, nothing on `wasm32`.

pub mod error;
pub mod host;
pub mod platform;
pub mod time;
pub mod value;

pub use error::BridgeError;

// Re-export commonly used types
pub use host::{AccessMode, EventRelay, HostBridge};
pub use platform::{PlatformBoxFuture, PlatformSend, PlatformSendSync};
pub use time::{Clock, FixedClock, SystemClock};
pub use value::{CallbackRef, CallbackToken, FromHostValue, HostRef, HostValue, ValueTypeError};
