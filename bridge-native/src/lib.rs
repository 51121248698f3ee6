//! # Native Bridge Implementation
//!
//! An in-process File API host for native targets.
//!
//! ## Overview
//!
//! [`MemoryHost`] implements [`HostBridge`](bridge_traits::HostBridge) over an
//! in-memory object table. It models the host side the binding layer talks
//! to: `Blob`/`File` construction and slicing, `FileReader` with its event
//! sequence, progress events, streams and object URLs, plus the helper module
//! functions (`getAttribute`, `constructBlob`, `registerEventHandlers`, ...).
//!
//! Two flavours cover both calling conventions:
//! - [`MemoryHost::remote`] suspends on every call, like a host across a
//!   process or network boundary
//! - [`MemoryHost::direct`] answers on first poll, like a host sharing the
//!   caller's thread
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_native::{MemoryHost, MemoryHostConfig};
//!
//! let host = Arc::new(MemoryHost::new(
//!     MemoryHostConfig::remote().with_chunk_size(16 * 1024),
//! ));
//! ```

mod config;
mod encoding;
mod host;
mod objects;
mod reader;

pub use config::{MemoryHostConfig, DEFAULT_CHUNK_SIZE};
pub use encoding::{binary_string, data_url, decode_text, normalize_type};
pub use host::{MemoryHost, OBJECT_URL_PREFIX};
