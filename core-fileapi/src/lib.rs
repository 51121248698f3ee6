//! # Typed File API Bindings
//!
//! Strongly typed wrappers over a host's `Blob`, `File`, `FileReader`,
//! `ProgressEvent` and object URL APIs, reached through a
//! [`HostBridge`](bridge_traits::HostBridge).
//!
//! ## Overview
//!
//! Every wrapper holds an opaque [`JsReference`] to a host object and is
//! created from a shared [`FileApi`] context. Operations are async because a
//! host may live across a process or network boundary
//! ([`AccessMode::Remote`](bridge_traits::AccessMode::Remote)). When the host
//! shares the caller's execution context
//! ([`AccessMode::Direct`](bridge_traits::AccessMode::Direct)) the `*_now`
//! accessors answer without suspending.
//!
//! ## Usage
//!
//! ```ignore
//! use core_fileapi::{Blob, BlobPart, BlobPropertyBag, FileApi, FileReader, ProgressEventKind};
//!
//! let api = FileApi::new(host);
//! let blob = Blob::new(&api, vec![BlobPart::from("hello")], BlobPropertyBag::default()).await?;
//! let reader = FileReader::new(&api).await?;
//! let mut events = reader.subscribe();
//!
//! reader.read_as_text(&blob, None).await?;
//! events.until(ProgressEventKind::LoadEnd).await?;
//! assert_eq!(reader.result_as_string().await?.as_deref(), Some("hello"));
//! ```
//!
//! ## Disposal
//!
//! Host objects are released explicitly with `dispose()`. Disposal is
//! idempotent; using a disposed wrapper fails with
//! [`FileApiError::Disposed`].

pub mod api;
pub mod blob;
mod callbacks;
pub mod error;
pub mod exception;
pub mod file;
pub mod file_reader;
pub mod helper;
pub mod listener;
pub mod options;
pub mod progress_event;
pub mod reference;
pub mod stream;
pub mod url;

pub use api::FileApi;
pub use blob::Blob;
pub use error::{FileApiError, Result};
pub use exception::DomException;
pub use file::File;
pub use file_reader::{
    FileReader, ReadyState, ReaderEvent, ReaderEventStream, ResultType, DEFAULT_EVENT_BUFFER_SIZE,
};
pub use helper::HelperModule;
pub use listener::{DispatchReport, EventListener};
pub use options::{BlobPart, BlobPropertyBag, EndingType, FilePropertyBag};
pub use progress_event::{EventPhase, ProgressEvent, ProgressEventKind, ProgressSnapshot};
pub use reference::{CreationOptions, JsReference, WrapperId};
pub use stream::ReadableStream;
pub use url::UrlService;
