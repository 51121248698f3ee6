//! The host's object table.
//!
//! Every reference handed out is a fresh alias id. Aliases of one object
//! share its state (`Arc`s inside the variants), so releasing one alias never
//! invalidates another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::{BridgeError, HostRef};
use bytes::Bytes;
use parking_lot::Mutex;

use crate::reader::ReaderCell;

/// Immutable blob content.
#[derive(Debug, Clone)]
pub(crate) struct BlobData {
    pub bytes: Bytes,
    pub media_type: String,
    /// Cleared when the backing content disappears; reads then fail with
    /// `NotReadableError`.
    pub readable: Arc<AtomicBool>,
}

impl BlobData {
    pub fn new(bytes: Bytes, media_type: String) -> Self {
        Self {
            bytes,
            media_type,
            readable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_readable(&self) -> bool {
        self.readable.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FileData {
    pub blob: BlobData,
    pub name: String,
    pub last_modified: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct DomErrorData {
    pub name: &'static str,
    pub message: String,
}

impl DomErrorData {
    pub fn not_readable(message: impl Into<String>) -> Self {
        Self {
            name: "NotReadableError",
            message: message.into(),
        }
    }
}

/// Flags an event's listeners can flip.
#[derive(Debug, Default)]
pub(crate) struct EventFlags {
    pub stop_propagation: AtomicBool,
    pub stop_immediate: AtomicBool,
}

#[derive(Debug, Clone)]
pub(crate) struct EventData {
    pub event_type: &'static str,
    pub length_computable: bool,
    pub loaded: u64,
    pub total: u64,
    pub time_stamp: f64,
    pub target: Arc<ReaderCell>,
    pub flags: Arc<EventFlags>,
}

#[derive(Debug)]
pub(crate) struct StreamState {
    pub offset: usize,
    pub locked: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct StreamData {
    pub bytes: Bytes,
    pub chunk_size: usize,
    pub state: Arc<Mutex<StreamState>>,
}

impl StreamData {
    pub fn new(bytes: Bytes, chunk_size: usize) -> Self {
        Self {
            bytes,
            chunk_size,
            state: Arc::new(Mutex::new(StreamState {
                offset: 0,
                locked: false,
                cancelled: false,
            })),
        }
    }

    /// The next chunk, `None` once exhausted or cancelled.
    pub fn next_chunk(&self) -> Option<Bytes> {
        let mut state = self.state.lock();
        state.locked = true;
        if state.cancelled || state.offset >= self.bytes.len() {
            return None;
        }
        let end = (state.offset + self.chunk_size).min(self.bytes.len());
        let chunk = self.bytes.slice(state.offset..end);
        state.offset = end;
        Some(chunk)
    }

    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
    }
}

/// Anything a [`HostRef`] can point at.
#[derive(Debug, Clone)]
pub(crate) enum HostObject {
    Module,
    Blob(BlobData),
    File(FileData),
    Reader(Arc<ReaderCell>),
    ArrayBuffer(Bytes),
    Event(EventData),
    Stream(StreamData),
    DomError(DomErrorData),
}

impl HostObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostObject::Module => "Module",
            HostObject::Blob(_) => "Blob",
            HostObject::File(_) => "File",
            HostObject::Reader(_) => "FileReader",
            HostObject::ArrayBuffer(_) => "ArrayBuffer",
            HostObject::Event(_) => "ProgressEvent",
            HostObject::Stream(_) => "ReadableStream",
            HostObject::DomError(_) => "DOMException",
        }
    }

    /// Blob content of a `Blob` or `File`.
    pub fn blob_data(&self) -> Option<&BlobData> {
        match self {
            HostObject::Blob(blob) => Some(blob),
            HostObject::File(file) => Some(&file.blob),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ObjectTable {
    next_id: AtomicU64,
    objects: Mutex<HashMap<u64, HostObject>>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `object` under a fresh id.
    pub fn insert(&self, object: HostObject) -> HostRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.objects.lock().insert(id, object);
        HostRef::new(id)
    }

    pub fn get(&self, target: &HostRef) -> Result<HostObject, BridgeError> {
        self.objects
            .lock()
            .get(&target.id())
            .cloned()
            .ok_or(BridgeError::UnknownObject(target.id()))
    }

    pub fn remove(&self, target: &HostRef) -> Option<HostObject> {
        self.objects.lock().remove(&target.id())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }
}
