//! In-process host implementing [`HostBridge`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{AccessMode, BridgeError, HostBridge, HostRef, HostValue};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::MemoryHostConfig;
use crate::encoding::{convert_line_endings, native_line_ending, normalize_type};
use crate::objects::{BlobData, DomErrorData, EventData, FileData, HostObject, ObjectTable, StreamData};
use crate::reader::{ReadKind, ReaderCell, ReaderResult};

type Result<T> = std::result::Result<T, BridgeError>;

/// Prefix of every object URL this host mints.
pub const OBJECT_URL_PREFIX: &str = "blob:fileapi/";

pub(crate) struct HostShared {
    pub config: MemoryHostConfig,
    pub objects: ObjectTable,
    object_urls: Mutex<HashMap<String, BlobData>>,
    imports: AtomicUsize,
    origin: DateTime<Utc>,
}

impl HostShared {
    /// Milliseconds since the host was created, for event `timeStamp`s.
    pub fn elapsed_millis(&self) -> f64 {
        let elapsed = self.config.clock.now() - self.origin;
        elapsed.num_microseconds().map_or(0.0, |us| us as f64 / 1000.0)
    }
}

/// A File API host that keeps every object in memory.
///
/// Implements the host object model (blobs, files, readers, progress events,
/// streams, object URLs) and the helper module functions the binding layer
/// imports. Reader events are dispatched from a Tokio task, so reads must be
/// started from inside a Tokio runtime.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use bridge_native::MemoryHost;
/// use core_fileapi::FileApi;
///
/// let host = Arc::new(MemoryHost::remote());
/// let api = FileApi::new(host.clone());
/// ```
#[derive(Clone)]
pub struct MemoryHost {
    shared: Arc<HostShared>,
}

impl MemoryHost {
    pub fn new(config: MemoryHostConfig) -> Self {
        let origin = config.clock.now();
        Self {
            shared: Arc::new(HostShared {
                config,
                objects: ObjectTable::new(),
                object_urls: Mutex::new(HashMap::new()),
                imports: AtomicUsize::new(0),
                origin,
            }),
        }
    }

    /// A host whose calls always suspend before answering.
    pub fn remote() -> Self {
        Self::new(MemoryHostConfig::remote())
    }

    /// A host whose calls complete on first poll.
    pub fn direct() -> Self {
        Self::new(MemoryHostConfig::direct())
    }

    pub fn config(&self) -> &MemoryHostConfig {
        &self.shared.config
    }

    /// How many times the helper module was imported.
    pub fn import_count(&self) -> usize {
        self.shared.imports.load(Ordering::Acquire)
    }

    /// References currently held in the object table.
    pub fn live_objects(&self) -> usize {
        self.shared.objects.len()
    }

    pub fn object_url_count(&self) -> usize {
        self.shared.object_urls.lock().len()
    }

    /// The content behind an object URL, as a fetch would see it.
    pub fn resolve_object_url(&self, url: &str) -> Option<Bytes> {
        self.shared
            .object_urls
            .lock()
            .get(url)
            .map(|blob| blob.bytes.clone())
    }

    /// Seeds a host-created blob, as a drag-and-drop or network response would.
    pub fn insert_blob(&self, bytes: impl Into<Bytes>, media_type: &str) -> HostRef {
        self.shared.objects.insert(HostObject::Blob(BlobData::new(
            bytes.into(),
            normalize_type(media_type),
        )))
    }

    /// Seeds a host-created file, as a file picker would.
    pub fn insert_file(
        &self,
        bytes: impl Into<Bytes>,
        name: &str,
        media_type: &str,
        last_modified: DateTime<Utc>,
    ) -> HostRef {
        self.shared.objects.insert(HostObject::File(FileData {
            blob: BlobData::new(bytes.into(), normalize_type(media_type)),
            name: name.to_string(),
            last_modified: last_modified.timestamp_millis(),
        }))
    }

    /// Makes a blob's content unreadable, as if its backing file was deleted.
    ///
    /// Slices taken from the blob share its content and become unreadable too.
    pub fn invalidate(&self, target: &HostRef) -> Result<()> {
        let object = self.shared.objects.get(target)?;
        let blob = object
            .blob_data()
            .ok_or_else(|| invalid_argument("invalidate", "target is not a Blob"))?;
        blob.readable.store(false, Ordering::Release);
        debug!(%target, "Blob content invalidated");
        Ok(())
    }

    async fn pause(&self) {
        if self.shared.config.simulate_latency {
            tokio::task::yield_now().await;
        }
    }

    fn insert(&self, object: HostObject) -> HostValue {
        HostValue::Object(self.shared.objects.insert(object))
    }

    fn object_arg(&self, method: &str, args: &[HostValue], index: usize) -> Result<HostObject> {
        match args.get(index) {
            Some(HostValue::Object(target)) => self.shared.objects.get(target),
            Some(other) => Err(invalid_argument(
                method,
                format!("argument {} must be an object, got {}", index, other.kind_name()),
            )),
            None => Err(invalid_argument(method, format!("missing argument {}", index))),
        }
    }

    fn blob_arg(&self, method: &str, args: &[HostValue], index: usize) -> Result<BlobData> {
        self.object_arg(method, args, index)?
            .blob_data()
            .cloned()
            .ok_or_else(|| invalid_argument(method, format!("argument {} must be a Blob", index)))
    }

    fn reader_arg(&self, method: &str, args: &[HostValue], index: usize) -> Result<Arc<ReaderCell>> {
        match self.object_arg(method, args, index)? {
            HostObject::Reader(cell) => Ok(cell),
            _ => Err(invalid_argument(method, format!("argument {} must be a FileReader", index))),
        }
    }

    // Globals

    fn import(&self, args: &[HostValue]) -> Result<HostValue> {
        let path = string_arg("import", args, 0)?;
        if path.trim().is_empty() {
            return Err(BridgeError::dom("TypeError", "Module specifier is empty"));
        }
        let count = self.shared.imports.fetch_add(1, Ordering::AcqRel) + 1;
        info!(path = %path, count, "Helper module imported");
        Ok(self.insert(HostObject::Module))
    }

    fn create_object_url(&self, args: &[HostValue]) -> Result<HostValue> {
        let blob = self.blob_arg("URL.createObjectURL", args, 0)?;
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4());
        self.shared.object_urls.lock().insert(url.clone(), blob);
        debug!(url = %url, "Object URL registered");
        Ok(HostValue::String(url))
    }

    fn revoke_object_url(&self, args: &[HostValue]) -> Result<HostValue> {
        let url = string_arg("URL.revokeObjectURL", args, 0)?;
        if self.shared.object_urls.lock().remove(&url).is_some() {
            debug!(url = %url, "Object URL revoked");
        }
        Ok(HostValue::Null)
    }

    // Helper module

    fn call_helper(&self, method: &str, args: &[HostValue]) -> Result<HostValue> {
        match method {
            "getAttribute" => {
                let object = self.object_arg(method, args, 0)?;
                let name = string_arg(method, args, 1)?;
                self.attribute(&object, &name)
            }
            "constructBlob" => {
                let options = BagOptions::parse(method, args.get(1))?;
                let bytes = self.collect_parts(method, args.first(), options.native_endings)?;
                Ok(self.insert(HostObject::Blob(BlobData::new(
                    bytes,
                    normalize_type(&options.media_type),
                ))))
            }
            "constructFile" => {
                let options = BagOptions::parse(method, args.get(2))?;
                let bytes = self.collect_parts(method, args.first(), options.native_endings)?;
                let name = string_arg(method, args, 1)?;
                let last_modified = options
                    .last_modified
                    .unwrap_or_else(|| self.shared.config.clock.unix_timestamp_millis());
                Ok(self.insert(HostObject::File(FileData {
                    blob: BlobData::new(bytes, normalize_type(&options.media_type)),
                    name,
                    last_modified,
                })))
            }
            "constructFileReader" => Ok(self.insert(HostObject::Reader(Arc::new(ReaderCell::new())))),
            "arrayBuffer" => match self.object_arg(method, args, 0)? {
                HostObject::ArrayBuffer(bytes) => Ok(HostValue::Bytes(bytes)),
                other => Err(invalid_argument(
                    method,
                    format!("expected ArrayBuffer, got {}", other.kind_name()),
                )),
            },
            "isArrayBuffer" => {
                let cell = self.reader_arg(method, args, 0)?;
                Ok(HostValue::Bool(matches!(cell.result(), ReaderResult::Buffer(_))))
            }
            "registerEventHandlers" => {
                let Some(HostValue::Callback(callback)) = args.first() else {
                    return Err(invalid_argument(method, "argument 0 must be a callback"));
                };
                let cell = self.reader_arg(method, args, 1)?;
                debug!(token = %callback.token, "Reader events wired to callback");
                cell.add_callback(callback.clone());
                Ok(HostValue::Null)
            }
            other => Err(method_not_found("Module", other)),
        }
    }

    fn collect_parts(&self, method: &str, parts: Option<&HostValue>, native: bool) -> Result<Bytes> {
        let items = match parts {
            None | Some(HostValue::Null) => return Ok(Bytes::new()),
            Some(HostValue::Array(items)) => items,
            Some(other) => {
                return Err(invalid_argument(
                    method,
                    format!("parts must be an array, got {}", other.kind_name()),
                ))
            }
        };

        let mut content = Vec::new();
        for item in items {
            match item {
                HostValue::Bytes(bytes) => content.extend_from_slice(bytes),
                HostValue::String(text) if native => {
                    content.extend_from_slice(convert_line_endings(text, native_line_ending()).as_bytes())
                }
                HostValue::String(text) => content.extend_from_slice(text.as_bytes()),
                HostValue::Object(part) => {
                    let object = self.shared.objects.get(part)?;
                    let blob = object
                        .blob_data()
                        .ok_or_else(|| invalid_argument(method, "object parts must be Blobs"))?;
                    content.extend_from_slice(&blob.bytes);
                }
                other => {
                    return Err(invalid_argument(
                        method,
                        format!("unsupported part of type {}", other.kind_name()),
                    ))
                }
            }
        }
        Ok(Bytes::from(content))
    }

    fn attribute(&self, object: &HostObject, name: &str) -> Result<HostValue> {
        if let Some(blob) = object.blob_data() {
            match name {
                "size" => return Ok((blob.bytes.len() as u64).into()),
                "type" => return Ok(blob.media_type.clone().into()),
                _ => {}
            }
        }

        let value = match (object, name) {
            (HostObject::File(file), "name") => file.name.clone().into(),
            (HostObject::File(file), "lastModified") => file.last_modified.into(),
            (HostObject::Reader(cell), "readyState") => u64::from(cell.ready_state()).into(),
            (HostObject::Reader(cell), "result") => match cell.result() {
                ReaderResult::Empty => HostValue::Null,
                ReaderResult::Text(text) => HostValue::String(text),
                ReaderResult::Buffer(bytes) => self.insert(HostObject::ArrayBuffer(bytes)),
            },
            (HostObject::Reader(cell), "error") => match cell.error() {
                Some(error) => self.insert(HostObject::DomError(error)),
                None => HostValue::Null,
            },
            (HostObject::Event(event), _) => self.event_attribute(event, name)?,
            (HostObject::DomError(error), "name") => error.name.into(),
            (HostObject::DomError(error), "message") => error.message.clone().into(),
            (HostObject::Stream(stream), "locked") => stream.state.lock().locked.into(),
            (HostObject::ArrayBuffer(bytes), "byteLength") => (bytes.len() as u64).into(),
            (other, _) => return Err(no_attribute(other.kind_name(), name)),
        };
        Ok(value)
    }

    fn event_attribute(&self, event: &EventData, name: &str) -> Result<HostValue> {
        Ok(match name {
            "type" => event.event_type.into(),
            "lengthComputable" => event.length_computable.into(),
            "loaded" => event.loaded.into(),
            "total" => event.total.into(),
            "bubbles" | "cancelable" | "defaultPrevented" => false.into(),
            "eventPhase" => 2u64.into(),
            "timeStamp" => event.time_stamp.into(),
            "isTrusted" => true.into(),
            "target" => self.insert(HostObject::Reader(Arc::clone(&event.target))),
            other => return Err(no_attribute("ProgressEvent", other)),
        })
    }

    // Host objects

    fn call_blob(&self, blob: &BlobData, method: &str, args: &[HostValue]) -> Result<HostValue> {
        match method {
            "slice" => {
                let size = blob.bytes.len() as i64;
                let start = relative_offset(number_arg(method, args, 0)?, 0, size);
                let end = relative_offset(number_arg(method, args, 1)?, size, size);
                let span_end = end.max(start) as usize;
                let content_type = match args.get(2) {
                    Some(HostValue::String(content_type)) => normalize_type(content_type),
                    _ => String::new(),
                };
                Ok(self.insert(HostObject::Blob(BlobData {
                    bytes: blob.bytes.slice(start as usize..span_end),
                    media_type: content_type,
                    readable: Arc::clone(&blob.readable),
                })))
            }
            "stream" => {
                ensure_readable(blob)?;
                Ok(self.insert(HostObject::Stream(StreamData::new(
                    blob.bytes.clone(),
                    self.shared.config.chunk_size,
                ))))
            }
            "text" => {
                ensure_readable(blob)?;
                let bytes = blob.bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&blob.bytes[..]);
                Ok(String::from_utf8_lossy(bytes).into_owned().into())
            }
            "arrayBuffer" => {
                ensure_readable(blob)?;
                Ok(self.insert(HostObject::ArrayBuffer(blob.bytes.clone())))
            }
            other => Err(method_not_found("Blob", other)),
        }
    }

    fn call_reader(&self, cell: &Arc<ReaderCell>, method: &str, args: &[HostValue]) -> Result<HostValue> {
        let kind = match method {
            "readAsArrayBuffer" => ReadKind::ArrayBuffer,
            "readAsBinaryString" => ReadKind::BinaryString,
            "readAsText" => ReadKind::Text(optional_string_arg(method, args, 1)?),
            "readAsDataURL" => ReadKind::DataUrl,
            "abort" => {
                let steps = cell.abort();
                cell.enqueue(&self.shared, steps)?;
                return Ok(HostValue::Null);
            }
            other => return Err(method_not_found("FileReader", other)),
        };

        let blob = self.blob_arg(method, args, 0)?;
        let steps = cell.begin_read(&blob, &kind, self.shared.config.chunk_size)?;
        trace!(method, size = blob.bytes.len(), "Read started");
        cell.enqueue(&self.shared, steps)?;
        Ok(HostValue::Null)
    }

    fn call_event(&self, event: &EventData, method: &str) -> Result<HostValue> {
        match method {
            "preventDefault" => {}
            "stopPropagation" => event.flags.stop_propagation.store(true, Ordering::Release),
            "stopImmediatePropagation" => {
                event.flags.stop_propagation.store(true, Ordering::Release);
                event.flags.stop_immediate.store(true, Ordering::Release);
            }
            other => return Err(method_not_found("ProgressEvent", other)),
        }
        Ok(HostValue::Null)
    }

    fn call_stream(&self, stream: &StreamData, method: &str) -> Result<HostValue> {
        match method {
            "read" => Ok(stream.next_chunk().into()),
            "cancel" => {
                stream.cancel();
                Ok(HostValue::Null)
            }
            other => Err(method_not_found("ReadableStream", other)),
        }
    }
}

#[async_trait]
impl HostBridge for MemoryHost {
    fn access_mode(&self) -> AccessMode {
        self.shared.config.access_mode
    }

    async fn invoke_global(&self, identifier: &str, args: Vec<HostValue>) -> Result<HostValue> {
        self.pause().await;
        match identifier {
            "import" => self.import(&args),
            "URL.createObjectURL" => self.create_object_url(&args),
            "URL.revokeObjectURL" => self.revoke_object_url(&args),
            other => Err(method_not_found("globalThis", other)),
        }
    }

    async fn invoke(&self, target: &HostRef, method: &str, args: Vec<HostValue>) -> Result<HostValue> {
        self.pause().await;
        let object = self.shared.objects.get(target)?;
        trace!(%target, kind = object.kind_name(), method, "Host call");
        match &object {
            HostObject::Module => self.call_helper(method, &args),
            HostObject::Blob(blob) => self.call_blob(blob, method, &args),
            HostObject::File(file) => self.call_blob(&file.blob, method, &args),
            HostObject::Reader(cell) => self.call_reader(cell, method, &args),
            HostObject::Event(event) => self.call_event(event, method),
            HostObject::Stream(stream) => self.call_stream(stream, method),
            other => Err(method_not_found(other.kind_name(), method)),
        }
    }

    async fn release(&self, target: &HostRef) -> Result<()> {
        self.pause().await;
        if let Some(object) = self.shared.objects.remove(target) {
            trace!(%target, kind = object.kind_name(), "Reference released");
        }
        Ok(())
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::remote()
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("config", &self.shared.config)
            .field("live_objects", &self.live_objects())
            .field("imports", &self.import_count())
            .finish()
    }
}

/// Parsed `BlobPropertyBag` / `FilePropertyBag`.
struct BagOptions {
    media_type: String,
    native_endings: bool,
    last_modified: Option<i64>,
}

impl BagOptions {
    fn parse(method: &str, value: Option<&HostValue>) -> Result<Self> {
        let empty = BTreeMap::new();
        let record = match value {
            None | Some(HostValue::Null) => &empty,
            Some(HostValue::Record(record)) => record,
            Some(other) => {
                return Err(invalid_argument(
                    method,
                    format!("options must be a record, got {}", other.kind_name()),
                ))
            }
        };

        let media_type = match record.get("type") {
            None | Some(HostValue::Null) => String::new(),
            Some(HostValue::String(media_type)) => media_type.clone(),
            Some(other) => {
                return Err(invalid_argument(method, format!("type must be a string, got {}", other.kind_name())))
            }
        };

        let native_endings = match record.get("endings").and_then(HostValue::as_str) {
            None | Some("transparent") => false,
            Some("native") => true,
            Some(other) => {
                return Err(BridgeError::dom(
                    "TypeError",
                    format!("'{}' is not a valid value for endings", other),
                ))
            }
        };

        let last_modified = match record.get("lastModified") {
            Some(HostValue::Number(millis)) if millis.is_finite() => Some(millis.trunc() as i64),
            _ => None,
        };

        Ok(Self {
            media_type,
            native_endings,
            last_modified,
        })
    }
}

/// Resolves a possibly negative offset against `size`, clamped to `[0, size]`.
fn relative_offset(value: Option<f64>, default: i64, size: i64) -> i64 {
    match value {
        None => default,
        Some(offset) => {
            let offset = offset.trunc() as i64;
            if offset < 0 {
                (size + offset).max(0)
            } else {
                offset.min(size)
            }
        }
    }
}

fn ensure_readable(blob: &BlobData) -> Result<()> {
    if blob.is_readable() {
        Ok(())
    } else {
        let error = DomErrorData::not_readable("The requested file could not be read");
        Err(BridgeError::dom(error.name, error.message))
    }
}

fn string_arg(method: &str, args: &[HostValue], index: usize) -> Result<String> {
    match args.get(index) {
        Some(HostValue::String(value)) => Ok(value.clone()),
        _ => Err(invalid_argument(method, format!("argument {} must be a string", index))),
    }
}

fn optional_string_arg(method: &str, args: &[HostValue], index: usize) -> Result<Option<String>> {
    match args.get(index) {
        None | Some(HostValue::Null) => Ok(None),
        Some(HostValue::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(invalid_argument(method, format!("argument {} must be a string", index))),
    }
}

fn number_arg(method: &str, args: &[HostValue], index: usize) -> Result<Option<f64>> {
    match args.get(index) {
        None | Some(HostValue::Null) => Ok(None),
        Some(HostValue::Number(value)) if value.is_finite() => Ok(Some(*value)),
        Some(_) => Err(invalid_argument(method, format!("argument {} must be a number", index))),
    }
}

fn invalid_argument(method: &str, message: impl Into<String>) -> BridgeError {
    BridgeError::InvalidArgument {
        method: method.to_string(),
        message: message.into(),
    }
}

fn method_not_found(target: &str, method: &str) -> BridgeError {
    BridgeError::MethodNotFound {
        target: target.to_string(),
        method: method.to_string(),
    }
}

fn no_attribute(kind: &str, name: &str) -> BridgeError {
    BridgeError::dom("TypeError", format!("{} has no attribute '{}'", kind, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{CallbackRef, CallbackToken, Clock, EventRelay};
    use mockall::mock;

    mock! {
        TestClock {}

        impl Clock for TestClock {
            fn now(&self) -> DateTime<Utc>;
        }
    }

    #[derive(Default)]
    struct RecordingRelay {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventRelay for RecordingRelay {
        async fn dispatch(&self, _token: CallbackToken, event_type: &str, _event: HostRef) -> Result<()> {
            self.events.lock().push(event_type.to_string());
            Ok(())
        }
    }

    async fn helper(host: &MemoryHost) -> HostRef {
        host.invoke_global("import", vec!["./_content/fileapi/fileapi.js".into()])
            .await
            .unwrap()
            .cast::<HostRef>()
            .unwrap()
    }

    async fn blob(host: &MemoryHost, module: &HostRef, parts: Vec<HostValue>, media_type: &str) -> HostRef {
        let mut options = BTreeMap::new();
        options.insert("type".to_string(), HostValue::from(media_type));
        host.invoke(
            module,
            "constructBlob",
            vec![HostValue::Array(parts), HostValue::Record(options)],
        )
        .await
        .unwrap()
        .cast::<HostRef>()
        .unwrap()
    }

    async fn attribute(host: &MemoryHost, module: &HostRef, target: &HostRef, name: &str) -> HostValue {
        host.invoke(module, "getAttribute", vec![(*target).into(), name.into()])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_construct_blob_concatenates_parts() {
        let host = MemoryHost::remote();
        let module = helper(&host).await;
        let inner = blob(&host, &module, vec!["cd".into()], "").await;
        let outer = blob(
            &host,
            &module,
            vec!["ab".into(), inner.into(), HostValue::from(vec![0x65u8])],
            "Text/Plain",
        )
        .await;

        assert_eq!(attribute(&host, &module, &outer, "size").await, HostValue::Number(5.0));
        assert_eq!(attribute(&host, &module, &outer, "type").await, HostValue::from("text/plain"));
        assert_eq!(
            host.invoke(&outer, "text", vec![]).await.unwrap(),
            HostValue::from("abcde")
        );
    }

    #[tokio::test]
    async fn test_native_endings_only_touch_text() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let mut options = BTreeMap::new();
        options.insert("endings".to_string(), HostValue::from("native"));
        let target = host
            .invoke(
                &module,
                "constructBlob",
                vec![
                    HostValue::Array(vec!["a\r\nb".into(), HostValue::from(b"\r\n".to_vec())]),
                    HostValue::Record(options),
                ],
            )
            .await
            .unwrap()
            .cast::<HostRef>()
            .unwrap();

        let expected = format!("a{}b\r\n", native_line_ending());
        assert_eq!(host.invoke(&target, "text", vec![]).await.unwrap(), HostValue::from(expected));
    }

    #[tokio::test]
    async fn test_invalid_endings_rejected() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let mut options = BTreeMap::new();
        options.insert("endings".to_string(), HostValue::from("unix"));

        let err = host
            .invoke(&module, "constructBlob", vec![HostValue::Array(vec![]), HostValue::Record(options)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TypeError"));
    }

    #[tokio::test]
    async fn test_slice_resolves_relative_offsets() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let source = blob(&host, &module, vec!["hello world".into()], "text/plain").await;

        let tail = host
            .invoke(&source, "slice", vec![HostValue::Number(-5.0), HostValue::Null, HostValue::Null])
            .await
            .unwrap()
            .cast::<HostRef>()
            .unwrap();
        assert_eq!(host.invoke(&tail, "text", vec![]).await.unwrap(), HostValue::from("world"));
        assert_eq!(attribute(&host, &module, &tail, "type").await, HostValue::from(""));

        let inverted = host
            .invoke(&source, "slice", vec![HostValue::Number(8.0), HostValue::Number(2.0), "X/Y".into()])
            .await
            .unwrap()
            .cast::<HostRef>()
            .unwrap();
        assert_eq!(attribute(&host, &module, &inverted, "size").await, HostValue::Number(0.0));
        assert_eq!(attribute(&host, &module, &inverted, "type").await, HostValue::from("x/y"));
    }

    #[tokio::test]
    async fn test_file_last_modified_defaults_to_clock() {
        let instant = DateTime::from_timestamp_millis(1_650_000_000_000).unwrap();
        let mut clock = MockTestClock::new();
        clock.expect_now().returning(move || instant);
        let host = MemoryHost::new(MemoryHostConfig::direct().with_clock(Arc::new(clock)));
        let module = helper(&host).await;

        let file = host
            .invoke(
                &module,
                "constructFile",
                vec![HostValue::Array(vec!["x".into()]), "a.txt".into(), HostValue::Null],
            )
            .await
            .unwrap()
            .cast::<HostRef>()
            .unwrap();

        assert_eq!(
            attribute(&host, &module, &file, "lastModified").await,
            HostValue::Number(1_650_000_000_000.0)
        );
        assert_eq!(attribute(&host, &module, &file, "name").await, HostValue::from("a.txt"));
    }

    #[tokio::test]
    async fn test_missing_attribute_throws() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let target = blob(&host, &module, vec![], "").await;

        let err = host
            .invoke(&module, "getAttribute", vec![target.into(), "name".into()])
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::dom("TypeError", "Blob has no attribute 'name'"));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let before = host.live_objects();

        host.release(&module).await.unwrap();
        host.release(&module).await.unwrap();

        assert_eq!(host.live_objects(), before - 1);
        assert_eq!(
            host.invoke(&module, "constructFileReader", vec![]).await.unwrap_err(),
            BridgeError::UnknownObject(module.id())
        );
    }

    #[tokio::test]
    async fn test_object_urls() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let target = blob(&host, &module, vec!["payload".into()], "").await;

        let url = host
            .invoke_global("URL.createObjectURL", vec![target.into()])
            .await
            .unwrap()
            .cast::<String>()
            .unwrap();
        assert!(url.starts_with(OBJECT_URL_PREFIX));
        assert_eq!(host.resolve_object_url(&url), Some(Bytes::from_static(b"payload")));

        host.invoke_global("URL.revokeObjectURL", vec![url.clone().into()])
            .await
            .unwrap();
        host.invoke_global("URL.revokeObjectURL", vec![url.clone().into()])
            .await
            .unwrap();
        assert_eq!(host.resolve_object_url(&url), None);
    }

    #[tokio::test]
    async fn test_reader_fires_events_in_order() {
        let host = MemoryHost::new(MemoryHostConfig::remote().with_chunk_size(4));
        let module = helper(&host).await;
        let source = blob(&host, &module, vec!["0123456789".into()], "").await;
        let reader = host
            .invoke(&module, "constructFileReader", vec![])
            .await
            .unwrap()
            .cast::<HostRef>()
            .unwrap();

        let relay = Arc::new(RecordingRelay::default());
        let callback = CallbackRef::new(CallbackToken::new(1), relay.clone());
        host.invoke(&module, "registerEventHandlers", vec![callback.into(), reader.into()])
            .await
            .unwrap();
        host.invoke(&reader, "readAsText", vec![source.into()]).await.unwrap();

        for _ in 0..100 {
            if relay.events.lock().last().map(String::as_str) == Some("loadend") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_eq!(
            *relay.events.lock(),
            vec!["loadstart", "progress", "progress", "progress", "load", "loadend"]
        );
        assert_eq!(
            attribute(&host, &module, &reader, "result").await,
            HostValue::from("0123456789")
        );
    }

    #[tokio::test]
    async fn test_invalidated_blob_is_not_readable() {
        let host = MemoryHost::direct();
        let module = helper(&host).await;
        let target = blob(&host, &module, vec!["x".into()], "").await;
        host.invalidate(&target).unwrap();

        let err = host.invoke(&target, "text", vec![]).await.unwrap_err();
        assert!(err.to_string().contains("NotReadableError"));
    }
}
