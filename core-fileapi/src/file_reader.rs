//! # FileReader
//!
//! Asynchronous reads of blob content with host-fired progress events.
//!
//! ## Event bridging
//!
//! Creating a reader registers a [`CallbackToken`] with the context's relay and
//! asks the helper module to wire all six reader events to it before the
//! constructor returns. The host then calls back for every event it fires:
//!
//! ```text
//! host reader ──(token, "progress", event ref)──> CallbackRegistry
//!                                                    │
//!                                  ReaderShared::deliver (awaited by the host)
//!                                                    │
//!                      listeners in registration order, then subscribers
//! ```
//!
//! The host awaits each delivery before firing the next event, so listeners
//! observe events in the order they were fired.
//!
//! ## Usage
//!
//! ```ignore
//! let reader = FileReader::new(&api).await?;
//! reader.add_event_listener(
//!     ProgressEventKind::Load,
//!     EventListener::sync(|_| Ok(())),
//! );
//! let mut events = reader.subscribe();
//! reader.read_as_text(&blob, None).await?;
//! events.until(ProgressEventKind::LoadEnd).await?;
//! let text = reader.result_as_string().await?;
//! ```

use std::fmt;
use std::sync::Arc;

use bridge_traits::{CallbackRef, CallbackToken, EventRelay, HostRef, HostValue};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, Receiver};
use tracing::{debug, debug_span, warn, Instrument};

use crate::api::FileApi;
use crate::blob::Blob;
use crate::error::{FileApiError, Result};
use crate::exception::DomException;
use crate::listener::{EventListener, ListenerTable};
use crate::progress_event::{ProgressEvent, ProgressEventKind, ProgressSnapshot};
use crate::reference::{CreationOptions, JsReference, WrapperBase, WrapperId};

/// Buffered snapshots per [`ReaderEventStream`] before it lags.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// `readyState` of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum ReadyState {
    Empty = 0,
    Loading = 1,
    Done = 2,
}

impl TryFrom<u16> for ReadyState {
    type Error = FileApiError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(ReadyState::Empty),
            1 => Ok(ReadyState::Loading),
            2 => Ok(ReadyState::Done),
            other => Err(FileApiError::UnknownReadyState(other)),
        }
    }
}

/// Shape of a reader's current result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultType {
    /// Produced by `read_as_array_buffer`.
    ArrayBuffer,
    /// Produced by the text, binary string and data URL reads.
    Text,
}

/// A delivered event, detached from its host handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderEvent {
    pub kind: ProgressEventKind,
    pub length_computable: bool,
    pub loaded: u64,
    pub total: u64,
}

impl ReaderEvent {
    fn new(kind: ProgressEventKind, snapshot: ProgressSnapshot) -> Self {
        Self {
            kind,
            length_computable: snapshot.length_computable,
            loaded: snapshot.loaded,
            total: snapshot.total,
        }
    }
}

type ReaderEventFilter = Box<dyn Fn(&ReaderEvent) -> bool + Send + Sync>;

/// Receives [`ReaderEvent`]s after the listeners for each event have run.
pub struct ReaderEventStream {
    receiver: Receiver<ReaderEvent>,
    filter: Option<ReaderEventFilter>,
}

impl ReaderEventStream {
    pub fn new(receiver: Receiver<ReaderEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ReaderEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next matching event.
    ///
    /// Falling behind drops the oldest events and is logged; the stream
    /// carries on from the oldest event still buffered.
    ///
    /// # Errors
    ///
    /// `RecvError::Closed` once the reader is gone.
    pub async fn recv(&mut self) -> std::result::Result<ReaderEvent, RecvError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Reader event stream lagged");
                }
                Err(RecvError::Closed) => return Err(RecvError::Closed),
            }
        }
    }

    /// Receives events until one of `kind` arrives.
    pub async fn until(&mut self, kind: ProgressEventKind) -> std::result::Result<ReaderEvent, RecvError> {
        loop {
            let event = self.recv().await?;
            if event.kind == kind {
                return Ok(event);
            }
        }
    }

    /// The next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<std::result::Result<ReaderEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &ReaderEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for ReaderEventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderEventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

/// Reader state reachable from the relay.
pub(crate) struct ReaderShared {
    api: FileApi,
    id: WrapperId,
    listeners: ListenerTable,
    events: broadcast::Sender<ReaderEvent>,
}

impl ReaderShared {
    fn new(api: FileApi, id: WrapperId) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER_SIZE);
        Self {
            api,
            id,
            listeners: ListenerTable::default(),
            events,
        }
    }

    /// Runs the listeners for one host event, releases the event handle and
    /// then publishes its snapshot.
    pub(crate) async fn deliver(&self, kind: ProgressEventKind, event: HostRef) {
        let span = debug_span!("reader_event", reader = %self.id, event = %kind);
        async move {
            let event =
                ProgressEvent::from_reference(&self.api, event, kind, CreationOptions::owned());
            let report = self.listeners.dispatch(&event).await;
            debug!(
                invoked = report.invoked,
                failed = report.failed,
                stopped = report.stopped,
                "Dispatched reader event"
            );

            let snapshot = if self.events.receiver_count() > 0 {
                match event.snapshot().await {
                    Ok(snapshot) => Some(snapshot),
                    Err(err) => {
                        warn!(error = %err, "Failed to snapshot reader event");
                        None
                    }
                }
            } else {
                None
            };

            if let Err(err) = event.dispose().await {
                warn!(error = %err, "Failed to release reader event");
            }

            if let Some(snapshot) = snapshot {
                // No receivers left is fine.
                let _ = self.events.send(ReaderEvent::new(kind, snapshot));
            }
        }
        .instrument(span)
        .await
    }
}

/// A host `FileReader`.
///
/// Clones share the listener lists and the host reader.
#[derive(Clone)]
pub struct FileReader {
    base: WrapperBase,
    shared: Arc<ReaderShared>,
    token: CallbackToken,
}

impl FileReader {
    /// Creates a reader with its events wired to this wrapper.
    ///
    /// Event wiring completes before this returns, so no event of a read
    /// started afterwards can be missed.
    pub async fn new(api: &FileApi) -> Result<FileReader> {
        let id = WrapperId::next();
        let helper = api.helper_for(id).await?;
        let host_ref = helper.construct_file_reader().await?;
        Self::attach(WrapperBase::new(api, id, host_ref, true)).await
    }

    /// Wraps an existing host reader and wires its events to the wrapper.
    pub async fn from_reference(
        api: &FileApi,
        host_ref: HostRef,
        options: CreationOptions,
    ) -> Result<FileReader> {
        Self::attach(WrapperBase::adopt(api, host_ref, options)).await
    }

    async fn attach(base: WrapperBase) -> Result<FileReader> {
        let shared = Arc::new(ReaderShared::new(base.api.clone(), base.id));
        let registry = Arc::clone(base.api.callbacks());
        let token = registry.register(&shared);
        let relay: Arc<dyn EventRelay> = registry.clone();

        let wired = match base.helper().await {
            Ok(helper) => {
                helper
                    .register_event_handlers(CallbackRef::new(token, relay), &base.handle)
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = wired {
            registry.revoke(token);
            if let Err(dispose_err) = base.dispose().await {
                warn!(error = %dispose_err, "Failed to release reader after wiring error");
            }
            return Err(err);
        }

        debug!(reader = %base.id, %token, "File reader events wired");
        Ok(FileReader {
            base,
            shared,
            token,
        })
    }

    pub fn reference(&self) -> &JsReference {
        &self.base.handle
    }

    pub fn id(&self) -> WrapperId {
        self.base.id
    }

    pub fn callback_token(&self) -> CallbackToken {
        self.token
    }

    pub async fn read_as_array_buffer(&self, blob: &Blob) -> Result<()> {
        self.start_read("readAsArrayBuffer", blob, None).await
    }

    pub async fn read_as_binary_string(&self, blob: &Blob) -> Result<()> {
        self.start_read("readAsBinaryString", blob, None).await
    }

    /// Reads `blob` as text in `encoding` (UTF-8 when `None`).
    pub async fn read_as_text(&self, blob: &Blob, encoding: Option<&str>) -> Result<()> {
        self.start_read("readAsText", blob, encoding.map(HostValue::from))
            .await
    }

    pub async fn read_as_data_url(&self, blob: &Blob) -> Result<()> {
        self.start_read("readAsDataURL", blob, None).await
    }

    async fn start_read(&self, method: &str, blob: &Blob, extra: Option<HostValue>) -> Result<()> {
        let blob = blob.reference().ensure_live()?;
        let mut args = vec![HostValue::Object(blob)];
        args.extend(extra);
        debug!(reader = %self.base.id, %blob, method, "Starting read");
        self.base.handle.invoke(method, args).await
    }

    /// Aborts a read in progress.
    pub async fn abort(&self) -> Result<()> {
        self.base.handle.invoke("abort", vec![]).await
    }

    pub async fn ready_state(&self) -> Result<ReadyState> {
        let code: u16 = self.base.attribute("readyState").await?;
        ReadyState::try_from(code)
    }

    pub fn ready_state_now(&self) -> Result<ReadyState> {
        self.base.handle.run_direct("readyState", self.ready_state())
    }

    /// The shape of the current result, `None` when there is none.
    pub async fn result_type(&self) -> Result<Option<ResultType>> {
        let value: HostValue = self.base.attribute("result").await?;
        if value.is_null() {
            return Ok(None);
        }
        self.release_result(&value).await?;

        let helper = self.base.helper().await?;
        Ok(Some(if helper.is_array_buffer(&self.base.handle).await? {
            ResultType::ArrayBuffer
        } else {
            ResultType::Text
        }))
    }

    /// The result if it is a string, `None` otherwise.
    pub async fn result_as_string(&self) -> Result<Option<String>> {
        let value: HostValue = self.base.attribute("result").await?;
        match value {
            HostValue::String(text) => Ok(Some(text)),
            other => {
                self.release_result(&other).await?;
                Ok(None)
            }
        }
    }

    pub fn result_as_string_now(&self) -> Result<Option<String>> {
        self.base.handle.run_direct("result", self.result_as_string())
    }

    /// The result if it is an array buffer, `None` otherwise.
    pub async fn result_as_byte_array(&self) -> Result<Option<Bytes>> {
        let value: HostValue = self.base.attribute("result").await?;
        match value {
            HostValue::Object(buffer) => {
                let buffer = JsReference::new(Arc::clone(self.base.api.bridge()), buffer, true);
                let bytes = match self.base.helper().await {
                    Ok(helper) => helper.array_buffer(&buffer).await,
                    Err(err) => Err(err),
                };
                buffer.dispose().await?;
                bytes.map(Some)
            }
            HostValue::Bytes(bytes) => Ok(Some(bytes)),
            _ => Ok(None),
        }
    }

    /// The error of the last failed read.
    pub async fn error(&self) -> Result<Option<DomException>> {
        let error: Option<HostRef> = self.base.attribute("error").await?;
        Ok(error.map(|host_ref| {
            DomException::from_reference(&self.base.api, host_ref, CreationOptions::owned())
        }))
    }

    async fn release_result(&self, value: &HostValue) -> Result<()> {
        if let Some(host_ref) = value.as_object() {
            self.base.api.bridge().release(&host_ref).await?;
        }
        Ok(())
    }

    /// Adds `listener` for `kind`. Returns `false` if it was already added.
    pub fn add_event_listener(&self, kind: ProgressEventKind, listener: EventListener) -> bool {
        self.shared.listeners.add(kind, listener)
    }

    /// Removes `listener`. Removing a listener that is not registered is a
    /// no-op.
    pub fn remove_event_listener(&self, kind: ProgressEventKind, listener: &EventListener) -> bool {
        self.shared.listeners.remove(kind, listener)
    }

    /// Sets the single `on<kind>` handler, replacing any previous one in
    /// place. `None` clears it.
    pub fn set_event_handler(&self, kind: ProgressEventKind, listener: Option<EventListener>) {
        self.shared.listeners.set_handler(kind, listener)
    }

    pub fn event_handler(&self, kind: ProgressEventKind) -> Option<EventListener> {
        self.shared.listeners.handler(kind)
    }

    pub fn listener_count(&self, kind: ProgressEventKind) -> usize {
        self.shared.listeners.count(kind)
    }

    /// A stream of every event delivered from now on.
    pub fn subscribe(&self) -> ReaderEventStream {
        ReaderEventStream::new(self.shared.events.subscribe())
    }

    /// Stops event relay, drops all listeners and releases the host reader.
    pub async fn dispose(&self) -> Result<()> {
        if self.base.api.callbacks().revoke(self.token) {
            debug!(reader = %self.base.id, token = %self.token, "File reader callback revoked");
        }
        self.shared.listeners.clear();
        self.base.dispose().await
    }
}

impl fmt::Debug for FileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("id", &self.base.id)
            .field("handle", &self.base.handle)
            .field("token", &self.token)
            .finish()
    }
}
