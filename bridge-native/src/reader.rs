//! FileReader state machine and in-order event dispatch.
//!
//! Reads are computed eagerly into a queue of steps. One dispatcher task per
//! reader drains the queue, applies state changes and awaits every relay
//! callback before moving on, so listeners see events in firing order.
//! Steps tagged with a read generation are dropped once `abort()` or a new
//! read has moved the reader past that generation.

use std::fmt;
use std::sync::{Arc, Weak};

use bridge_traits::{BridgeError, CallbackRef};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::encoding::{binary_string, data_url, decode_text};
use crate::host::HostShared;
use crate::objects::{BlobData, DomErrorData, EventData, HostObject};

pub(crate) const EMPTY: u16 = 0;
pub(crate) const LOADING: u16 = 1;
pub(crate) const DONE: u16 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum ReaderResult {
    #[default]
    Empty,
    Text(String),
    Buffer(Bytes),
}

/// What a `readAs*` call produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadKind {
    ArrayBuffer,
    BinaryString,
    Text(Option<String>),
    DataUrl,
}

impl ReadKind {
    fn produce(&self, blob: &BlobData) -> ReaderResult {
        match self {
            ReadKind::ArrayBuffer => ReaderResult::Buffer(blob.bytes.clone()),
            ReadKind::BinaryString => ReaderResult::Text(binary_string(&blob.bytes)),
            ReadKind::Text(label) => ReaderResult::Text(decode_text(&blob.bytes, label.as_deref())),
            ReadKind::DataUrl => ReaderResult::Text(data_url(&blob.media_type, &blob.bytes)),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Fire {
        event_type: &'static str,
        loaded: u64,
        total: u64,
    },
    Complete(ReaderResult),
    Fail(DomErrorData),
}

#[derive(Debug, Clone)]
pub(crate) struct QueuedStep {
    /// `None` for steps that survive an abort.
    generation: Option<u64>,
    step: Step,
}

impl QueuedStep {
    fn always(step: Step) -> Self {
        Self {
            generation: None,
            step,
        }
    }

    fn gated(generation: u64, step: Step) -> Self {
        Self {
            generation: Some(generation),
            step,
        }
    }
}

fn fire(event_type: &'static str, loaded: u64, total: u64) -> Step {
    Step::Fire {
        event_type,
        loaded,
        total,
    }
}

#[derive(Debug)]
struct ReaderState {
    ready_state: u16,
    result: ReaderResult,
    error: Option<DomErrorData>,
    generation: u64,
    loaded: u64,
    total: u64,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self {
            ready_state: EMPTY,
            result: ReaderResult::Empty,
            error: None,
            generation: 0,
            loaded: 0,
            total: 0,
        }
    }
}

/// The event to fire after a step was applied.
struct Firing {
    event_type: &'static str,
    loaded: u64,
    total: u64,
}

/// Shared state of one host reader, reachable from every alias.
#[derive(Default)]
pub(crate) struct ReaderCell {
    state: Mutex<ReaderState>,
    callbacks: Mutex<Vec<CallbackRef>>,
    queue: Mutex<Option<mpsc::UnboundedSender<QueuedStep>>>,
}

impl ReaderCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_state(&self) -> u16 {
        self.state.lock().ready_state
    }

    pub fn result(&self) -> ReaderResult {
        self.state.lock().result.clone()
    }

    pub fn error(&self) -> Option<DomErrorData> {
        self.state.lock().error.clone()
    }

    pub fn add_callback(&self, callback: CallbackRef) {
        self.callbacks.lock().push(callback);
    }

    fn callbacks(&self) -> Vec<CallbackRef> {
        self.callbacks.lock().clone()
    }

    /// Moves to LOADING and plans the events of the read.
    pub fn begin_read(
        &self,
        blob: &BlobData,
        kind: &ReadKind,
        chunk_size: usize,
    ) -> Result<Vec<QueuedStep>, BridgeError> {
        let mut state = self.state.lock();
        if state.ready_state == LOADING {
            return Err(BridgeError::dom(
                "InvalidStateError",
                "A read is already in progress on this FileReader",
            ));
        }

        let total = blob.bytes.len() as u64;
        state.ready_state = LOADING;
        state.result = ReaderResult::Empty;
        state.error = None;
        state.generation += 1;
        state.loaded = 0;
        state.total = total;
        let generation = state.generation;

        let mut steps = vec![QueuedStep::always(fire("loadstart", 0, total))];

        if !blob.is_readable() {
            steps.push(QueuedStep::gated(
                generation,
                Step::Fail(DomErrorData::not_readable(
                    "The requested file could not be read",
                )),
            ));
            steps.push(QueuedStep::gated(generation, fire("error", 0, total)));
            steps.push(QueuedStep::gated(generation, fire("loadend", 0, total)));
            return Ok(steps);
        }

        let chunk_size = chunk_size.max(1);
        let mut loaded = 0usize;
        while loaded < blob.bytes.len() {
            loaded = (loaded + chunk_size).min(blob.bytes.len());
            steps.push(QueuedStep::gated(
                generation,
                fire("progress", loaded as u64, total),
            ));
        }
        steps.push(QueuedStep::gated(generation, Step::Complete(kind.produce(blob))));
        steps.push(QueuedStep::gated(generation, fire("load", total, total)));
        steps.push(QueuedStep::gated(generation, fire("loadend", total, total)));
        Ok(steps)
    }

    /// Cancels a read in progress. Outside LOADING only the result is cleared.
    pub fn abort(&self) -> Vec<QueuedStep> {
        let mut state = self.state.lock();
        state.result = ReaderResult::Empty;
        if state.ready_state != LOADING {
            return Vec::new();
        }

        state.ready_state = DONE;
        state.generation += 1;
        let (loaded, total) = (state.loaded, state.total);
        vec![
            QueuedStep::always(fire("abort", loaded, total)),
            QueuedStep::always(fire("loadend", loaded, total)),
        ]
    }

    fn apply(&self, queued: QueuedStep) -> Option<Firing> {
        let mut state = self.state.lock();
        if queued
            .generation
            .is_some_and(|generation| generation != state.generation)
        {
            return None;
        }

        match queued.step {
            Step::Fire {
                event_type,
                loaded,
                total,
            } => {
                if event_type == "progress" {
                    state.loaded = loaded;
                }
                Some(Firing {
                    event_type,
                    loaded,
                    total,
                })
            }
            Step::Complete(result) => {
                state.ready_state = DONE;
                state.result = result;
                state.loaded = state.total;
                None
            }
            Step::Fail(error) => {
                state.ready_state = DONE;
                state.result = ReaderResult::Empty;
                state.error = Some(error);
                None
            }
        }
    }

    /// Hands `steps` to this reader's dispatcher, starting it on first use.
    pub fn enqueue(self: &Arc<Self>, host: &Arc<HostShared>, steps: Vec<QueuedStep>) -> Result<(), BridgeError> {
        if steps.is_empty() {
            return Ok(());
        }

        let mut queue = self.queue.lock();
        if queue.is_none() {
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                BridgeError::NotAvailable("FileReader events need a Tokio runtime".to_string())
            })?;
            let (sender, receiver) = mpsc::unbounded_channel();
            runtime.spawn(run_dispatcher(
                Arc::downgrade(host),
                Arc::downgrade(self),
                receiver,
            ));
            *queue = Some(sender);
        }

        if let Some(sender) = queue.as_ref() {
            for step in steps {
                if sender.send(step).is_err() {
                    warn!("Reader dispatcher has stopped; dropping queued events");
                    break;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ReaderCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderCell")
            .field("state", &*self.state.lock())
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}

async fn run_dispatcher(
    host: Weak<HostShared>,
    reader: Weak<ReaderCell>,
    mut queue: mpsc::UnboundedReceiver<QueuedStep>,
) {
    while let Some(queued) = queue.recv().await {
        let (Some(host), Some(cell)) = (host.upgrade(), reader.upgrade()) else {
            break;
        };
        let Some(firing) = cell.apply(queued) else {
            continue;
        };

        for callback in cell.callbacks() {
            let event = host.objects.insert(HostObject::Event(EventData {
                event_type: firing.event_type,
                length_computable: true,
                loaded: firing.loaded,
                total: firing.total,
                time_stamp: host.elapsed_millis(),
                target: Arc::clone(&cell),
                flags: Default::default(),
            }));
            trace!(token = %callback.token, event_type = firing.event_type, %event, "Firing reader event");
            if let Err(err) = callback
                .relay
                .dispatch(callback.token, firing.event_type, event)
                .await
            {
                warn!(token = %callback.token, error = %err, "Event relay failed");
            }
        }

        if host.config.simulate_latency {
            tokio::task::yield_now().await;
        }
    }
    debug!("Reader dispatcher stopped");
}
