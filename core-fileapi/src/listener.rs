//! Managed event listeners and their fan-out.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::{PlatformBoxFuture, PlatformSend, PlatformSendSync};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::warn;

use crate::progress_event::{ProgressEvent, ProgressEventKind};

#[cfg(not(target_arch = "wasm32"))]
type ListenerFn = dyn Fn(ProgressEvent) -> PlatformBoxFuture<'static, anyhow::Result<()>> + Send + Sync;

#[cfg(target_arch = "wasm32")]
type ListenerFn = dyn Fn(ProgressEvent) -> PlatformBoxFuture<'static, anyhow::Result<()>>;

/// An async callback for reader events.
///
/// Identity is the callback allocation: clones of one listener are the same
/// listener for [`FileReader::remove_event_listener`](crate::FileReader::remove_event_listener).
#[derive(Clone)]
pub struct EventListener {
    callback: Arc<ListenerFn>,
}

impl EventListener {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(ProgressEvent) -> Fut + PlatformSendSync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + PlatformSend + 'static,
    {
        let callback: Arc<ListenerFn> = Arc::new(
            move |event: ProgressEvent| -> PlatformBoxFuture<'static, anyhow::Result<()>> {
                Box::pin(callback(event))
            },
        );
        Self { callback }
    }

    /// A listener that does its work synchronously.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(&ProgressEvent) -> anyhow::Result<()> + PlatformSendSync + 'static,
    {
        Self::new(move |event: ProgressEvent| std::future::ready(callback(&event)))
    }

    pub fn same_as(&self, other: &EventListener) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.callback) as *const (),
            Arc::as_ptr(&other.callback) as *const (),
        )
    }

    fn call(&self, event: ProgressEvent) -> PlatformBoxFuture<'static, anyhow::Result<()>> {
        (self.callback)(event)
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish()
    }
}

struct Registration {
    listener: EventListener,
    removed: Arc<AtomicBool>,
    handler_slot: bool,
}

impl Registration {
    fn new(listener: EventListener, handler_slot: bool) -> Self {
        Self {
            listener,
            removed: Arc::new(AtomicBool::new(false)),
            handler_slot,
        }
    }

    fn retire(&self) {
        self.removed.store(true, Ordering::Release);
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
    pub stopped: bool,
}

/// Listeners per event kind, in registration order.
///
/// A kind's list holds plain listeners plus at most one handler slot (the
/// `onload`-style property). Replacing the slot keeps its position, so a
/// listener never fires twice for one event.
#[derive(Default)]
pub(crate) struct ListenerTable {
    entries: Mutex<HashMap<ProgressEventKind, Vec<Registration>>>,
}

impl ListenerTable {
    /// Appends `listener`. Adding the same listener twice is a no-op.
    pub(crate) fn add(&self, kind: ProgressEventKind, listener: EventListener) -> bool {
        let mut entries = self.entries.lock();
        let list = entries.entry(kind).or_default();
        if list
            .iter()
            .any(|r| !r.handler_slot && r.listener.same_as(&listener))
        {
            return false;
        }
        list.push(Registration::new(listener, false));
        true
    }

    pub(crate) fn remove(&self, kind: ProgressEventKind, listener: &EventListener) -> bool {
        let mut entries = self.entries.lock();
        let Some(list) = entries.get_mut(&kind) else {
            return false;
        };
        let Some(index) = list
            .iter()
            .position(|r| !r.handler_slot && r.listener.same_as(listener))
        else {
            return false;
        };
        list.remove(index).retire();
        true
    }

    /// Sets, replaces or clears the handler slot for `kind`.
    pub(crate) fn set_handler(&self, kind: ProgressEventKind, listener: Option<EventListener>) {
        let mut entries = self.entries.lock();
        let list = entries.entry(kind).or_default();
        let existing = list.iter().position(|r| r.handler_slot);

        match (existing, listener) {
            (Some(index), Some(listener)) => {
                let old = std::mem::replace(&mut list[index], Registration::new(listener, true));
                old.retire();
            }
            (Some(index), None) => list.remove(index).retire(),
            (None, Some(listener)) => list.push(Registration::new(listener, true)),
            (None, None) => {}
        }
    }

    pub(crate) fn handler(&self, kind: ProgressEventKind) -> Option<EventListener> {
        self.entries
            .lock()
            .get(&kind)
            .and_then(|list| list.iter().find(|r| r.handler_slot))
            .map(|r| r.listener.clone())
    }

    pub(crate) fn count(&self, kind: ProgressEventKind) -> usize {
        self.entries.lock().get(&kind).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&self) {
        let mut entries = self.entries.lock();
        for registration in entries.drain().flat_map(|(_, list)| list) {
            registration.retire();
        }
    }

    fn snapshot(&self, kind: ProgressEventKind) -> Vec<(EventListener, Arc<AtomicBool>)> {
        self.entries
            .lock()
            .get(&kind)
            .map(|list| {
                list.iter()
                    .map(|r| (r.listener.clone(), Arc::clone(&r.removed)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Invokes the listeners registered for the event's kind, sequentially.
    ///
    /// The list is captured up front: listeners added during dispatch wait for
    /// the next event, listeners removed during dispatch are skipped. A failing
    /// or panicking listener is logged and does not affect the others.
    pub(crate) async fn dispatch(&self, event: &ProgressEvent) -> DispatchReport {
        let kind = event.kind();
        let mut report = DispatchReport::default();

        for (listener, removed) in self.snapshot(kind) {
            if removed.load(Ordering::Acquire) {
                continue;
            }

            report.invoked += 1;
            let invocation = async { listener.call(event.clone()).await };
            match AssertUnwindSafe(invocation).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(event = %kind, error = %err, "Event listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(event = %kind, "Event listener panicked");
                }
            }

            if event.is_immediate_propagation_stopped() {
                report.stopped = true;
                break;
            }
        }

        report
    }
}
