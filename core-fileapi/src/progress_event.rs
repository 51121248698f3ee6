//! Progress events fired by a [`FileReader`](crate::FileReader).

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::HostRef;
use serde::Serialize;

use crate::api::FileApi;
use crate::error::Result;
use crate::reference::{CreationOptions, JsReference, WrapperBase};

/// The six reader events, in the order a successful read fires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressEventKind {
    LoadStart,
    Progress,
    Load,
    Abort,
    Error,
    LoadEnd,
}

impl ProgressEventKind {
    pub const ALL: [ProgressEventKind; 6] = [
        ProgressEventKind::LoadStart,
        ProgressEventKind::Progress,
        ProgressEventKind::Load,
        ProgressEventKind::Abort,
        ProgressEventKind::Error,
        ProgressEventKind::LoadEnd,
    ];

    /// The host's event type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressEventKind::LoadStart => "loadstart",
            ProgressEventKind::Progress => "progress",
            ProgressEventKind::Load => "load",
            ProgressEventKind::Abort => "abort",
            ProgressEventKind::Error => "error",
            ProgressEventKind::LoadEnd => "loadend",
        }
    }
}

impl fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised event type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown progress event type '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for ProgressEventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ProgressEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Dispatch phase of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EventPhase {
    None = 0,
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

impl EventPhase {
    fn from_code(code: u16) -> Self {
        match code {
            1 => EventPhase::Capturing,
            2 => EventPhase::AtTarget,
            3 => EventPhase::Bubbling,
            _ => EventPhase::None,
        }
    }
}

/// The progress counters of an event, read in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub length_computable: bool,
    pub loaded: u64,
    pub total: u64,
}

/// A host `ProgressEvent`.
///
/// Listeners receive clones sharing one handle; the relay disposes it once
/// every listener has returned.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    base: WrapperBase,
    kind: ProgressEventKind,
    immediate_stop: Arc<AtomicBool>,
}

impl ProgressEvent {
    pub fn from_reference(
        api: &FileApi,
        host_ref: HostRef,
        kind: ProgressEventKind,
        options: CreationOptions,
    ) -> Self {
        Self {
            base: WrapperBase::adopt(api, host_ref, options),
            kind,
            immediate_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> ProgressEventKind {
        self.kind
    }

    pub fn reference(&self) -> &JsReference {
        &self.base.handle
    }

    pub async fn length_computable(&self) -> Result<bool> {
        self.base.attribute("lengthComputable").await
    }

    /// Bytes processed so far.
    pub async fn loaded(&self) -> Result<u64> {
        self.base.attribute("loaded").await
    }

    /// Bytes to process in total, 0 when unknown.
    pub async fn total(&self) -> Result<u64> {
        self.base.attribute("total").await
    }

    pub async fn snapshot(&self) -> Result<ProgressSnapshot> {
        Ok(ProgressSnapshot {
            length_computable: self.length_computable().await?,
            loaded: self.loaded().await?,
            total: self.total().await?,
        })
    }

    /// [`ProgressEvent::snapshot`] without suspending. Direct-mode handles only.
    pub fn snapshot_now(&self) -> Result<ProgressSnapshot> {
        self.base.handle.run_direct("snapshot", self.snapshot())
    }

    /// The event type as the host reports it.
    pub async fn event_type(&self) -> Result<String> {
        self.base.attribute("type").await
    }

    pub async fn event_phase(&self) -> Result<EventPhase> {
        let code: u16 = self.base.attribute("eventPhase").await?;
        Ok(EventPhase::from_code(code))
    }

    pub async fn bubbles(&self) -> Result<bool> {
        self.base.attribute("bubbles").await
    }

    pub async fn cancelable(&self) -> Result<bool> {
        self.base.attribute("cancelable").await
    }

    pub async fn default_prevented(&self) -> Result<bool> {
        self.base.attribute("defaultPrevented").await
    }

    pub async fn is_trusted(&self) -> Result<bool> {
        self.base.attribute("isTrusted").await
    }

    /// Milliseconds since the host's time origin.
    pub async fn time_stamp(&self) -> Result<f64> {
        self.base.attribute("timeStamp").await
    }

    /// The object the event fired on. The returned handle is owned by the
    /// caller.
    pub async fn target(&self) -> Result<Option<JsReference>> {
        let target: Option<HostRef> = self.base.attribute("target").await?;
        let bridge = self.base.api.bridge();
        Ok(target.map(|host_ref| JsReference::new(Arc::clone(bridge), host_ref, true)))
    }

    pub async fn prevent_default(&self) -> Result<()> {
        self.base.handle.invoke("preventDefault", vec![]).await
    }

    pub async fn stop_propagation(&self) -> Result<()> {
        self.base.handle.invoke("stopPropagation", vec![]).await
    }

    /// Stops the host's propagation and skips every remaining managed
    /// listener for this dispatch.
    pub async fn stop_immediate_propagation(&self) -> Result<()> {
        self.immediate_stop.store(true, Ordering::Release);
        self.base
            .handle
            .invoke("stopImmediatePropagation", vec![])
            .await
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_stop.load(Ordering::Acquire)
    }

    pub async fn dispose(&self) -> Result<()> {
        self.base.dispose().await
    }
}
