//! The host contract.
//!
//! A [`HostBridge`] is the only way managed code reaches host-resident
//! objects. It is deliberately string-keyed: methods and globals are named the
//! way the host names them (`"slice"`, `"readAsText"`, `"URL.createObjectURL"`),
//! and typed wrappers are layered on top by the consuming crate.
//!
//! Events travel the other way through an [`EventRelay`]. The host never holds
//! a managed object; it holds a [`CallbackRef`](crate::CallbackRef) and calls
//! [`EventRelay::dispatch`] with its token, awaiting each dispatch before
//! firing the next event for the same target.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    error::Result,
    platform::PlatformSendSync,
    value::{CallbackToken, HostRef, HostValue},
};

/// How calls through a handle complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Every call is a round trip; the caller suspends until the host answers.
    #[default]
    Remote,
    /// Caller and host share an execution context; synchronous host calls
    /// complete on first poll.
    Direct,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Remote => write!(f, "remote"),
            AccessMode::Direct => write!(f, "direct"),
        }
    }
}

/// Host-side surface consumed by the binding layer.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::{HostBridge, HostValue};
///
/// async fn blob_size(host: &dyn HostBridge, helper: HostRef, blob: HostRef) -> Result<u64> {
///     let size = host
///         .invoke(&helper, "getAttribute", vec![blob.into(), "size".into()])
///         .await?;
///     Ok(size.cast::<u64>()?)
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait HostBridge: PlatformSendSync {
    /// The access mode of every handle minted by this host.
    fn access_mode(&self) -> AccessMode;

    /// Invoke a global function by its dotted identifier (`"import"`,
    /// `"URL.createObjectURL"`).
    async fn invoke_global(&self, identifier: &str, args: Vec<HostValue>) -> Result<HostValue>;

    /// Invoke a method on a host object.
    async fn invoke(&self, target: &HostRef, method: &str, args: Vec<HostValue>) -> Result<HostValue>;

    /// Release the host's reference slot for `target`.
    ///
    /// Releasing an id the host no longer knows about is not an error.
    async fn release(&self, target: &HostRef) -> Result<()>;
}

/// Receives host-fired events on the managed side.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait EventRelay: PlatformSendSync {
    /// Deliver one event fired on the object registered under `token`.
    ///
    /// `event` is a fresh host reference the relay takes ownership of.
    async fn dispatch(&self, token: CallbackToken, event_type: &str, event: HostRef) -> Result<()>;
}
