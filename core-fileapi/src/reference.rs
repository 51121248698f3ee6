//! Handles to host-resident objects.
//!
//! A [`JsReference`] pairs a [`HostRef`] with the bridge that minted it. Clones
//! share one disposal flag, so disposing any owning clone releases the host
//! slot exactly once and every other clone starts failing with
//! [`FileApiError::Disposed`].

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::{AccessMode, FromHostValue, HostBridge, HostRef, HostValue};
use futures::FutureExt;
use tracing::{debug, trace};

use crate::api::FileApi;
use crate::error::{FileApiError, Result};
use crate::helper::HelperModule;

static NEXT_WRAPPER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one wrapper instance, used to decide who owns the helper module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrapperId(u64);

impl WrapperId {
    /// Requester id that never owns the helper module.
    pub(crate) const DETACHED: WrapperId = WrapperId(0);

    pub(crate) fn next() -> Self {
        WrapperId(NEXT_WRAPPER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WrapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrapper#{}", self.0)
    }
}

/// Options for wrapping an existing host reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreationOptions {
    /// Release the host reference when the wrapper is disposed.
    pub disposes_reference: bool,
}

impl CreationOptions {
    /// The wrapper takes over the reference and releases it on dispose.
    pub fn owned() -> Self {
        Self {
            disposes_reference: true,
        }
    }

    /// The wrapper borrows the reference; the caller keeps releasing it.
    pub fn borrowed() -> Self {
        Self {
            disposes_reference: false,
        }
    }
}

struct HandleState {
    host_ref: HostRef,
    disposed: AtomicBool,
}

/// Opaque handle to a host object.
#[derive(Clone)]
pub struct JsReference {
    state: Arc<HandleState>,
    bridge: Arc<dyn HostBridge>,
    owns: bool,
}

impl JsReference {
    /// Wraps `host_ref`. An owning handle releases the host slot on dispose.
    pub fn new(bridge: Arc<dyn HostBridge>, host_ref: HostRef, owns: bool) -> Self {
        Self {
            state: Arc::new(HandleState {
                host_ref,
                disposed: AtomicBool::new(false),
            }),
            bridge,
            owns,
        }
    }

    pub fn host_ref(&self) -> HostRef {
        self.state.host_ref
    }

    pub fn access_mode(&self) -> AccessMode {
        self.bridge.access_mode()
    }

    pub fn owns_reference(&self) -> bool {
        self.owns
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::Acquire)
    }

    /// A non-owning view of the same host object.
    ///
    /// Disposing the view is a no-op, but it still observes disposal of the
    /// owner.
    pub fn share(&self) -> JsReference {
        JsReference {
            state: Arc::clone(&self.state),
            bridge: Arc::clone(&self.bridge),
            owns: false,
        }
    }

    /// The host ref, or [`FileApiError::Disposed`] once disposed.
    pub fn ensure_live(&self) -> Result<HostRef> {
        if self.is_disposed() {
            return Err(FileApiError::Disposed(self.host_ref()));
        }
        Ok(self.host_ref())
    }

    /// Invokes `method` on the referenced object and converts the answer.
    pub async fn invoke<T: FromHostValue>(&self, method: &str, args: Vec<HostValue>) -> Result<T> {
        let target = self.ensure_live()?;
        trace!(%target, method, "Invoking host method");
        let value = self.bridge.invoke(&target, method, args).await?;
        value
            .cast::<T>()
            .map_err(|e| FileApiError::unexpected(method, e))
    }

    /// Releases the host slot if this handle owns it.
    ///
    /// Idempotent: only the first call on an owning handle reaches the host.
    pub async fn dispose(&self) -> Result<()> {
        if !self.owns {
            return Ok(());
        }
        if self.state.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(target = %self.host_ref(), "Releasing host reference");
        self.bridge.release(&self.host_ref()).await?;
        Ok(())
    }

    /// Completes `call` synchronously on a direct-mode handle.
    ///
    /// Returns [`FileApiError::RequiresDirectAccess`] on remote handles and
    /// [`FileApiError::WouldSuspend`] when the call does not finish on its
    /// first poll.
    pub fn run_direct<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.access_mode() != AccessMode::Direct {
            return Err(FileApiError::RequiresDirectAccess(self.host_ref()));
        }
        call.now_or_never()
            .unwrap_or(Err(FileApiError::WouldSuspend(operation)))
    }
}

impl fmt::Debug for JsReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsReference")
            .field("host_ref", &self.host_ref())
            .field("owns", &self.owns)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// State shared by every typed wrapper.
#[derive(Clone, Debug)]
pub(crate) struct WrapperBase {
    pub(crate) api: FileApi,
    pub(crate) id: WrapperId,
    pub(crate) handle: JsReference,
}

impl WrapperBase {
    pub(crate) fn new(api: &FileApi, id: WrapperId, host_ref: HostRef, owns: bool) -> Self {
        Self {
            api: api.clone(),
            id,
            handle: JsReference::new(Arc::clone(api.bridge()), host_ref, owns),
        }
    }

    pub(crate) fn adopt(api: &FileApi, host_ref: HostRef, options: CreationOptions) -> Self {
        Self::new(api, WrapperId::next(), host_ref, options.disposes_reference)
    }

    pub(crate) async fn helper(&self) -> Result<HelperModule> {
        self.api.helper_for(self.id).await
    }

    pub(crate) async fn attribute<T: FromHostValue>(&self, name: &str) -> Result<T> {
        let helper = self.helper().await?;
        helper.get_attribute(&self.handle, name).await
    }

    /// Releases the handle, then the helper module if this wrapper loaded it.
    pub(crate) async fn dispose(&self) -> Result<()> {
        self.handle.dispose().await?;
        self.api.release_helper_if_owner(self.id).await
    }
}
