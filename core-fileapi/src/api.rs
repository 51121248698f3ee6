//! # File API Context
//!
//! [`FileApi`] is the shared entry point every wrapper is created from. It
//! owns the bridge, the resolved [`FileApiOptions`], the lazily imported
//! helper module and the callback registry readers relay events through.
//!
//! ## Helper module lifecycle
//!
//! The helper is imported on first use and shared by every wrapper. Imports
//! are single-flight: concurrent first users wait on one `import` call. The
//! wrapper whose request triggered the import is the owner; disposing it
//! releases the helper after its own handle, and the next user imports again.

use std::fmt;
use std::sync::Arc;

use bridge_traits::{AccessMode, HostBridge, HostRef};
use core_runtime::config::FileApiOptions;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::callbacks::CallbackRegistry;
use crate::error::{FileApiError, Result};
use crate::helper::HelperModule;
use crate::reference::{JsReference, WrapperId};
use crate::url::UrlService;

struct HelperSlot {
    module: HelperModule,
    owner: WrapperId,
}

struct FileApiInner {
    bridge: Arc<dyn HostBridge>,
    options: FileApiOptions,
    helper: Mutex<Option<HelperSlot>>,
    callbacks: Arc<CallbackRegistry>,
}

/// Shared context for creating File API wrappers.
///
/// Cheap to clone; clones share the helper module and callback registry.
#[derive(Clone)]
pub struct FileApi {
    inner: Arc<FileApiInner>,
}

impl FileApi {
    /// Context with default [`FileApiOptions`].
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self::with_options(bridge, FileApiOptions::default())
    }

    pub fn with_options(bridge: Arc<dyn HostBridge>, options: FileApiOptions) -> Self {
        let callbacks = Arc::new(CallbackRegistry::new(Arc::downgrade(&bridge)));
        Self {
            inner: Arc::new(FileApiInner {
                bridge,
                options,
                helper: Mutex::new(None),
                callbacks,
            }),
        }
    }

    pub fn bridge(&self) -> &Arc<dyn HostBridge> {
        &self.inner.bridge
    }

    pub fn options(&self) -> &FileApiOptions {
        &self.inner.options
    }

    pub fn access_mode(&self) -> AccessMode {
        self.inner.bridge.access_mode()
    }

    pub fn url_service(&self) -> UrlService {
        UrlService::new(self.clone())
    }

    pub(crate) fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.inner.callbacks
    }

    /// The helper module, importing it if needed.
    ///
    /// A helper imported through this call is not owned by any wrapper and
    /// stays loaded until [`FileApi::shutdown`].
    pub async fn helper(&self) -> Result<HelperModule> {
        self.helper_for(WrapperId::DETACHED).await
    }

    pub(crate) async fn helper_for(&self, requester: WrapperId) -> Result<HelperModule> {
        let mut slot = self.inner.helper.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.module.clone());
        }

        let path = self.inner.options.full_script_path();
        info!(path = %path, owner = %requester, "Importing File API helper module");
        let value = self
            .inner
            .bridge
            .invoke_global("import", vec![path.into()])
            .await?;
        let host_ref = value
            .cast::<HostRef>()
            .map_err(|e| FileApiError::unexpected("import", e))?;

        let module = HelperModule::new(JsReference::new(
            Arc::clone(&self.inner.bridge),
            host_ref,
            true,
        ));
        *slot = Some(HelperSlot {
            module: module.clone(),
            owner: requester,
        });
        Ok(module)
    }

    pub(crate) async fn release_helper_if_owner(&self, owner: WrapperId) -> Result<()> {
        let released = {
            let mut slot = self.inner.helper.lock().await;
            match slot.as_ref() {
                Some(current) if current.owner == owner && owner != WrapperId::DETACHED => {
                    slot.take()
                }
                _ => None,
            }
        };

        if let Some(slot) = released {
            debug!(owner = %owner, "Releasing File API helper module");
            slot.module.dispose().await?;
        }
        Ok(())
    }

    /// Whether the helper module is currently imported.
    pub async fn is_helper_loaded(&self) -> bool {
        self.inner.helper.lock().await.is_some()
    }

    /// Releases the helper module and stops relaying events to every reader.
    pub async fn shutdown(&self) -> Result<()> {
        let revoked = self.inner.callbacks.revoke_all();
        let released = self.inner.helper.lock().await.take();
        if let Some(slot) = released {
            slot.module.dispose().await?;
        }
        info!(revoked, "File API context shut down");
        Ok(())
    }
}

impl fmt::Debug for FileApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileApi")
            .field("options", &self.inner.options)
            .field("access_mode", &self.access_mode())
            .field("callbacks", &self.inner.callbacks.len())
            .finish()
    }
}
