//! Token-addressed event relay.
//!
//! The host only ever sees a [`CallbackToken`]. This registry maps tokens to
//! live readers without keeping them alive: a reader that was dropped or
//! disposed simply stops receiving events, and whatever the host still fires
//! at its token is released and dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bridge_traits::{BridgeError, CallbackToken, EventRelay, HostBridge, HostRef};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::file_reader::ReaderShared;
use crate::progress_event::ProgressEventKind;

pub(crate) struct CallbackRegistry {
    next_token: AtomicU64,
    targets: Mutex<HashMap<CallbackToken, Weak<ReaderShared>>>,
    bridge: Weak<dyn HostBridge>,
}

impl CallbackRegistry {
    pub(crate) fn new(bridge: Weak<dyn HostBridge>) -> Self {
        Self {
            next_token: AtomicU64::new(1),
            targets: Mutex::new(HashMap::new()),
            bridge,
        }
    }

    pub(crate) fn register(&self, target: &Arc<ReaderShared>) -> CallbackToken {
        let token = CallbackToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.targets.lock().insert(token, Arc::downgrade(target));
        token
    }

    pub(crate) fn revoke(&self, token: CallbackToken) -> bool {
        self.targets.lock().remove(&token).is_some()
    }

    pub(crate) fn revoke_all(&self) -> usize {
        let mut targets = self.targets.lock();
        let count = targets.len();
        targets.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.lock().len()
    }

    fn resolve(&self, token: CallbackToken) -> Option<Arc<ReaderShared>> {
        self.targets.lock().get(&token).and_then(Weak::upgrade)
    }

    async fn discard(&self, token: CallbackToken, event_type: &str, event: HostRef) {
        debug!(%token, event_type, "Dropping event for inactive callback");
        let Some(bridge) = self.bridge.upgrade() else {
            return;
        };
        if let Err(err) = bridge.release(&event).await {
            warn!(%token, error = %err, "Failed to release dropped event");
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl EventRelay for CallbackRegistry {
    async fn dispatch(
        &self,
        token: CallbackToken,
        event_type: &str,
        event: HostRef,
    ) -> Result<(), BridgeError> {
        let Ok(kind) = event_type.parse::<ProgressEventKind>() else {
            self.discard(token, event_type, event).await;
            return Ok(());
        };

        match self.resolve(token) {
            Some(reader) => reader.deliver(kind, event).await,
            None => self.discard(token, event_type, event).await,
        }
        Ok(())
    }
}
