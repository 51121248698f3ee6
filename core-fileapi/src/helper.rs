//! Typed calls into the host helper module.
//!
//! The helper script exposes the few operations the host object model does
//! not offer as plain methods: generic attribute reads, constructors, array
//! buffer extraction and event wiring.

use bridge_traits::{CallbackRef, FromHostValue, HostRef, HostValue};
use bytes::Bytes;

use crate::error::Result;
use crate::reference::JsReference;

/// Handle to the imported helper module.
#[derive(Clone, Debug)]
pub struct HelperModule {
    handle: JsReference,
}

impl HelperModule {
    pub(crate) fn new(handle: JsReference) -> Self {
        Self { handle }
    }

    pub fn reference(&self) -> &JsReference {
        &self.handle
    }

    /// Reads `name` off `target`.
    pub async fn get_attribute<T: FromHostValue>(&self, target: &JsReference, name: &str) -> Result<T> {
        let target = target.ensure_live()?;
        self.handle
            .invoke("getAttribute", vec![target.into(), name.into()])
            .await
    }

    pub async fn construct_blob(&self, parts: HostValue, options: HostValue) -> Result<HostRef> {
        self.handle.invoke("constructBlob", vec![parts, options]).await
    }

    pub async fn construct_file(
        &self,
        parts: HostValue,
        file_name: &str,
        options: HostValue,
    ) -> Result<HostRef> {
        self.handle
            .invoke("constructFile", vec![parts, file_name.into(), options])
            .await
    }

    pub async fn construct_file_reader(&self) -> Result<HostRef> {
        self.handle.invoke("constructFileReader", vec![]).await
    }

    /// Copies the bytes of a host array buffer.
    pub async fn array_buffer(&self, buffer: &JsReference) -> Result<Bytes> {
        let buffer = buffer.ensure_live()?;
        self.handle.invoke("arrayBuffer", vec![buffer.into()]).await
    }

    /// Whether the reader's current result is an array buffer.
    pub async fn is_array_buffer(&self, reader: &JsReference) -> Result<bool> {
        let reader = reader.ensure_live()?;
        self.handle.invoke("isArrayBuffer", vec![reader.into()]).await
    }

    /// Wires all six reader events of `reader` to `callback`.
    pub async fn register_event_handlers(&self, callback: CallbackRef, reader: &JsReference) -> Result<()> {
        let reader = reader.ensure_live()?;
        self.handle
            .invoke("registerEventHandlers", vec![callback.into(), reader.into()])
            .await
    }

    pub(crate) async fn dispose(&self) -> Result<()> {
        self.handle.dispose().await
    }
}
