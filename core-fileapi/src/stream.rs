//! Chunked access to blob content.

use bridge_traits::HostRef;
use bytes::Bytes;

use crate::api::FileApi;
use crate::error::Result;
use crate::reference::{CreationOptions, JsReference, WrapperBase};

/// A host `ReadableStream` of byte chunks.
#[derive(Debug)]
pub struct ReadableStream {
    base: WrapperBase,
}

impl ReadableStream {
    pub fn from_reference(api: &FileApi, host_ref: HostRef, options: CreationOptions) -> Self {
        Self {
            base: WrapperBase::adopt(api, host_ref, options),
        }
    }

    pub fn reference(&self) -> &JsReference {
        &self.base.handle
    }

    /// Whether a reader holds the stream.
    pub async fn locked(&self) -> Result<bool> {
        self.base.attribute("locked").await
    }

    /// The next chunk, or `None` once the stream is exhausted.
    pub async fn read_chunk(&self) -> Result<Option<Bytes>> {
        self.base.handle.invoke("read", vec![]).await
    }

    /// Drains the remaining chunks into one buffer.
    pub async fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        while let Some(chunk) = self.read_chunk().await? {
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }

    pub async fn cancel(&self) -> Result<()> {
        self.base.handle.invoke("cancel", vec![]).await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.base.dispose().await
    }
}
