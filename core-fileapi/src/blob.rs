//! Immutable binary content living in the host.

use std::sync::Arc;

use bridge_traits::HostRef;
use bytes::Bytes;
use tracing::debug;

use crate::api::FileApi;
use crate::error::Result;
use crate::options::{encode_options, encode_parts, BlobPart, BlobPropertyBag};
use crate::reference::{CreationOptions, JsReference, WrapperBase, WrapperId};
use crate::stream::ReadableStream;

/// A host `Blob`.
///
/// Clones share one handle: disposing any of them disposes all.
#[derive(Clone, Debug)]
pub struct Blob {
    pub(crate) base: WrapperBase,
}

impl Blob {
    /// Creates a blob from the concatenation of `parts`.
    pub async fn new(api: &FileApi, parts: Vec<BlobPart>, options: BlobPropertyBag) -> Result<Blob> {
        let id = WrapperId::next();
        let helper = api.helper_for(id).await?;
        let host_ref = helper
            .construct_blob(encode_parts(&parts)?, encode_options(&options)?)
            .await?;
        debug!(%host_ref, parts = parts.len(), "Constructed blob");
        Ok(Blob {
            base: WrapperBase::new(api, id, host_ref, true),
        })
    }

    /// Wraps an existing host blob.
    pub fn from_reference(api: &FileApi, host_ref: HostRef, options: CreationOptions) -> Blob {
        Blob {
            base: WrapperBase::adopt(api, host_ref, options),
        }
    }

    pub fn reference(&self) -> &JsReference {
        &self.base.handle
    }

    pub fn id(&self) -> WrapperId {
        self.base.id
    }

    /// Size in bytes.
    pub async fn size(&self) -> Result<u64> {
        self.base.attribute("size").await
    }

    /// The normalized media type, `""` when unknown.
    pub async fn media_type(&self) -> Result<String> {
        self.base.attribute("type").await
    }

    /// [`Blob::size`] without suspending. Direct-mode handles only.
    pub fn size_now(&self) -> Result<u64> {
        self.base.handle.run_direct("size", self.size())
    }

    /// [`Blob::media_type`] without suspending. Direct-mode handles only.
    pub fn media_type_now(&self) -> Result<String> {
        self.base.handle.run_direct("type", self.media_type())
    }

    /// A new blob covering `[start, end)` of this one.
    ///
    /// Offsets are clamped to `[0, size]`; a missing start means 0 and a
    /// missing end means `size`. The result is independent of `self`.
    pub async fn slice(
        &self,
        start: Option<i64>,
        end: Option<i64>,
        content_type: Option<&str>,
    ) -> Result<Blob> {
        let size = self.size().await?;
        let (start, end) = clamp_range(start, end, size);
        let host_ref: HostRef = self
            .base
            .handle
            .invoke("slice", vec![start.into(), end.into(), content_type.into()])
            .await?;
        Ok(Blob {
            base: WrapperBase::new(&self.base.api, WrapperId::next(), host_ref, true),
        })
    }

    /// A chunked stream over the content.
    pub async fn stream(&self) -> Result<ReadableStream> {
        let host_ref: HostRef = self.base.handle.invoke("stream", vec![]).await?;
        Ok(ReadableStream::from_reference(
            &self.base.api,
            host_ref,
            CreationOptions::owned(),
        ))
    }

    /// The content decoded as UTF-8.
    pub async fn text(&self) -> Result<String> {
        self.base.handle.invoke("text", vec![]).await
    }

    /// A copy of the content.
    pub async fn array_buffer(&self) -> Result<Bytes> {
        let buffer: HostRef = self.base.handle.invoke("arrayBuffer", vec![]).await?;
        let buffer = JsReference::new(Arc::clone(self.base.api.bridge()), buffer, true);
        let bytes = match self.base.helper().await {
            Ok(helper) => helper.array_buffer(&buffer).await,
            Err(err) => Err(err),
        };
        buffer.dispose().await?;
        bytes
    }

    pub async fn dispose(&self) -> Result<()> {
        self.base.dispose().await
    }
}

/// Clamps optional slice offsets into `[0, size]`.
pub(crate) fn clamp_range(start: Option<i64>, end: Option<i64>, size: u64) -> (u64, u64) {
    let size = i64::try_from(size).unwrap_or(i64::MAX);
    let start = start.unwrap_or(0).clamp(0, size);
    let end = end.unwrap_or(size).clamp(0, size);
    (start as u64, end as u64)
}
