//! Host-side errors recorded on a reader.

use bridge_traits::HostRef;

use crate::api::FileApi;
use crate::error::Result;
use crate::reference::{CreationOptions, JsReference, WrapperBase};

/// A host `DOMException`, e.g. the `NotReadableError` a failed read leaves in
/// [`FileReader::error`](crate::FileReader::error).
#[derive(Debug)]
pub struct DomException {
    base: WrapperBase,
}

impl DomException {
    pub fn from_reference(api: &FileApi, host_ref: HostRef, options: CreationOptions) -> Self {
        Self {
            base: WrapperBase::adopt(api, host_ref, options),
        }
    }

    pub fn reference(&self) -> &JsReference {
        &self.base.handle
    }

    /// Error name, e.g. `"NotReadableError"`.
    pub async fn name(&self) -> Result<String> {
        self.base.attribute("name").await
    }

    pub async fn message(&self) -> Result<String> {
        self.base.attribute("message").await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.base.dispose().await
    }
}
