//! Object URLs for blobs.

use bridge_traits::HostValue;
use tracing::debug;

use crate::api::FileApi;
use crate::blob::Blob;
use crate::error::{FileApiError, Result};

/// Creates and revokes `blob:` URLs through the host's global `URL` object.
#[derive(Debug, Clone)]
pub struct UrlService {
    api: FileApi,
}

impl UrlService {
    pub fn new(api: FileApi) -> Self {
        Self { api }
    }

    /// A URL the host resolves to `blob`'s content until revoked.
    pub async fn create_object_url(&self, blob: &Blob) -> Result<String> {
        let target = blob.reference().ensure_live()?;
        let value = self
            .api
            .bridge()
            .invoke_global("URL.createObjectURL", vec![HostValue::Object(target)])
            .await?;
        let url = value
            .cast::<String>()
            .map_err(|e| FileApiError::unexpected("URL.createObjectURL", e))?;
        debug!(%target, url = %url, "Created object URL");
        Ok(url)
    }

    /// Revokes `url`. Unknown URLs are ignored by the host.
    pub async fn revoke_object_url(&self, url: &str) -> Result<()> {
        self.api
            .bridge()
            .invoke_global("URL.revokeObjectURL", vec![url.into()])
            .await?;
        Ok(())
    }
}
