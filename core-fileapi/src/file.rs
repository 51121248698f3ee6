//! Named blobs with a modification time.

use std::ops::Deref;

use bridge_traits::HostRef;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::FileApi;
use crate::blob::Blob;
use crate::error::{FileApiError, Result};
use crate::options::{encode_options, encode_parts, BlobPart, FilePropertyBag};
use crate::reference::{CreationOptions, WrapperBase, WrapperId};

/// A host `File`. Every [`Blob`] operation is available through `Deref`.
#[derive(Clone, Debug)]
pub struct File {
    blob: Blob,
}

impl File {
    pub async fn new(
        api: &FileApi,
        parts: Vec<BlobPart>,
        file_name: &str,
        options: FilePropertyBag,
    ) -> Result<File> {
        let options = options.stamped();
        let id = WrapperId::next();
        let helper = api.helper_for(id).await?;
        let host_ref = helper
            .construct_file(encode_parts(&parts)?, file_name, encode_options(&options)?)
            .await?;
        debug!(%host_ref, file_name, "Constructed file");
        Ok(File {
            blob: Blob {
                base: WrapperBase::new(api, id, host_ref, true),
            },
        })
    }

    /// Wraps an existing host file.
    pub fn from_reference(api: &FileApi, host_ref: HostRef, options: CreationOptions) -> File {
        File {
            blob: Blob::from_reference(api, host_ref, options),
        }
    }

    pub fn as_blob(&self) -> &Blob {
        &self.blob
    }

    pub fn into_blob(self) -> Blob {
        self.blob
    }

    pub async fn name(&self) -> Result<String> {
        self.blob.base.attribute("name").await
    }

    pub async fn last_modified(&self) -> Result<DateTime<Utc>> {
        let millis: i64 = self.blob.base.attribute("lastModified").await?;
        DateTime::from_timestamp_millis(millis).ok_or(FileApiError::TimestampOutOfRange(millis))
    }

    pub fn name_now(&self) -> Result<String> {
        self.blob.base.handle.run_direct("name", self.name())
    }

    pub fn last_modified_now(&self) -> Result<DateTime<Utc>> {
        self.blob
            .base
            .handle
            .run_direct("lastModified", self.last_modified())
    }
}

impl Deref for File {
    type Target = Blob;

    fn deref(&self) -> &Blob {
        &self.blob
    }
}

impl From<File> for Blob {
    fn from(file: File) -> Blob {
        file.blob
    }
}
