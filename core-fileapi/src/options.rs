//! Construction options and blob parts.

use bridge_traits::HostValue;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::Result;
use crate::file::File;

/// How line endings in text parts are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndingType {
    /// Text is copied unchanged.
    #[default]
    Transparent,
    /// Line breaks in text parts become the host platform's native ending.
    Native,
}

/// Options for constructing a [`Blob`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobPropertyBag {
    /// Media type. The host lowercases it, or drops it entirely if it holds a
    /// character outside U+0020..=U+007E.
    #[serde(rename = "type")]
    pub type_: String,
    pub endings: EndingType,
}

impl BlobPropertyBag {
    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.type_ = media_type.into();
        self
    }

    pub fn with_endings(mut self, endings: EndingType) -> Self {
        self.endings = endings;
        self
    }
}

/// Options for constructing a [`File`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilePropertyBag {
    #[serde(flatten)]
    pub blob: BlobPropertyBag,
    /// `None` stamps the file with the time [`File::new`] runs.
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<DateTime<Utc>>,
}

impl FilePropertyBag {
    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.blob.type_ = media_type.into();
        self
    }

    pub fn with_endings(mut self, endings: EndingType) -> Self {
        self.blob.endings = endings;
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// The bag with a missing `last_modified` resolved to now.
    pub(crate) fn stamped(mut self) -> Self {
        self.last_modified.get_or_insert_with(Utc::now);
        self
    }
}

/// One piece of blob content.
#[derive(Debug, Clone)]
pub enum BlobPart {
    Bytes(Bytes),
    Blob(Blob),
    Text(String),
}

impl BlobPart {
    fn to_host_value(&self) -> Result<HostValue> {
        Ok(match self {
            BlobPart::Bytes(bytes) => HostValue::Bytes(bytes.clone()),
            BlobPart::Text(text) => HostValue::String(text.clone()),
            BlobPart::Blob(blob) => HostValue::Object(blob.reference().ensure_live()?),
        })
    }
}

pub(crate) fn encode_parts(parts: &[BlobPart]) -> Result<HostValue> {
    parts
        .iter()
        .map(BlobPart::to_host_value)
        .collect::<Result<Vec<_>>>()
        .map(HostValue::Array)
}

pub(crate) fn encode_options<T: Serialize>(options: &T) -> Result<HostValue> {
    Ok(HostValue::from(serde_json::to_value(options)?))
}

impl From<Bytes> for BlobPart {
    fn from(value: Bytes) -> Self {
        BlobPart::Bytes(value)
    }
}

impl From<Vec<u8>> for BlobPart {
    fn from(value: Vec<u8>) -> Self {
        BlobPart::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for BlobPart {
    fn from(value: &[u8]) -> Self {
        BlobPart::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<&str> for BlobPart {
    fn from(value: &str) -> Self {
        BlobPart::Text(value.to_string())
    }
}

impl From<String> for BlobPart {
    fn from(value: String) -> Self {
        BlobPart::Text(value)
    }
}

impl From<Blob> for BlobPart {
    fn from(value: Blob) -> Self {
        BlobPart::Blob(value)
    }
}

impl From<&Blob> for BlobPart {
    fn from(value: &Blob) -> Self {
        BlobPart::Blob(value.clone())
    }
}

impl From<&File> for BlobPart {
    fn from(value: &File) -> Self {
        BlobPart::Blob(value.as_blob().clone())
    }
}
