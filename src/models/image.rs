use std::path::PathBuf;

use crate::error::{GenerationError, Result};

/// One image handed to the client. Exactly one representation is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Bytes(Vec<u8>),
    Path(PathBuf),
    Url(String),
}

impl ImageInput {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ImageInput::Bytes(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        ImageInput::Path(path.into())
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        ImageInput::Url(url.into())
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ImageInput::Url(url) => Some(url),
            _ => None,
        }
    }

    /// Raw bytes for the byte and path representations; `None` for URLs, which are
    /// passed through to the service untouched.
    pub(crate) async fn load(&self) -> Result<Option<Vec<u8>>> {
        match self {
            ImageInput::Bytes(bytes) => Ok(Some(bytes.clone())),
            ImageInput::Path(path) => tokio::fs::read(path).await.map(Some).map_err(|e| {
                GenerationError::ValidationError(format!(
                    "Could not read image {}: {}",
                    path.display(),
                    e
                ))
            }),
            ImageInput::Url(_) => Ok(None),
        }
    }
}

/// A produced image (or video) as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    Url {
        url: String,
        content_type: Option<String>,
    },
    Data {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

impl ImageRef {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Url { url, .. } => Some(url),
            ImageRef::Data { .. } => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            ImageRef::Data { bytes, .. } => Some(bytes),
            ImageRef::Url { .. } => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            ImageRef::Url { content_type, .. } | ImageRef::Data { content_type, .. } => {
                content_type.as_deref()
            }
        }
    }
}
