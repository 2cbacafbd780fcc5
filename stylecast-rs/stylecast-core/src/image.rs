use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageReadError {
    #[error("failed to read image {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image {id} is empty")]
    Empty { id: String },
    #[error("image {id} is not a PNG, JPEG, GIF or WebP file")]
    UnrecognisedFormat { id: String },
}

/// Detect the media type of an encoded image from its leading bytes.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// One piece of visual evidence for image-based synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    id: String,
    media_type: &'static str,
    data: Vec<u8>,
}

impl ReferenceImage {
    pub fn from_bytes(id: impl Into<String>, data: Vec<u8>) -> Result<Self, ImageReadError> {
        let id = id.into();
        if data.is_empty() {
            return Err(ImageReadError::Empty { id });
        }
        let media_type =
            sniff_media_type(&data).ok_or_else(|| ImageReadError::UnrecognisedFormat {
                id: id.clone(),
            })?;
        Ok(Self {
            id,
            media_type,
            data,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageReadError> {
        let data = fs::read(path).map_err(|source| ImageReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path.display().to_string(), data)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Reference images treated as an unordered collection.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    images: Vec<ReferenceImage>,
}

impl ImageSet {
    pub fn new(images: Vec<ReferenceImage>) -> Self {
        Self { images }
    }

    /// Reads every path, stopping at the first image that cannot be used.
    pub fn from_paths<I, P>(paths: I) -> Result<Self, ImageReadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let images = paths
            .into_iter()
            .map(|path| ReferenceImage::from_path(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { images })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ReferenceImage> {
        self.images.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.images.iter()
    }
}
