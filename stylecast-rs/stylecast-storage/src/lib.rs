use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use stylecast_core::{ArtifactStore, CollaboratorError, ImageArtifact, StyleGuide, sniff_media_type};
use stylecast_utils::{ImageNameContext, unique_suffix};
use thiserror::Error;
use tracing::{debug, info};

pub const GUIDE_EXTENSION: &str = "md";
const NAME_ATTEMPTS: usize = 8;
const COLLISION_SUFFIX_LENGTH: usize = 4;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("style guide not found: {path}")]
    GuideNotFound { path: PathBuf },
    #[error("no free file name left for {path}")]
    NamesExhausted { path: PathBuf },
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// How [`GuideStore::write`] treats an existing file with the same slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Leave the existing guide alone and pick a suffixed name.
    #[default]
    KeepExisting,
    Overwrite,
}

/// Directory of markdown style guides, one file per slug.
#[derive(Debug, Clone)]
pub struct GuideStore {
    dir: PathBuf,
}

impl GuideStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.{GUIDE_EXTENSION}"))
    }

    /// Write the guide body byte for byte and return where it landed.
    pub fn write(&self, guide: &StyleGuide, mode: WriteMode) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let path = self.path_for(guide.slug());
        if mode == WriteMode::Overwrite {
            fs::write(&path, guide.body()).map_err(io_error(&path))?;
            info!(path = %path.display(), "wrote style guide");
            return Ok(path);
        }

        let mut candidate = path.clone();
        for _ in 0..NAME_ATTEMPTS {
            match write_new(&candidate, guide.body()) {
                Ok(()) => {
                    info!(path = %candidate.display(), "wrote style guide");
                    return Ok(candidate);
                }
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %candidate.display(), "style guide exists, picking another name");
                    let suffix = unique_suffix(COLLISION_SUFFIX_LENGTH).to_ascii_lowercase();
                    candidate = self.path_for(&format!("{}-{suffix}", guide.slug()));
                }
                Err(source) => {
                    return Err(StorageError::Io {
                        path: candidate,
                        source,
                    });
                }
            }
        }

        Err(StorageError::NamesExhausted { path })
    }
}

fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())
}

/// Load a stored guide; its slug is the file stem.
pub fn read_style_guide(path: &Path) -> Result<StyleGuide, StorageError> {
    let body = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::GuideNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StorageError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let slug = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(StyleGuide::new(slug, body))
}

#[derive(Debug, Clone, Copy)]
pub struct SaveImageOptions<'a> {
    pub file_stem: &'a str,
    pub mime_type: Option<&'a str>,
    pub output_dir: &'a Path,
}

/// Write image bytes to `<output_dir>/<file_stem>.<ext>`, taking the extension
/// from the mime type or, failing that, the leading bytes.
pub fn save_image(bytes: &[u8], options: SaveImageOptions<'_>) -> Result<PathBuf, StorageError> {
    if bytes.is_empty() {
        return Err(StorageError::EmptyPayload);
    }

    let output_dir = options.output_dir;
    fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;

    let media_type = options.mime_type.or_else(|| sniff_media_type(bytes));
    let extension = extension_from_mime(media_type);
    let path = output_dir.join(format!("{}.{extension}", options.file_stem));
    fs::write(&path, bytes).map_err(io_error(&path))?;
    debug!(path = %path.display(), "saved image");
    Ok(path)
}

/// Output directory for generated images, named after the prompt.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    dir: PathBuf,
    names: ImageNameContext,
}

impl ImageDirectory {
    pub fn new(dir: &Path, names: ImageNameContext) -> Self {
        Self {
            dir: dir.to_path_buf(),
            names,
        }
    }

    pub fn save(&self, index: usize, artifact: &ImageArtifact) -> Result<PathBuf, StorageError> {
        let file_stem = self.names.file_stem(index);
        save_image(
            &artifact.bytes,
            SaveImageOptions {
                file_stem: &file_stem,
                mime_type: artifact.media_type.as_deref(),
                output_dir: &self.dir,
            },
        )
    }
}

impl ArtifactStore for ImageDirectory {
    fn store(&self, index: usize, artifact: &ImageArtifact) -> Result<PathBuf, CollaboratorError> {
        Ok(self.save(index, artifact)?)
    }
}

fn extension_from_mime(mime_type: Option<&str>) -> &'static str {
    match mime_type
        .unwrap_or("image/png")
        .to_ascii_lowercase()
        .as_str()
    {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/png" => "png",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests;
