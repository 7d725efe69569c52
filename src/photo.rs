use chrono::{DateTime, Utc};
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// Immutable description of one photo on the wall.
///
/// The identifier doubles as the file's location on disk: a freshly
/// ingested photo points at its staged upload, a stored photo at its
/// final place in the storage directory. Stages never mutate a photo in
/// place, they build a new value and carry `created_at` through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    identifier: PathBuf,
    width: u32,
    height: u32,
    format: String,
    created_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(
        identifier: impl Into<PathBuf>,
        width: u32,
        height: u32,
        format: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Photo {
            identifier: identifier.into(),
            width,
            height,
            format: format.into(),
            created_at,
        }
    }

    /// A photo fresh from ingestion: dimensions and format are unknown
    /// until the pipeline has looked at the file.
    pub fn from_path(identifier: impl Into<PathBuf>, created_at: DateTime<Utc>) -> Self {
        Photo::new(identifier, 0, 0, "", created_at)
    }

    pub fn identifier(&self) -> &Path {
        &self.identifier
    }

    /// Basename of the identifier, the public name of a stored photo.
    pub fn file_name(&self) -> &str {
        self.identifier
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Sort photos for display, oldest first.
pub fn sort_by_created_at(photos: &mut [Photo]) {
    photos.sort_by_key(Photo::created_at);
}

/// Short extension-style tag for a decoded format, e.g. "jpg" or "png".
/// Also used as the file extension when the Store stage picks a name.
pub fn format_tag(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}
