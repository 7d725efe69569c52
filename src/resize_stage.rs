use image::imageops::FilterType;
use image::{GenericImageView, ImageReader};
use log::warn;
use std::fs;

use crate::photo::{format_tag, Photo};
use crate::stage::{Stage, StageError, StageResult};

/// Downsamples photos that exceed the configured bounds.
///
/// Images already within bounds pass through with their bytes untouched.
/// Oversized images get the larger dimension pinned to its bound and the
/// other computed from the aspect ratio, then a Lanczos3 resample. The
/// result always lands in a fresh temp file and the input file is
/// consumed.
pub struct Resizer {
    max_width: u32,
    max_height: u32,
}

impl Resizer {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Resizer {
            max_width,
            max_height,
        }
    }

    /// Pin width for landscape input, height otherwise; the free
    /// dimension follows the aspect ratio.
    fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width > height {
            let scaled = (self.max_width as u64 * height as u64) / width as u64;
            (self.max_width, (scaled as u32).max(1))
        } else {
            let scaled = (self.max_height as u64 * width as u64) / height as u64;
            ((scaled as u32).max(1), self.max_height)
        }
    }
}

impl Stage for Resizer {
    fn process(&self, photo: Photo) -> StageResult {
        let reader = ImageReader::open(photo.identifier())?.with_guessed_format()?;
        let Some(format) = reader.format() else {
            return Err(StageError::unknown_format());
        };
        let tag = format_tag(format);
        let img = reader.decode()?;
        let (width, height) = img.dimensions();

        let staged = tempfile::Builder::new()
            .prefix("photowall-")
            .suffix(&format!(".{}", tag))
            .tempfile()?;

        let (out_width, out_height) = if width <= self.max_width && height <= self.max_height {
            // Small images keep their exact bytes.
            fs::copy(photo.identifier(), staged.path())?;
            (width, height)
        } else {
            let (target_width, target_height) = self.target_dimensions(width, height);
            let resized = img.resize_exact(target_width, target_height, FilterType::Lanczos3);
            resized.save_with_format(staged.path(), format)?;
            (target_width, target_height)
        };

        let out_path = staged
            .into_temp_path()
            .keep()
            .map_err(|err| StageError::Io(err.error))?;
        if let Err(err) = fs::remove_file(photo.identifier()) {
            warn!(
                "Could not remove consumed input {}: {}",
                photo.identifier().display(),
                err
            );
        }

        Ok(Photo::new(
            out_path,
            out_width,
            out_height,
            tag,
            photo.created_at(),
        ))
    }
}
