use image::{GenericImageView, ImageReader};

use crate::photo::{format_tag, Photo};
use crate::stage::{Stage, StageError, StageResult};

/// Validates that a file is a decodable image and backfills its
/// dimensions and format. Used when re-validating photos restored from
/// a pre-existing storage directory; the live upload pipeline starts at
/// the resize stage instead.
pub struct Importer;

impl Stage for Importer {
    fn process(&self, photo: Photo) -> StageResult {
        let reader = ImageReader::open(photo.identifier())?.with_guessed_format()?;
        let Some(format) = reader.format() else {
            return Err(StageError::unknown_format());
        };
        let img = reader.decode()?;
        let (width, height) = img.dimensions();

        Ok(Photo::new(
            photo.identifier(),
            width,
            height,
            format_tag(format),
            photo.created_at(),
        ))
    }
}
