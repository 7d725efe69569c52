use std::sync::Arc;

use crate::photo::Photo;

/// One transformation step in the photo pipeline.
///
/// A stage instance is shared between all pipeline runs, so it must be
/// safe to call for different photos concurrently.
pub trait Stage: Send + Sync {
    fn process(&self, photo: Photo) -> StageResult;
}

pub type StageResult = Result<Photo, StageError>;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("duplicate content: {0}")]
    DuplicateContent(String),
}

impl StageError {
    pub(crate) fn unknown_format() -> Self {
        StageError::Decode(image::ImageError::Unsupported(
            image::error::ImageFormatHint::Unknown.into(),
        ))
    }
}

/// Adapter so a bare closure can sit in a pipeline next to stateful
/// stages.
pub struct StageFn<F>(F);

impl<F> StageFn<F>
where
    F: Fn(Photo) -> StageResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        StageFn(f)
    }
}

impl<F> Stage for StageFn<F>
where
    F: Fn(Photo) -> StageResult + Send + Sync,
{
    fn process(&self, photo: Photo) -> StageResult {
        (self.0)(photo)
    }
}

/// Run a photo through the stages strictly in order. The first error
/// aborts the run; no stage is skipped or retried.
pub fn run_stages(stages: &[Arc<dyn Stage>], photo: Photo) -> StageResult {
    let mut photo = photo;
    for stage in stages {
        photo = stage.process(photo)?;
    }
    Ok(photo)
}
