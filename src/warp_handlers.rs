use bytes::Buf;
use chrono::Utc;
use futures_util::TryStreamExt;
use log::debug;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use warp::multipart::{FormData, Part};
use warp::{reject, Rejection, Reply};

use crate::config::Config;
use crate::file_scanner::allowed_extension;
use crate::photo::{self, Photo};
use crate::wall::Photowall;
use crate::warp_helpers::{UploadError, ValidationError};

/// Wire shape of one wall entry: the storage basename plus what the
/// frontend needs to lay the grid out.
#[derive(Debug, Serialize)]
pub struct WallPhoto {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub created_at: String,
}

impl From<&Photo> for WallPhoto {
    fn from(photo: &Photo) -> Self {
        WallPhoto {
            name: photo.file_name().to_string(),
            width: photo.width(),
            height: photo.height(),
            created_at: photo.created_at().to_rfc3339(),
        }
    }
}

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn wall_photos(wall: Photowall) -> Result<impl Reply, Infallible> {
    let mut photos = wall.photos();
    photo::sort_by_created_at(&mut photos);
    let export: Vec<WallPhoto> = photos.iter().map(WallPhoto::from).collect();
    Ok(warp::reply::json(&export))
}

/// Accepts a multipart upload with the file in the `pic` field, stages
/// it to a temp file and hands it to the wall. Replies 202 before the
/// pipeline ran; clients observe the result on the next wall fetch.
pub async fn upload_photo(
    form: FormData,
    wall: Photowall,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    let mut form = Box::pin(form);
    while let Some(part) = form.try_next().await.map_err(|err| {
        reject::custom(UploadError {
            message: format!("Multipart stream failed: {}", err),
        })
    })? {
        if part.name() != "pic" {
            continue;
        }
        return accept_upload(part, &wall, &config).await;
    }

    Err(reject::custom(ValidationError {
        message: "Missing 'pic' form field".to_string(),
    }))
}

async fn accept_upload(
    part: Part,
    wall: &Photowall,
    config: &Config,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Rejection> {
    let filename = part.filename().unwrap_or("").to_string();
    let Some(ext) = allowed_extension(&filename, &config.allowed_extensions) else {
        return Err(reject::custom(ValidationError {
            message: format!("File extension not allowed: {}", filename),
        }));
    };

    let staged = write_part_to_temp(part, &ext).await.map_err(|err| {
        log::error!("Could not stage upload {}: {}", filename, err);
        reject::custom(UploadError {
            message: "Could not store upload".to_string(),
        })
    })?;
    debug!("Staged upload {} at {}", filename, staged.display());

    // Fire-and-forget: the handle is dropped, failures show up in the
    // log and the photo simply never appears on the wall.
    let _completion = wall.add_photo_from_path(staged, Utc::now());

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "status": "accepted" })),
        warp::http::StatusCode::ACCEPTED,
    ))
}

async fn write_part_to_temp(
    part: Part,
    ext: &str,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!(".{}", ext))
        .tempfile()?;

    {
        let file = staged.as_file_mut();
        let mut stream = Box::pin(part.stream());
        while let Some(mut chunk) = stream.try_next().await? {
            while chunk.has_remaining() {
                let bytes = chunk.chunk();
                file.write_all(bytes)?;
                let n = bytes.len();
                chunk.advance(n);
            }
        }
        file.flush()?;
    }

    Ok(staged.into_temp_path().keep()?)
}
