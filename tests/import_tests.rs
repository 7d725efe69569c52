use chrono::Utc;
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use photowall::file_scanner::restore_from_directory;
use photowall::import_stage::Importer;
use photowall::photo::Photo;
use photowall::stage::{Stage, StageError};
use photowall::wall::Photowall;

fn write_test_image(path: &Path, width: u32, height: u32) {
    RgbaImage::new(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

#[test]
fn test_importer_measures_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("existing.png");
    write_test_image(&path, 320, 240);

    let created_at = Utc::now();
    let photo = Importer
        .process(Photo::from_path(&path, created_at))
        .unwrap();

    assert_eq!((photo.width(), photo.height()), (320, 240));
    assert_eq!(photo.format(), "png");
    assert_eq!(photo.identifier(), path.as_path());
    assert_eq!(photo.created_at(), created_at);
    // Importing only validates; the file stays where it is.
    assert!(path.exists());
}

#[test]
fn test_importer_rejects_non_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    fs::write(&path, b"not an image at all").unwrap();

    let err = Importer
        .process(Photo::from_path(&path, Utc::now()))
        .unwrap_err();
    assert!(matches!(err, StageError::Decode(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restore_from_directory_picks_up_existing_photos() {
    let dir = tempfile::tempdir().unwrap();
    write_test_image(&dir.path().join("a.png"), 100, 50);
    write_test_image(&dir.path().join("b.png"), 30, 30);
    fs::write(dir.path().join("notes.txt"), b"not a photo").unwrap();
    fs::write(dir.path().join("broken.png"), b"garbage").unwrap();

    let wall = Photowall::new(4);
    wall.set_stages(vec![Arc::new(Importer) as Arc<dyn Stage>]);

    let allowed = vec!["png".to_string(), "jpg".to_string()];
    restore_from_directory(&wall, dir.path(), &allowed).await;

    let photos = wall.photos();
    assert_eq!(photos.len(), 2);

    let mut names: Vec<&str> = photos.iter().map(Photo::file_name).collect();
    names.sort();
    assert_eq!(names, vec!["a.png", "b.png"]);

    // Dimensions were backfilled by the importer.
    let a = photos.iter().find(|p| p.file_name() == "a.png").unwrap();
    assert_eq!((a.width(), a.height()), (100, 50));
}
