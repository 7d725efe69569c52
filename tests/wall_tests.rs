use chrono::{TimeZone, Utc};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use photowall::photo::Photo;
use photowall::resize_stage::Resizer;
use photowall::stage::{Stage, StageError, StageFn};
use photowall::store_stage::Store;
use photowall::wall::Photowall;

fn create_test_image(width: u32, height: u32, pixel: u8) -> PathBuf {
    let staged = tempfile::Builder::new()
        .prefix("wall-test-")
        .suffix(".png")
        .tempfile()
        .unwrap();
    let path = staged.into_temp_path().keep().unwrap();
    RgbaImage::from_pixel(width, height, image::Rgba([pixel, pixel, pixel, 255]))
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

fn copy_of(path: &PathBuf) -> PathBuf {
    let staged = tempfile::Builder::new()
        .prefix("wall-test-")
        .suffix(".png")
        .tempfile()
        .unwrap();
    let copy = staged.into_temp_path().keep().unwrap();
    fs::copy(path, &copy).unwrap();
    copy
}

#[tokio::test]
async fn test_stages_run_in_order_and_observers_fire() {
    let wall = Photowall::new(4);
    let calls = Arc::new(Mutex::new(Vec::new()));

    let first_calls = calls.clone();
    let second_calls = calls.clone();
    wall.set_stages(vec![
        Arc::new(StageFn::new(move |photo: Photo| {
            first_calls.lock().unwrap().push("first");
            Ok(photo)
        })) as Arc<dyn Stage>,
        Arc::new(StageFn::new(move |photo: Photo| {
            second_calls.lock().unwrap().push("second");
            Ok(photo)
        })),
    ]);

    let (added_tx, mut added_rx) = tokio::sync::mpsc::unbounded_channel();
    wall.on_add(move |photo| {
        let _ = added_tx.send(photo);
    });

    let created_at = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
    let accepted = wall
        .add_photo_from_path("virtual.png", created_at)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(wall.photos(), vec![accepted.clone()]);

    // The observer receives the post-pipeline photo.
    let observed = added_rx.recv().await.unwrap();
    assert_eq!(observed, accepted);
}

#[tokio::test]
async fn test_failed_pipeline_discards_photo() {
    let wall = Photowall::new(4);
    wall.set_stages(vec![Arc::new(StageFn::new(|_: Photo| {
        Err(StageError::DuplicateContent("abc".to_string()))
    })) as Arc<dyn Stage>]);

    let (added_tx, mut added_rx) = tokio::sync::mpsc::unbounded_channel::<Photo>();
    wall.on_add(move |photo| {
        let _ = added_tx.send(photo);
    });

    let result = wall
        .add_photo_from_path("virtual.png", Utc::now())
        .await
        .unwrap();

    assert!(matches!(result, Err(StageError::DuplicateContent(_))));
    assert!(wall.photos().is_empty());

    // No add notification for a discarded photo.
    let observed = tokio::time::timeout(Duration::from_millis(100), added_rx.recv()).await;
    assert!(observed.is_err());
}

#[tokio::test]
async fn test_remove_photo_notifies_once() {
    let wall = Photowall::new(4);
    wall.set_stages(vec![Arc::new(StageFn::new(|photo: Photo| Ok(photo))) as Arc<dyn Stage>]);

    let (removed_tx, mut removed_rx) = tokio::sync::mpsc::unbounded_channel();
    wall.on_remove(move |photo| {
        let _ = removed_tx.send(photo);
    });

    wall.add_photo_from_path("virtual.png", Utc::now())
        .await
        .unwrap()
        .unwrap();
    let photo = wall.photos().remove(0);

    wall.remove_photo(&photo);
    assert!(wall.photos().is_empty());

    let observed = removed_rx.recv().await.unwrap();
    assert_eq!(observed, photo);

    // Removing a photo that is no longer on the wall is a silent no-op.
    wall.remove_photo(&photo);
    let extra = tokio::time::timeout(Duration::from_millis(100), removed_rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_pipeline_resizes_and_stores() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Photowall::new(4);
    wall.set_stages(vec![
        Arc::new(Resizer::new(1920, 1080)) as Arc<dyn Stage>,
        Arc::new(Store::new(dir.path())),
    ]);

    let created_at = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
    let input = create_test_image(2000, 1000, 1);

    let photo = wall
        .add_photo_from_path(&input, created_at)
        .await
        .unwrap()
        .unwrap();

    assert_eq!((photo.width(), photo.height()), (1920, 960));
    assert_eq!(photo.file_name(), "2021-03-01_120000.png");
    assert_eq!(photo.identifier().parent(), Some(dir.path()));
    assert_eq!(wall.photos(), vec![photo]);
    assert!(!input.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_distinct_photos_added_concurrently_both_land() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Photowall::new(4);
    wall.set_stages(vec![
        Arc::new(Resizer::new(1920, 1080)) as Arc<dyn Stage>,
        Arc::new(Store::new(dir.path())),
    ]);

    let created_at = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
    let first = wall.add_photo_from_path(create_test_image(60, 60, 10), created_at);
    let second = wall.add_photo_from_path(create_test_image(70, 70, 20), created_at);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_ne!(first.identifier(), second.identifier());
    assert_eq!(wall.photos().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_identical_content_added_sequentially_lands_once() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Photowall::new(4);
    wall.set_stages(vec![
        Arc::new(Resizer::new(1920, 1080)) as Arc<dyn Stage>,
        Arc::new(Store::new(dir.path())),
    ]);

    let original = create_test_image(60, 60, 10);
    let duplicate = copy_of(&original);
    let t0 = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 1).unwrap();

    wall.add_photo_from_path(original, t0)
        .await
        .unwrap()
        .unwrap();
    let second = wall.add_photo_from_path(duplicate, t1).await.unwrap();

    assert!(matches!(second, Err(StageError::DuplicateContent(_))));
    assert_eq!(wall.photos().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_identical_content_added_concurrently_lands_once() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Photowall::new(4);
    wall.set_stages(vec![
        Arc::new(Resizer::new(1920, 1080)) as Arc<dyn Stage>,
        Arc::new(Store::new(dir.path())),
    ]);

    let original = create_test_image(60, 60, 10);
    let handles: Vec<_> = (0..4)
        .map(|_| wall.add_photo_from_path(copy_of(&original), Utc::now()))
        .collect();
    fs::remove_file(&original).unwrap();

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(StageError::DuplicateContent(_)) => duplicates += 1,
            Err(err) => panic!("unexpected stage error: {}", err),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 3);
    assert_eq!(wall.photos().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bounded_pool_drains_a_burst() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Photowall::new(2);
    wall.set_stages(vec![
        Arc::new(Resizer::new(1920, 1080)) as Arc<dyn Stage>,
        Arc::new(Store::new(dir.path())),
    ]);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            wall.add_photo_from_path(create_test_image(40 + i, 40, i as u8), Utc::now())
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(wall.photos().len(), 6);
}
