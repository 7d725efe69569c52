use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::photo::Photo;
use crate::stage::{run_stages, Stage, StageError, StageResult};

/// Callback fired when a photo enters or leaves the wall. Every
/// invocation runs as its own task; there is no ordering between
/// observers or across photos.
pub type Observer = Arc<dyn Fn(Photo) + Send + Sync>;

/// The wall of accepted photos and the pipeline that fills it.
///
/// Each `add_photo*` call spawns one task; concurrent pipeline work is
/// bounded by a semaphore so a burst of uploads cannot fan out into
/// unbounded file I/O. Cloning is cheap and every clone works on the
/// same wall.
#[derive(Clone)]
pub struct Photowall {
    inner: Arc<WallInner>,
}

struct WallInner {
    stages: RwLock<Vec<Arc<dyn Stage>>>,
    photos: RwLock<Vec<Photo>>,
    on_add: RwLock<Vec<Observer>>,
    on_remove: RwLock<Vec<Observer>>,
    limiter: Arc<Semaphore>,
}

impl Photowall {
    /// Creates an empty wall. Stages are set explicitly afterwards:
    ///
    /// ```ignore
    /// wall.set_stages(vec![
    ///     Arc::new(Resizer::new(1920, 1080)),
    ///     Arc::new(Store::new("./imgs")),
    /// ]);
    /// ```
    pub fn new(max_in_flight: usize) -> Self {
        Photowall {
            inner: Arc::new(WallInner {
                stages: RwLock::new(Vec::new()),
                photos: RwLock::new(Vec::new()),
                on_add: RwLock::new(Vec::new()),
                on_remove: RwLock::new(Vec::new()),
                limiter: Arc::new(Semaphore::new(max_in_flight.max(1))),
            }),
        }
    }

    /// Replaces the pipeline. Runs already in flight keep the stage
    /// list they snapshotted when they started.
    pub fn set_stages(&self, stages: Vec<Arc<dyn Stage>>) {
        *write_lock(&self.inner.stages) = stages;
    }

    pub fn stages(&self) -> Vec<Arc<dyn Stage>> {
        read_lock(&self.inner.stages).clone()
    }

    /// Ingest the file at `path`; the wall takes ownership of the file.
    /// Returns immediately. Awaiting the handle yields the stored photo
    /// or the stage error; dropping it keeps fire-and-forget behavior.
    pub fn add_photo_from_path(
        &self,
        path: impl Into<PathBuf>,
        created_at: DateTime<Utc>,
    ) -> JoinHandle<StageResult> {
        self.add_photo(Photo::from_path(path, created_at))
    }

    /// Same as `add_photo_from_path` for a pre-built photo value.
    pub fn add_photo(&self, photo: Photo) -> JoinHandle<StageResult> {
        let wall = self.clone();
        tokio::spawn(async move { wall.run_pipeline(photo).await })
    }

    async fn run_pipeline(&self, photo: Photo) -> StageResult {
        let _permit = self
            .inner
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StageError::Io(io::Error::other("photo worker pool is closed")))?;

        let stages = self.stages();
        let source = photo.identifier().display().to_string();
        let outcome = tokio::task::spawn_blocking(move || run_stages(&stages, photo))
            .await
            .map_err(|err| StageError::Io(io::Error::other(err)))?;

        match outcome {
            Ok(photo) => {
                debug!("Accepted photo: {}", photo.identifier().display());
                self.commit(photo.clone());
                Ok(photo)
            }
            Err(err) => {
                warn!("Pipeline rejected {}: {}", source, err);
                Err(err)
            }
        }
    }

    fn commit(&self, photo: Photo) {
        write_lock(&self.inner.photos).push(photo.clone());
        self.notify(&self.inner.on_add, photo);
    }

    /// Removes the first photo equal to `photo`. A photo that is not on
    /// the wall is a no-op and fires no observer.
    pub fn remove_photo(&self, photo: &Photo) {
        let removed = {
            let mut photos = write_lock(&self.inner.photos);
            match photos.iter().position(|p| p == photo) {
                Some(index) => {
                    photos.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.notify(&self.inner.on_remove, photo.clone());
        }
    }

    /// Point-in-time copy of the wall, safe to iterate without locks.
    pub fn photos(&self) -> Vec<Photo> {
        read_lock(&self.inner.photos).clone()
    }

    pub fn on_add(&self, observer: impl Fn(Photo) + Send + Sync + 'static) {
        write_lock(&self.inner.on_add).push(Arc::new(observer));
    }

    pub fn on_remove(&self, observer: impl Fn(Photo) + Send + Sync + 'static) {
        write_lock(&self.inner.on_remove).push(Arc::new(observer));
    }

    fn notify(&self, observers: &RwLock<Vec<Observer>>, photo: Photo) {
        for observer in read_lock(observers).iter().cloned() {
            let photo = photo.clone();
            tokio::spawn(async move { observer(photo) });
        }
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
