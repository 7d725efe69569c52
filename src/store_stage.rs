use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::namer::{DateNamer, Namer, DEFAULT_NAME_FORMAT};
use crate::photo::Photo;
use crate::stage::{Stage, StageError, StageResult};

/// Persists photos into the storage directory and rejects content that
/// was stored before.
///
/// The file is stream-copied into a staging file inside the storage
/// directory while its SHA-256 digest is computed, so the duplicate
/// decision happens before anything reaches a final name. Checking the
/// digest, recording it and renaming the staging file into place form
/// one critical section: of two concurrent identical uploads exactly
/// one lands on disk, the other fails with `DuplicateContent` and its
/// staging file is discarded.
pub struct Store {
    dir: PathBuf,
    checksums: Mutex<HashSet<String>>,
    namer: Box<dyn Namer>,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Store::with_namer(dir, DateNamer::new(DEFAULT_NAME_FORMAT))
    }

    pub fn with_namer(dir: impl Into<PathBuf>, namer: impl Namer + 'static) -> Self {
        Store {
            dir: dir.into(),
            checksums: Mutex::new(HashSet::new()),
            namer: Box::new(namer),
        }
    }

    fn copy_and_record(&self, photo: &Photo) -> StageResult {
        let base_name = self.namer.name(photo);
        let dest = self.dir.join(format!("{}.{}", base_name, photo.format()));

        let mut source = File::open(photo.identifier())?;
        let mut staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempfile_in(&self.dir)?;

        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            staging.write_all(&buf[..n])?;
        }
        staging.flush()?;
        let checksum = format!("{:x}", hasher.finalize());

        let mut seen = match self.checksums.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !seen.insert(checksum.clone()) {
            // Dropping the staging handle removes the copy; nothing was
            // renamed into place.
            return Err(StageError::DuplicateContent(checksum));
        }
        if let Err(err) = staging.persist(&dest) {
            seen.remove(&checksum);
            return Err(StageError::Io(err.error));
        }
        drop(seen);

        debug!("Stored photo as {}", dest.display());
        Ok(Photo::new(
            dest,
            photo.width(),
            photo.height(),
            photo.format(),
            photo.created_at(),
        ))
    }
}

impl Stage for Store {
    fn process(&self, photo: Photo) -> StageResult {
        let result = self.copy_and_record(&photo);
        // The input temp file is consumed whatever the outcome.
        if let Err(err) = fs::remove_file(photo.identifier()) {
            warn!(
                "Could not remove consumed input {}: {}",
                photo.identifier().display(),
                err
            );
        }
        result
    }
}
