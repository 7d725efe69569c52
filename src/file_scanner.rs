use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::wall::Photowall;

/// Flat scan of the storage directory for files the wall should pick
/// back up on startup.
pub struct FileScanner {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
}

impl FileScanner {
    pub fn new(dir: impl Into<PathBuf>, allowed_extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            allowed_extensions: allowed_extensions.to_vec(),
        }
    }

    /// Returns each candidate file with its modification time, which
    /// stands in for the original upload time after a restart.
    pub fn scan(&self) -> Vec<(PathBuf, DateTime<Utc>)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Could not read directory {}: {}", self.dir.display(), err);
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if allowed_extension(name, &self.allowed_extensions).is_none() {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|metadata| metadata.modified().ok())
                .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|duration| {
                    DateTime::from_timestamp(duration.as_secs() as i64, 0).unwrap_or_else(Utc::now)
                })
                .unwrap_or_else(Utc::now);
            files.push((path, modified));
        }

        info!("Found {} photos in {}", files.len(), self.dir.display());
        files
    }
}

/// Matches a file name against the configured extension allow-list
/// (lower-cased, no leading dot). Returns the normalized extension.
pub fn allowed_extension(name: &str, allowed: &[String]) -> Option<String> {
    let ext = Path::new(name).extension().and_then(|e| e.to_str())?;
    let ext = ext.trim().to_lowercase();
    if allowed.iter().any(|a| *a == ext) {
        Some(ext)
    } else {
        None
    }
}

/// Re-validates every photo already sitting in `dir` through the wall's
/// current pipeline and waits until all of them settled. Run with an
/// import-only pipeline before the production stages are installed.
pub async fn restore_from_directory(wall: &Photowall, dir: &Path, allowed_extensions: &[String]) {
    info!("Restoring wall from directory: {}", dir.display());

    let scanner = FileScanner::new(dir, allowed_extensions);
    let mut pending = Vec::new();
    for (path, modified) in scanner.scan() {
        pending.push((path.clone(), wall.add_photo_from_path(path, modified)));
    }

    let mut restored = 0usize;
    for (path, handle) in pending {
        match handle.await {
            Ok(Ok(_)) => {
                restored += 1;
                info!("Restored photo: {}", path.display());
            }
            Ok(Err(err)) => warn!("Skipping {}: {}", path.display(), err),
            Err(err) => error!("Restore task for {} failed: {}", path.display(), err),
        }
    }
    info!("Restored {} photos", restored);
}
