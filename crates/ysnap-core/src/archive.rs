//! Latest-snapshot file plus a timestamp-named history directory.

use crate::error::StorageError;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Layout of history entries, second resolution in local time.
pub const HISTORY_NAME_FORMAT: &str = "%Y-%m-%d %H-%M-%S";
pub const HISTORY_EXTENSION: &str = "jpg";

#[derive(Debug, Clone)]
pub struct ImageArchiver {
    latest_path: PathBuf,
    history_dir: PathBuf,
}

/// Where one stored snapshot ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub latest_path: PathBuf,
    pub history_path: PathBuf,
    pub bytes: usize,
}

impl ImageArchiver {
    pub fn new(latest_path: impl Into<PathBuf>, history_dir: impl Into<PathBuf>) -> Self {
        Self {
            latest_path: latest_path.into(),
            history_dir: history_dir.into(),
        }
    }

    pub fn latest_path(&self) -> &Path {
        &self.latest_path
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    pub fn store(&self, bytes: &[u8]) -> Result<StoredImage, StorageError> {
        self.store_at(bytes, Local::now())
    }

    /// Replace the latest file with `bytes` and copy it into the history
    /// directory under the name derived from `at`. An entry for the same
    /// second is overwritten.
    pub fn store_at(
        &self,
        bytes: &[u8],
        at: DateTime<Local>,
    ) -> Result<StoredImage, StorageError> {
        self.write_latest(bytes)?;

        fs::create_dir_all(&self.history_dir)
            .map_err(|err| StorageError::new("create history dir", &self.history_dir, err))?;
        let history_path = self.history_dir.join(history_file_name(at));
        fs::copy(&self.latest_path, &history_path)
            .map_err(|err| StorageError::new("copy into history", &history_path, err))?;

        debug!(
            latest = %self.latest_path.display(),
            history = %history_path.display(),
            bytes = bytes.len(),
            "snapshot stored"
        );
        Ok(StoredImage {
            latest_path: self.latest_path.clone(),
            history_path,
            bytes: bytes.len(),
        })
    }

    fn write_latest(&self, bytes: &[u8]) -> Result<(), StorageError> {
        let path = &self.latest_path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| StorageError::new("create latest dir", parent, err))?;
        }
        if path.exists() {
            fs::remove_file(path).map_err(|err| StorageError::new("remove latest", path, err))?;
        }
        let mut file =
            File::create(path).map_err(|err| StorageError::new("create latest", path, err))?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|err| StorageError::new("write latest", path, err))
    }
}

pub fn history_file_name(at: DateTime<Local>) -> String {
    format!("{}.{HISTORY_EXTENSION}", at.format(HISTORY_NAME_FORMAT))
}
