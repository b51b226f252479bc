//! Exclusive workspace lock, held for as long as a [`Workspace`](crate::Workspace)
//! handle is alive.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use superanalyze_shared::{Result, SuperAnalyzeError};

pub(crate) struct WorkspaceLock {
    file: File,
}

impl WorkspaceLock {
    /// Take the lock without waiting. A workspace already locked by another
    /// handle is a store error.
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| SuperAnalyzeError::store_io(path, e))?;

        file.try_lock_exclusive().map_err(|e| {
            SuperAnalyzeError::Store(format!(
                "workspace in use (lock {} held by another run): {e}",
                path.display()
            ))
        })?;

        Ok(Self { file })
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
