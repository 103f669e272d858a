//! Advisory file locking for the work directory, so two processes don't open the same graph
//! concurrently.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockType {
  Shared,
  Exclusive,
}

/// Holds an advisory lock on `<work_dir>/LOCK` for the lifetime of the value; released on drop.
pub struct FileLock {
  file: File,
  path: PathBuf,
}

impl FileLock {
  pub fn acquire(work_dir: &Path, kind: LockType) -> Result<Self> {
    let path = work_dir.join("LOCK");
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .open(&path)?;
    match kind {
      LockType::Shared => file.try_lock_shared()?,
      LockType::Exclusive => file.try_lock_exclusive()?,
    }
    Ok(FileLock { file, path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for FileLock {
  fn drop(&mut self) {
    let _ = fs2::FileExt::unlock(&self.file);
  }
}
