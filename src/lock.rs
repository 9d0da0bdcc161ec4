use crate::prelude::*;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// RAII guard around an OS-level exclusive lock on a fixed path. The
/// lock is released when the guard is dropped -- on every exit path of
/// the holder, success or failure, with no separate `release()` to
/// remember to call.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Blocks until the lock is acquired.
    pub fn acquire(path: &Path) -> Result<FileLock, SpoolError> {
        let file = open(path)?;
        retry_interrupted(|| file.lock_exclusive())?;
        Ok(FileLock {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Fails immediately with `LockUnavailable` instead of blocking.
    pub fn try_acquire(path: &Path) -> Result<FileLock, SpoolError> {
        let file = open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(FileLock {
                file,
                path: path.to_path_buf(),
            }),
            Err(_) => Err(SpoolError::LockUnavailable(path.to_path_buf())),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to release lock on {:?}: {}", self.path, e);
        }
    }
}

fn open(path: &Path) -> Result<File, SpoolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().write(true).create(true).open(path)?)
}

/// `flock(2)` doesn't restart automatically on `EINTR`, so retry by hand.
fn retry_interrupted<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn try_acquire_fails_while_held() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dequeue.lock");

        let _held = FileLock::acquire(&path).unwrap();
        let err = FileLock::try_acquire(&path).unwrap_err();
        assert!(matches!(err, SpoolError::LockUnavailable(_)));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dequeue.lock");

        {
            let _held = FileLock::acquire(&path).unwrap();
        }
        let _again = FileLock::try_acquire(&path).unwrap();
    }

    #[test]
    fn acquire_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("dequeue.lock");
        let _held = FileLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
