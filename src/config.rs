use std::path::PathBuf;

use crate::prelude::*;

/// The knobs the spool core needs. Loading this from a config file on disk
/// is the supervisor's job, out of scope here; this struct
/// only defines the shape and the defaults the original agent shipped with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Directory holding `pdq_*`/`tmp_*`/`err_*` event files and the
    /// dequeue lock file.
    pub queue_dir: PathBuf,
    /// Directory holding the backoff document.
    pub state_dir: PathBuf,
    /// Seconds a service key backs off for after its first failing
    /// dispatch in a flush.
    pub backoff_initial_delay_sec: u64,
    /// Multiplier applied to the delay on each consecutive failure.
    pub backoff_factor: u64,
    /// Consecutive failures at which a `BACKOFF_SVCKEY_BAD_ENTRY` quarantines
    /// the offending entry instead of just throttling the key.
    pub backoff_max_attempts: u32,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        SpoolConfig {
            queue_dir: PathBuf::from("/var/lib/evspool/queue"),
            state_dir: PathBuf::from("/var/lib/evspool/state"),
            backoff_initial_delay_sec: 2,
            backoff_factor: 2,
            backoff_max_attempts: 9,
        }
    }
}

impl SpoolConfig {
    /// Check both directories are readable/writable. Intended to be called
    /// once at agent startup; init failures here are user-visible
    /// permission errors.
    pub fn verify_permissions(&self) -> Result<(), SpoolError> {
        verify_dir(&self.queue_dir)?;
        verify_dir(&self.state_dir)?;
        Ok(())
    }

    pub fn dequeue_lockfile(&self) -> PathBuf {
        self.queue_dir.join("dequeue.lock")
    }
}

fn verify_dir(dir: &std::path::Path) -> Result<(), SpoolError> {
    let metadata = std::fs::metadata(dir).map_err(|_| SpoolError::DirPermission(dir.to_path_buf()))?;
    if !metadata.is_dir() {
        return Err(SpoolError::DirPermission(dir.to_path_buf()));
    }
    // A real permission probe requires a write attempt; existence +
    // directory-ness is what we can cheaply check up front. The actual
    // enqueue/lock/KVStore operations below will surface IO errors
    // directly if the directory turns out not to be writable.
    let readonly = metadata.permissions().readonly();
    if readonly {
        return Err(SpoolError::DirPermission(dir.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SpoolConfig::default();
        assert_eq!(cfg.backoff_initial_delay_sec, 2);
        assert_eq!(cfg.backoff_factor, 2);
        assert_eq!(cfg.backoff_max_attempts, 9);
    }

    #[test]
    fn verify_permissions_rejects_missing_dir() {
        let cfg = SpoolConfig {
            queue_dir: PathBuf::from("/nonexistent/evspool/queue"),
            state_dir: PathBuf::from("/nonexistent/evspool/state"),
            ..SpoolConfig::default()
        };
        assert!(cfg.verify_permissions().is_err());
    }

    #[test]
    fn verify_permissions_accepts_tempdir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SpoolConfig {
            queue_dir: tmp.path().to_path_buf(),
            state_dir: tmp.path().to_path_buf(),
            ..SpoolConfig::default()
        };
        assert!(cfg.verify_permissions().is_ok());
    }

    #[test]
    fn dequeue_lockfile_is_under_queue_dir() {
        let cfg = SpoolConfig::default();
        assert_eq!(cfg.dequeue_lockfile(), cfg.queue_dir.join("dequeue.lock"));
    }
}
