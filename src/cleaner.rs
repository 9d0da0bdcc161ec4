use crate::naming;
use crate::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Age-based garbage collector for quarantined (`err_`) and orphaned
/// temp (`tmp_`) files. `pdq_*` files are never touched by age -- they
/// only leave the queue through consume or quarantine. Snapshots the
/// directory listing into a `Vec` before removing anything, so a removal
/// can never perturb the iteration in progress.
pub struct Cleaner {
    queue_dir: PathBuf,
}

impl Cleaner {
    pub fn new(queue_dir: impl Into<PathBuf>) -> Cleaner {
        Cleaner {
            queue_dir: queue_dir.into(),
        }
    }

    /// Removes `err_*`/`tmp_*` files whose encoded timestamp is older than
    /// `age_seconds`.
    pub fn cleanup(&self, age_seconds: u64) {
        let cutoff_ms = now_ms().saturating_sub(age_seconds.saturating_mul(1000));
        self.sweep_prefix("err_", cutoff_ms);
        self.sweep_prefix("tmp_", cutoff_ms);
    }

    fn sweep_prefix(&self, prefix: &str, cutoff_ms: u64) {
        let entries: Vec<String> = match fs::read_dir(&self.queue_dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| name.starts_with(prefix))
                .collect(),
            Err(e) => {
                warn!("cleanup: could not list {:?}: {}", self.queue_dir, e);
                return;
            }
        };

        for name in entries {
            let ts_ms = match naming::decode(&name) {
                Ok((_, ts_ms, _)) => ts_ms,
                Err(_) => {
                    info!("cleanup: ignoring invalid file name {:?}", name);
                    continue;
                }
            };
            if ts_ms >= cutoff_ms {
                continue;
            }
            let path = self.queue_dir.join(&name);
            if let Err(e) = fs::remove_file(&path) {
                warn!("cleanup: could not remove {:?}: {}", path, e);
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
