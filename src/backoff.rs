use crate::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persisted per-service-key backoff state. Keys present
/// in `next_retries` always also appear in `attempts` with `attempts[k] >=
/// 1`; absence of a key means "no backoff, attempts = 0".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackoffDocument {
    #[serde(default)]
    pub attempts: HashMap<ServiceKey, u32>,
    #[serde(default)]
    pub next_retries: HashMap<ServiceKey, i64>,
}

impl BackoffDocument {
    /// True if `key` has a `next_retries` entry at or after `now_s`.
    pub fn is_throttled(&self, key: &ServiceKey, now_s: i64) -> bool {
        self.next_retries.get(key).copied().unwrap_or(0) >= now_s
    }

    /// Bump formula:
    /// `cur = attempts.get(k, 0) + 1; next_retries[k] = now_s + initial_delay
    /// * factor^(cur-1); attempts[k] = cur`. There is no reset path on
    /// success (see DESIGN.md for why attempts stay sticky across a
    /// successful dispatch). Returns the post-bump attempt count.
    pub fn bump(
        &mut self,
        key: &ServiceKey,
        now_s: i64,
        initial_delay_sec: u64,
        factor: u64,
    ) -> u32 {
        let cur = self.attempts.get(key).copied().unwrap_or(0) + 1;
        let delay = initial_delay_sec.saturating_mul(factor.saturating_pow(cur.saturating_sub(1)));
        self.next_retries.insert(key.clone(), now_s.saturating_add(delay as i64));
        self.attempts.insert(key.clone(), cur);
        cur
    }
}

/// Durable key/value blob under the state directory. Unlike a general
/// key/value store keyed by an arbitrary path, this store has exactly one
/// document -- the backoff state -- so the "key" is fixed at construction
/// (`state_dir/backoff.json`).
pub struct BackoffStore {
    path: PathBuf,
}

impl BackoffStore {
    pub fn new(state_dir: &Path) -> BackoffStore {
        BackoffStore {
            path: state_dir.join("backoff.json"),
        }
    }

    /// `None` on "not initialized" or any read/parse failure; the caller
    /// treats that as empty state and keeps the flush going.
    pub fn get(&self) -> Option<BackoffDocument> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("could not read backoff document at {:?}: {}", self.path, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(
                    "backoff document at {:?} is corrupt, treating as empty: {}",
                    self.path, e
                );
                None
            }
        }
    }

    /// Write-to-temp + rename on the same filesystem, so a reader never
    /// observes a partially-written document.
    pub fn set(&self, doc: &BackoffDocument) -> Result<(), SpoolError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, doc)
            .map_err(|e| SpoolError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        tmp.flush()?;
        tmp.as_file().sync_data()?;
        tmp.persist(&self.path).map_err(|e| SpoolError::Io(e.error))?;
        Ok(())
    }
}
