//! Shared fixtures for `#[cfg(test)]` modules throughout the crate.

use crate::backoff::BackoffStore;
use crate::config::SpoolConfig;
use tempfile::TempDir;

/// A `SpoolConfig` rooted in a fresh temp directory, with the directories
/// it names already created. Keeps the `TempDir` alive so it isn't cleaned
/// up out from under the test.
pub struct TestSpool {
    pub config: SpoolConfig,
    _queue_tmp: TempDir,
    _state_tmp: TempDir,
}

impl TestSpool {
    pub fn new() -> Self {
        let queue_tmp = tempfile::tempdir().unwrap();
        let state_tmp = tempfile::tempdir().unwrap();
        let config = SpoolConfig {
            queue_dir: queue_tmp.path().to_path_buf(),
            state_dir: state_tmp.path().to_path_buf(),
            ..SpoolConfig::default()
        };
        TestSpool {
            config,
            _queue_tmp: queue_tmp,
            _state_tmp: state_tmp,
        }
    }

    pub fn with_backoff(mut self, initial_delay_sec: u64, factor: u64, max_attempts: u32) -> Self {
        self.config.backoff_initial_delay_sec = initial_delay_sec;
        self.config.backoff_factor = factor;
        self.config.backoff_max_attempts = max_attempts;
        self
    }

    pub fn backoff_store(&self) -> BackoffStore {
        BackoffStore::new(&self.config.state_dir)
    }
}
