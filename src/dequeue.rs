use crate::backoff::{BackoffDocument, BackoffStore};
use crate::config::SpoolConfig;
use crate::lock::FileLock;
use crate::naming;
use crate::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of a single `Consume::consume` call. A closed Rust enum rather
/// than a raw integer code, so an invalid-code failure path is unreachable
/// by construction rather than a runtime check -- `SpoolError::InvalidConsumeCode`
/// is kept in the error taxonomy for documentation parity but nothing in
/// this crate can actually produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeCode {
    /// Success; delete the event.
    Consumed,
    /// Transient failure; leave for next flush, no backoff.
    NotConsumed,
    /// Abort the flush immediately.
    StopAll,
    /// Event is poison; quarantine it.
    BadEntry,
    /// Throttle this service key; keep the event.
    BackoffSvcKeyNotConsumed,
    /// Throttle this service key; quarantine the entry if at max attempts.
    BackoffSvcKeyBadEntry,
}

/// The user-supplied dispatch capability. Modeled as a trait rather than
/// a bare `Fn` bound, so a caller can implement it on a long-lived object
/// (an HTTP client, a test double, a channel handle) that holds its own
/// state across calls. A blanket impl below keeps the ergonomic closure
/// call site for tests and the demo binary.
pub trait Consume {
    fn consume(&mut self, payload: &[u8], event_id: &str) -> ConsumeCode;
}

impl<F> Consume for F
where
    F: FnMut(&[u8], &str) -> ConsumeCode,
{
    fn consume(&mut self, payload: &[u8], event_id: &str) -> ConsumeCode {
        self(payload, event_id)
    }
}

/// Which entries a `process` call dispatches to `consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Select {
    /// Single-step dequeue: only the first eligible entry.
    FirstOnly,
    /// Flush: every eligible entry.
    All,
}

/// The flush engine -- ordered scan, dequeue lock, per-entry dispatch to
/// `consume`, backoff bookkeeping, quarantine, and stop-all semantics.
pub struct Dequeuer {
    queue_dir: PathBuf,
    backoff: BackoffStore,
    backoff_initial_delay_sec: u64,
    backoff_factor: u64,
    backoff_max_attempts: u32,
}

impl Dequeuer {
    pub fn new(config: &SpoolConfig) -> Dequeuer {
        Dequeuer {
            queue_dir: config.queue_dir.clone(),
            backoff: BackoffStore::new(&config.state_dir),
            backoff_initial_delay_sec: config.backoff_initial_delay_sec,
            backoff_factor: config.backoff_factor,
            backoff_max_attempts: config.backoff_max_attempts,
        }
    }

    /// Runs a full flush. Holds the dequeue lock for the entire call,
    /// including every `consume` invocation.
    pub fn process(
        &self,
        select: Select,
        mut consume: impl Consume,
        mut stop_hint: impl FnMut() -> bool,
    ) -> Result<(), SpoolError> {
        let _lock = FileLock::acquire(&self.queue_dir.join("dequeue.lock"))?;

        let mut doc = self.backoff.get().unwrap_or_else(|| {
            warn!("no usable backoff state, starting this flush from empty");
            BackoffDocument::default()
        });

        let mut names = list_prefixed(&self.queue_dir, "pdq_");
        if names.is_empty() {
            return Err(SpoolError::EmptyQueue);
        }
        if select == Select::FirstOnly {
            names.truncate(1);
        }

        let mut err_svc_keys: HashSet<ServiceKey> = HashSet::new();

        'flush: for name in names {
            match naming::decode(&name) {
                Err(e) => {
                    warn!("flush: skipping undecodable entry {:?}: {}", name, e);
                }
                Ok((_, _, svc_key)) => {
                    let now_s = now_s();
                    if err_svc_keys.contains(&svc_key) || doc.is_throttled(&svc_key, now_s) {
                        // throttled; this entry waits for a later flush
                    } else {
                        let path = self.queue_dir.join(&name);
                        match fs::read(&path) {
                            Err(e) => {
                                warn!("flush: leaving unreadable entry {:?} for later: {}", name, e);
                            }
                            Ok(body) => match consume.consume(&body, &name) {
                                ConsumeCode::Consumed => {
                                    if let Err(e) = fs::remove_file(&path) {
                                        warn!(
                                            "flush: failed to remove consumed entry {:?}: {}",
                                            name, e
                                        );
                                    }
                                }
                                ConsumeCode::NotConsumed => {}
                                ConsumeCode::StopAll => break 'flush,
                                ConsumeCode::BadEntry => quarantine(&self.queue_dir, &name),
                                ConsumeCode::BackoffSvcKeyNotConsumed => {
                                    err_svc_keys.insert(svc_key.clone());
                                    doc.bump(
                                        &svc_key,
                                        now_s,
                                        self.backoff_initial_delay_sec,
                                        self.backoff_factor,
                                    );
                                }
                                ConsumeCode::BackoffSvcKeyBadEntry => {
                                    err_svc_keys.insert(svc_key.clone());
                                    let cur = doc.bump(
                                        &svc_key,
                                        now_s,
                                        self.backoff_initial_delay_sec,
                                        self.backoff_factor,
                                    );
                                    if cur >= self.backoff_max_attempts {
                                        quarantine(&self.queue_dir, &name);
                                        // The bad entry is dealt with; give the rest of
                                        // this key's entries a chance in the same flush.
                                        err_svc_keys.remove(&svc_key);
                                    }
                                }
                            },
                        }
                    }
                }
            }

            if stop_hint() {
                break;
            }
        }

        if let Err(e) = self.backoff.set(&doc) {
            warn!("flush: failed to persist backoff state: {}", e);
        }

        Ok(())
    }
}

fn quarantine(queue_dir: &Path, name: &str) {
    let errname = name.replacen("pdq_", "err_", 1);
    let from = queue_dir.join(name);
    let to = queue_dir.join(&errname);
    info!("quarantining {:?} as {:?}", name, errname);
    if let Err(e) = fs::rename(&from, &to) {
        warn!("failed to quarantine {:?}: {}", name, e);
    }
}

fn list_prefixed(queue_dir: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(queue_dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.starts_with(prefix))
            .collect(),
        Err(e) => {
            warn!("could not list {:?}: {}", queue_dir, e);
            Vec::new()
        }
    };
    names.sort();
    names
}

fn now_s() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
