use crate::backoff::{BackoffDocument, BackoffStore};
use crate::config::SpoolConfig;
use crate::naming::{self, EventKind};
use crate::prelude::*;
use std::fs;
use std::path::PathBuf;

/// Read-only aggregation of queue contents and backoff state for a
/// phone-home/heartbeat collaborator. Never takes the dequeue lock --
/// results are a best-effort snapshot.
pub struct StatusReporter {
    queue_dir: PathBuf,
    backoff: BackoffStore,
}

/// The phone-home payload shape: per-kind totals plus, optionally, a
/// per-service-key breakdown of pending entries and the raw backoff
/// document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusDocument {
    pub pdq_count: usize,
    pub tmp_count: usize,
    pub err_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_by_svc_key: Option<HashMap<ServiceKey, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffDocument>,
}

impl StatusReporter {
    pub fn new(config: &SpoolConfig) -> StatusReporter {
        StatusReporter {
            queue_dir: config.queue_dir.clone(),
            backoff: BackoffStore::new(&config.state_dir),
        }
    }

    /// Pending (`pdq_*`) entry counts grouped by service key.
    pub fn enumerate_pending(&self) -> HashMap<ServiceKey, usize> {
        let mut counts = HashMap::new();
        for name in self.list_names() {
            if let Ok((EventKind::Pdq, _, svc_key)) = naming::decode(&name) {
                *counts.entry(svc_key).or_insert(0) += 1;
            }
        }
        counts
    }

    /// `aggregated` controls whether the per-service-key breakdown is
    /// included alongside the per-kind totals; `throttle_info` controls
    /// whether the current backoff document is attached.
    pub fn get_status(&self, throttle_info: bool, aggregated: bool) -> StatusDocument {
        let mut doc = StatusDocument::default();
        let mut pending_by_svc_key: HashMap<ServiceKey, usize> = HashMap::new();

        for name in self.list_names() {
            match naming::decode(&name) {
                Ok((EventKind::Pdq, _, svc_key)) => {
                    doc.pdq_count += 1;
                    if aggregated {
                        *pending_by_svc_key.entry(svc_key).or_insert(0) += 1;
                    }
                }
                Ok((EventKind::Tmp, _, _)) => doc.tmp_count += 1,
                Ok((EventKind::Err, _, _)) => doc.err_count += 1,
                Err(_) => {}
            }
        }

        if aggregated {
            doc.pending_by_svc_key = Some(pending_by_svc_key);
        }
        if throttle_info {
            doc.backoff = self.backoff.get();
        }
        doc
    }

    fn list_names(&self) -> Vec<String> {
        match fs::read_dir(&self.queue_dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(e) => {
                warn!("status: could not list {:?}: {}", self.queue_dir, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enqueue::Enqueuer;
    use crate::test_util::TestSpool;

    fn key(s: &str) -> ServiceKey {
        s.try_into().unwrap()
    }

    #[test]
    fn enumerate_pending_counts_by_svc_key() {
        let spool = TestSpool::new();
        let enqueuer = Enqueuer::new(&spool.config.queue_dir);
        enqueuer.enqueue(&key("keyA"), b"1").unwrap();
        enqueuer.enqueue(&key("keyA"), b"2").unwrap();
        enqueuer.enqueue(&key("keyB"), b"3").unwrap();

        let reporter = StatusReporter::new(&spool.config);
        let counts = reporter.enumerate_pending();
        assert_eq!(counts[&key("keyA")], 2);
        assert_eq!(counts[&key("keyB")], 1);
    }

    #[test]
    fn get_status_reports_per_kind_totals() {
        let spool = TestSpool::new();
        let enqueuer = Enqueuer::new(&spool.config.queue_dir);
        enqueuer.enqueue(&key("keyA"), b"1").unwrap();

        let reporter = StatusReporter::new(&spool.config);
        let status = reporter.get_status(false, false);
        assert_eq!(status.pdq_count, 1);
        assert_eq!(status.tmp_count, 0);
        assert_eq!(status.err_count, 0);
        assert!(status.pending_by_svc_key.is_none());
        assert!(status.backoff.is_none());
    }

    #[test]
    fn get_status_includes_backoff_only_when_requested() {
        let spool = TestSpool::new();
        spool.backoff_store().set(&BackoffDocument::default()).unwrap();

        let reporter = StatusReporter::new(&spool.config);
        assert!(reporter.get_status(false, false).backoff.is_none());
        assert!(reporter.get_status(true, false).backoff.is_some());
    }

    #[test]
    fn get_status_includes_per_key_breakdown_only_when_aggregated() {
        let spool = TestSpool::new();
        let enqueuer = Enqueuer::new(&spool.config.queue_dir);
        enqueuer.enqueue(&key("keyA"), b"1").unwrap();

        let reporter = StatusReporter::new(&spool.config);
        assert!(reporter.get_status(false, false).pending_by_svc_key.is_none());
        let with_agg = reporter.get_status(false, true).pending_by_svc_key.unwrap();
        assert_eq!(with_agg[&key("keyA")], 1);
    }
}
