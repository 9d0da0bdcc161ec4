use crate::naming::{self, EventKind};
use crate::prelude::*;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Cap on consecutive exclusive-create collisions before `enqueue` gives up.
const MAX_RETRIES: u32 = 100;

/// Atomic, crash-safe single-event writer. Any number of these can run
/// concurrently, in the same or different processes, without coordinating
/// with each other or with the `Dequeuer` -- the filesystem's
/// `O_CREAT|O_EXCL` and rename primitives are the only synchronization
/// needed.
pub struct Enqueuer {
    queue_dir: PathBuf,
}

impl Enqueuer {
    pub fn new(queue_dir: impl Into<PathBuf>) -> Enqueuer {
        Enqueuer {
            queue_dir: queue_dir.into(),
        }
    }

    /// Writes `payload` under `service_key` and returns the `pdq_*`
    /// basename once it's durably visible in the queue.
    pub fn enqueue(&self, service_key: &ServiceKey, payload: &[u8]) -> Result<String, SpoolError> {
        let (_tmp_name, tmp_path, mut tmp_file) =
            create_excl_with_retry(&self.queue_dir, EventKind::Tmp, service_key)?;
        tmp_file.write_all(payload)?;
        // This is the most we can do for durability without writing a
        // database.
        tmp_file.sync_data()?;
        drop(tmp_file);

        let (pdq_name, pdq_path, pdq_file) =
            create_excl_with_retry(&self.queue_dir, EventKind::Pdq, service_key)?;
        // Reserving the name is what wins the race; the handle itself can
        // close before the rename lands.
        drop(pdq_file);

        fs::rename(&tmp_path, &pdq_path)?;
        Ok(pdq_name)
    }
}

fn create_excl_with_retry(
    queue_dir: &Path,
    kind: EventKind,
    service_key: &ServiceKey,
) -> Result<(String, PathBuf, fs::File), SpoolError> {
    let mut attempts = 0u32;
    loop {
        let ts_ms = now_ms();
        let name = naming::encode(kind, ts_ms, service_key);
        let path = queue_dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((name, path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                attempts += 1;
                if attempts >= MAX_RETRIES {
                    return Err(SpoolError::Congested {
                        fname_hint: name,
                        attempts,
                    });
                }
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::naming::decode;

    fn key(s: &str) -> ServiceKey {
        s.try_into().unwrap()
    }

    #[test]
    fn enqueue_produces_exactly_one_pdq_file_with_the_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let enqueuer = Enqueuer::new(tmp.path());

        let name = enqueuer.enqueue(&key("keyX"), b"hello").unwrap();
        assert!(name.starts_with("pdq_"));
        assert!(name.ends_with("_keyX.txt"));

        let (kind, _, svc_key) = decode(&name).unwrap();
        assert_eq!(kind, crate::naming::EventKind::Pdq);
        assert_eq!(svc_key, key("keyX"));

        let entries: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().into_string().unwrap())
            .filter(|n| n.starts_with("pdq_"))
            .collect();
        assert_eq!(entries, vec![name.clone()]);

        assert_eq!(fs::read(tmp.path().join(&name)).unwrap(), b"hello");
        // no stray tmp files left behind on the success path
        assert!(fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .all(|e| !e.file_name().to_string_lossy().starts_with("tmp_")));
    }

    #[test]
    fn sequential_enqueues_sort_in_enqueue_order() {
        let tmp = tempfile::tempdir().unwrap();
        let enqueuer = Enqueuer::new(tmp.path());

        let n1 = enqueuer.enqueue(&key("keyX"), b"a1").unwrap();
        let n2 = enqueuer.enqueue(&key("keyX"), b"a2").unwrap();
        let n3 = enqueuer.enqueue(&key("keyX"), b"a3").unwrap();

        assert!(n1 < n2);
        assert!(n2 < n3);
    }

    #[test]
    fn different_service_keys_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let enqueuer = Enqueuer::new(tmp.path());

        let a = enqueuer.enqueue(&key("keyA"), b"1").unwrap();
        let b = enqueuer.enqueue(&key("keyB"), b"2").unwrap();
        assert_ne!(a, b);
    }
}
