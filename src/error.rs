use thiserror::Error;

/// Leaf error type for the spool core.
///
/// Most of these never escape the crate: `EmptyQueue` and `Congested` are
/// the only variants a caller is expected to match on and act upon
/// (scheduler logs "nothing to do" / producer retries later). Everything
/// else is either a programming error (`InvalidConsumeCode`) or gets logged
/// and swallowed at the point it's produced.
#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("queue is empty")]
    EmptyQueue,

    #[error("too many collisions creating {fname_hint:?} ({attempts} attempts)")]
    Congested { fname_hint: String, attempts: u32 },

    #[error("malformed event file name {0:?}")]
    MalformedName(String),

    #[error("dequeue lock unavailable at {0:?}")]
    LockUnavailable(std::path::PathBuf),

    #[error("consume callback returned an invalid code for {0:?}")]
    InvalidConsumeCode(String),

    #[error("{0:?} is not readable/writable, check permissions")]
    DirPermission(std::path::PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
