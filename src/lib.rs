#![forbid(unsafe_code)]

//! Directory-backed, crash-safe event spool with per-service-key backoff.
//! This crate is the core of a local agent that forwards host events to a
//! remote API: producers call [`enqueue::Enqueuer::enqueue`] concurrently
//! from any number of processes, and a single dequeue actor calls
//! [`dequeue::Dequeuer::process`] on a timer, composing a caller-supplied
//! [`dequeue::Consume`] with per-service-key backoff and poison-entry
//! quarantine.
//!
//! The HTTP sender that implements `Consume`, the periodic scheduler that
//! ticks `process`/`cleanup`, and the phone-home reporter that ships
//! [`status::StatusDocument`] out are all out of scope here.

pub mod backoff;
pub mod cleaner;
pub mod config;
pub mod dequeue;
pub mod enqueue;
pub mod error;
pub mod lock;
pub mod naming;
pub mod prelude;
pub mod status;
pub mod vocab;

#[cfg(test)]
pub mod test_util;

pub use config::SpoolConfig;
pub use dequeue::{Consume, ConsumeCode, Dequeuer, Select};
pub use enqueue::Enqueuer;
pub use error::SpoolError;
pub use vocab::ServiceKey;
