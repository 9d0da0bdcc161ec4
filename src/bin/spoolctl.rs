#![forbid(unsafe_code)]

//! Standalone exerciser for the event spool core. Not part of the agent
//! proper -- the real HTTP sender and periodic scheduler are out of
//! scope for this crate, so `flush`/`dequeue-one` use a trivial built-in
//! consumer unless told otherwise with `--fail-with`.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use evspool::cleaner::Cleaner;
use evspool::config::SpoolConfig;
use evspool::dequeue::{ConsumeCode, Dequeuer, Select};
use evspool::enqueue::Enqueuer;
use evspool::status::StatusReporter;
use evspool::vocab::ServiceKey;

#[derive(Parser)]
#[command(name = "spoolctl", about = "Drive an evspool spool directory by hand")]
struct Cli {
    /// Directory holding pdq_*/tmp_*/err_* event files.
    #[arg(long, default_value = "/var/lib/evspool/queue")]
    queue_dir: PathBuf,
    /// Directory holding the backoff document.
    #[arg(long, default_value = "/var/lib/evspool/state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enqueue one event under a service key.
    Enqueue {
        svc_key: String,
        /// Path to a file holding the payload; reads stdin if omitted.
        payload_file: Option<PathBuf>,
    },
    /// Flush every eligible entry.
    Flush {
        #[arg(long)]
        fail_with: Option<FakeOutcome>,
    },
    /// Dequeue a single entry.
    DequeueOne {
        #[arg(long)]
        fail_with: Option<FakeOutcome>,
    },
    /// Reap aged err_*/tmp_* files.
    Cleanup {
        #[arg(long, default_value_t = 86400)]
        age_secs: u64,
    },
    /// Print an aggregate status document.
    Status {
        #[arg(long)]
        with_backoff: bool,
    },
}

/// Stand-ins for the real HTTP sender's `ConsumeCode` (the sender itself
/// is out of scope here), so `flush`/`dequeue-one` can be driven against
/// known outcomes without one.
#[derive(Clone, Copy, ValueEnum)]
enum FakeOutcome {
    NotConsumed,
    StopAll,
    BadEntry,
    BackoffNotConsumed,
    BackoffBadEntry,
}

impl From<FakeOutcome> for ConsumeCode {
    fn from(f: FakeOutcome) -> ConsumeCode {
        match f {
            FakeOutcome::NotConsumed => ConsumeCode::NotConsumed,
            FakeOutcome::StopAll => ConsumeCode::StopAll,
            FakeOutcome::BadEntry => ConsumeCode::BadEntry,
            FakeOutcome::BackoffNotConsumed => ConsumeCode::BackoffSvcKeyNotConsumed,
            FakeOutcome::BackoffBadEntry => ConsumeCode::BackoffSvcKeyBadEntry,
        }
    }
}

fn main() -> Result<()> {
    // Every diagnostic in the library goes through the `log` facade
    // (see src/prelude.rs), so bridge it into the `tracing` subscriber
    // before installing the subscriber -- otherwise none of it is seen.
    tracing_log::LogTracer::init().context("installing log-to-tracing bridge")?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = SpoolConfig {
        queue_dir: cli.queue_dir,
        state_dir: cli.state_dir,
        ..SpoolConfig::default()
    };

    match cli.command {
        Command::Enqueue {
            svc_key,
            payload_file,
        } => {
            config
                .verify_permissions()
                .context("spool directories not usable")?;
            let svc_key: ServiceKey = svc_key.as_str().try_into()?;
            let payload = match payload_file {
                Some(path) => {
                    fs::read(&path).with_context(|| format!("reading {:?}", path))?
                }
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let name = Enqueuer::new(config.queue_dir.clone()).enqueue(&svc_key, &payload)?;
            println!("{}", name);
        }

        Command::Flush { fail_with } => run_flush(&config, Select::All, fail_with)?,
        Command::DequeueOne { fail_with } => {
            run_flush(&config, Select::FirstOnly, fail_with)?
        }

        Command::Cleanup { age_secs } => {
            config
                .verify_permissions()
                .context("spool directories not usable")?;
            Cleaner::new(config.queue_dir.clone()).cleanup(age_secs);
            println!("cleanup complete");
        }

        Command::Status { with_backoff } => {
            let reporter = StatusReporter::new(&config);
            let status = reporter.get_status(with_backoff, true);
            let out = std::io::stdout();
            serde_json::to_writer_pretty(out.lock(), &status)?;
            println!();
        }
    }

    Ok(())
}

fn run_flush(config: &SpoolConfig, select: Select, fail_with: Option<FakeOutcome>) -> Result<()> {
    config
        .verify_permissions()
        .context("spool directories not usable")?;
    let dequeuer = Dequeuer::new(config);
    let code: ConsumeCode = fail_with.map(Into::into).unwrap_or(ConsumeCode::Consumed);

    match dequeuer.process(select, |_: &[u8], _: &str| code, || false) {
        Ok(()) => {
            println!("flush complete");
            Ok(())
        }
        Err(e) => bail!(e),
    }
}
