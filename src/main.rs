//! Civic Ledger CLI
//!
//! Replays an economy script against a fresh engine and prints the final
//! account summaries to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- script.csv > accounts.csv
//! cargo run -- --config economy.toml --journal journal.csv script.csv > accounts.csv
//! cargo run -- --seed 7 --log-level debug script.csv > accounts.csv
//! ```
//!
//! Logs go to stderr so they never mix with the CSV output.
//!
//! # Exit Codes
//!
//! - 0: Success (rejected script rows are logged, not fatal)
//! - 1: Error (unreadable input, invalid configuration, I/O failure)

use civic_ledger::cli;
use civic_ledger::config::EconomyConfig;
use civic_ledger::io::{spawn_worker, LogSink, Outbox, Replay, ScriptReader};
use civic_ledger::EconomyError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn run(args: &cli::CliArgs) -> Result<(), EconomyError> {
    let mut config = EconomyConfig::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let reader =
        ScriptReader::new(&args.input_file).map_err(|message| EconomyError::Io { message })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    runtime.block_on(async {
        let (outbox, worker) = if config.notifications.enabled {
            let (outbox, worker) = spawn_worker(Arc::new(LogSink), config.notifications.timeout());
            (outbox, Some(worker))
        } else {
            (Outbox::disabled(), None)
        };

        let mut replay = Replay::new(config, outbox);
        replay.run(reader)?;

        let stdout = std::io::stdout();
        let mut output = BufWriter::new(stdout.lock());
        let mut journal = match &args.journal {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        };
        replay.finish(
            &mut output,
            journal.as_mut().map(|journal| journal as &mut dyn Write),
        )?;
        output.flush()?;
        if let Some(journal) = journal.as_mut() {
            journal.flush()?;
        }

        // Dropping the replay drops the last outbox, which lets the worker drain and stop.
        drop(replay);
        if let Some(worker) = worker {
            match worker.await {
                Ok(delivered) => tracing::debug!(delivered, "Notifications delivered"),
                Err(e) => tracing::warn!(error = %e, "Notification worker failed"),
            }
        }
        Ok::<(), EconomyError>(())
    })
}

fn main() {
    let args = cli::parse_args();
    init_tracing(&args.log_level);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
