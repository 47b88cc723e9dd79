//! Interactive front end: reads integers from stdin and prints the ones that
//! survive the filter chain each time the buffer is flushed.
//!
//! Usage: batch-pipeline [--interval SECS] [--capacity N] [--overflow drop-newest]

use batch_pipeline::{
    parse_interval, run_session, Console, OverflowPolicy, PipelineConfig, DEFAULT_CAPACITY,
};
use clap::{Parser, ValueEnum};
use std::io::{self, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "batch-pipeline")]
#[command(
    version,
    about = "Filter integers from stdin and flush them in timed batches",
    long_about = None
)]
struct Cli {
    /// Clear interval in seconds; prompted for when omitted
    #[arg(short, long, value_name = "SECS", value_parser = parse_interval)]
    interval: Option<std::time::Duration>,

    /// Number of values held between flushes
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// What to drop when the buffer is full
    #[arg(long, value_enum, default_value = "drop-oldest")]
    overflow: Overflow,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Overflow {
    DropOldest,
    DropNewest,
}

impl From<Overflow> for OverflowPolicy {
    fn from(overflow: Overflow) -> Self {
        match overflow {
            Overflow::DropOldest => OverflowPolicy::DropOldest,
            Overflow::DropNewest => OverflowPolicy::DropNewest,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = PipelineConfig::new()
        .with_buffer_capacity(cli.capacity)
        .with_overflow_policy(cli.overflow.into());
    if let Some(interval) = cli.interval {
        config = config.with_clear_interval(interval);
    }

    let report = run_session(BufReader::new(io::stdin()), Console::stdout(), config)?;
    tracing::info!(
        delivered = report.delivered,
        accepted = report.source.accepted,
        rejected = report.source.rejected,
        "session finished"
    );
    Ok(())
}
