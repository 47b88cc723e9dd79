//! The interactive program: prompt for the clear interval, then stream
//! stdin-style input through the filter chain into the console.

use crate::cancel::CancelToken;
use crate::config::{read_interval, PipelineConfig};
use crate::console::Console;
use crate::error::{PipelineError, Result};
use crate::pipeline::Pipeline;
use crate::sink::consume;
use crate::source::{LineSource, SourceSummary};
use crate::stage::{divisible_by_three_filter, positive_filter, BatchStage};
use std::io::BufRead;
use std::time::Duration;
use tracing::{debug, info};

/// How long workers get to exit once the session is over
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub clear_interval: Duration,
    pub source: SourceSummary,
    /// Values printed as processed
    pub delivered: u64,
}

/// Run one full session over `reader`, writing everything user-facing to
/// `console`.
///
/// If `config` carries no clear interval it is read from `reader` first.
/// The session ends on the exit keyword, or at end of input once every
/// buffered value has been flushed.
pub fn run_session<R>(
    mut reader: R,
    console: Console,
    config: PipelineConfig,
) -> Result<SessionReport>
where
    R: BufRead + Send + 'static,
{
    config.validate()?;
    console.banner();

    let clear_interval = match config.clear_interval {
        Some(interval) => interval,
        None => {
            console.prompt_interval();
            read_interval(&mut reader, &console)?
        }
    };
    let config = config.with_clear_interval(clear_interval);
    info!(?clear_interval, capacity = config.buffer_capacity, "starting pipeline");

    let cancel = CancelToken::new();
    let pipeline = Pipeline::builder(cancel.clone())
        .add_stage(positive_filter())
        .add_stage(divisible_by_three_filter())
        .add_stage(BatchStage::from_config(&config)?)
        .build()?;

    console.prompt_data();
    let (values, source) = LineSource::new(reader, cancel.clone(), console.clone()).spawn()?;
    let running = pipeline.run(values)?;

    let delivered = consume(running.cancel_token(), &running.output(), &console);
    running.cancel_token().cancel();

    let source = source
        .join()
        .map_err(|_| PipelineError::ThreadError("source panicked".into()))?;
    debug!("{}", running.metrics_summary());
    running.shutdown(SHUTDOWN_TIMEOUT)?;
    console.farewell();

    Ok(SessionReport {
        clear_interval,
        source,
        delivered,
    })
}
