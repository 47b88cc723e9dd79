use crate::buffer::{CircularBuffer, OverflowPolicy};
use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crossbeam::channel::{bounded, select, tick, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Trait for a processing stage in the pipeline.
///
/// A stage consumes one sequence of integers and produces another. Launching
/// it spawns the activities it needs through the [`StageContext`] and hands
/// back the receiving end of its output. Every activity must watch the
/// context's cancellation token and exit promptly once it fires, and must
/// drop its output sender when its input closes.
pub trait Stage: Send + 'static {
    /// Wire the stage to `input` and start its workers
    fn launch(
        self: Box<Self>,
        input: Receiver<i64>,
        ctx: &mut StageContext,
    ) -> Result<Receiver<i64>>;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// A named thread owned by a running pipeline
#[derive(Debug)]
pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread, reporting a panic as `ThreadError`
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| PipelineError::ThreadError(format!("worker {} panicked", self.name)))
    }
}

/// Everything a stage gets from the pipeline while it is being launched
pub struct StageContext {
    stage_name: String,
    cancel: CancelToken,
    metrics: StageMetrics,
    workers: Vec<Worker>,
}

impl StageContext {
    pub fn new(stage_name: impl Into<String>, cancel: CancelToken, metrics: StageMetrics) -> Self {
        Self {
            stage_name: stage_name.into(),
            cancel,
            metrics,
            workers: Vec::new(),
        }
    }

    /// The pipeline-wide cancellation token
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Spawn a worker thread named `<stage>-<role>`
    pub fn spawn<F>(&mut self, role: &str, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = format!("{}-{}", self.stage_name, role);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|source| PipelineError::Spawn {
                name: name.clone(),
                source,
            })?;
        self.workers.push(Worker { name, handle });
        Ok(())
    }

    pub fn into_workers(self) -> Vec<Worker> {
        self.workers
    }
}

/// Hand `value` to the next stage unless cancellation wins the race.
///
/// Returns `false` when the caller should stop: either the token fired or
/// the receiving side is gone.
pub fn forward(cancel: &CancelToken, output: &Sender<i64>, value: i64) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    select! {
        send(output, value) -> res => res.is_ok(),
        recv(cancel.signal()) -> _ => false,
    }
}

/// Forwards a value iff it is greater than zero
pub fn is_positive(value: i64) -> bool {
    value > 0
}

/// Forwards a value iff it is a non-zero multiple of three
pub fn is_nonzero_multiple_of_three(value: i64) -> bool {
    value != 0 && value % 3 == 0
}

/// Stage dropping zero and negative values
pub fn positive_filter() -> FilterStage<fn(i64) -> bool> {
    FilterStage::new("positive", is_positive)
}

/// Stage keeping only non-zero multiples of three
pub fn divisible_by_three_filter() -> FilterStage<fn(i64) -> bool> {
    FilterStage::new("divisible-by-three", is_nonzero_multiple_of_three)
}

/// A filtering stage that passes through values matching a predicate
#[derive(Debug)]
pub struct FilterStage<F>
where
    F: Fn(i64) -> bool + Send + 'static,
{
    name: String,
    predicate: F,
}

impl<F> FilterStage<F>
where
    F: Fn(i64) -> bool + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    /// Apply the predicate to a single value
    pub fn accepts(&self, value: i64) -> bool {
        (self.predicate)(value)
    }
}

impl<F> Stage for FilterStage<F>
where
    F: Fn(i64) -> bool + Send + 'static,
{
    fn launch(
        self: Box<Self>,
        input: Receiver<i64>,
        ctx: &mut StageContext,
    ) -> Result<Receiver<i64>> {
        let FilterStage { name, predicate } = *self;
        let (output, next) = bounded(0);
        let cancel = ctx.cancel().clone();
        let metrics = ctx.metrics().clone();

        ctx.spawn("filter", move || {
            debug!(stage = %name, "filter started");
            loop {
                select! {
                    recv(input) -> msg => {
                        let value = match msg {
                            Ok(value) => value,
                            Err(_) => {
                                debug!(stage = %name, "input closed");
                                break;
                            }
                        };
                        if cancel.is_cancelled() {
                            break;
                        }
                        metrics.record_received();
                        if !predicate(value) {
                            metrics.record_discarded();
                            continue;
                        }
                        if !forward(&cancel, &output, value) {
                            break;
                        }
                        metrics.record_forwarded();
                    }
                    recv(cancel.signal()) -> _ => break,
                }
            }
            debug!(stage = %name, "filter stopped");
        })?;

        Ok(next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Buffers values in a [`CircularBuffer`] and flushes them downstream every
/// clear interval.
///
/// Runs two workers: an ingest loop pushing every received value into the
/// buffer, and a flush loop draining it on a fixed tick. When the input
/// closes the flush loop drains one last time before closing the output.
#[derive(Debug)]
pub struct BatchStage {
    name: String,
    buffer: CircularBuffer<i64>,
    interval: Duration,
}

impl BatchStage {
    pub fn new(capacity: usize, interval: Duration, policy: OverflowPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::ConfigError(
                "buffer capacity must be at least 1".into(),
            ));
        }
        if interval.is_zero() {
            return Err(PipelineError::ConfigError(
                "clear interval must be positive".into(),
            ));
        }
        Ok(Self {
            name: "batch".into(),
            buffer: CircularBuffer::with_policy(capacity, policy),
            interval,
        })
    }

    /// Build the stage from a validated configuration with a known interval
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let interval = config.clear_interval.ok_or_else(|| {
            PipelineError::ConfigError("clear interval has not been set".into())
        })?;
        Self::new(config.buffer_capacity, interval, config.overflow_policy)
    }

    /// Handle on the stage's buffer
    pub fn buffer(&self) -> CircularBuffer<i64> {
        self.buffer.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Stage for BatchStage {
    fn launch(
        self: Box<Self>,
        input: Receiver<i64>,
        ctx: &mut StageContext,
    ) -> Result<Receiver<i64>> {
        let BatchStage {
            name,
            buffer,
            interval,
        } = *self;
        let (output, next) = bounded(0);
        // Disconnects when the ingest loop exits; never carries a message.
        let (ingest_alive, ingest_done) = bounded::<()>(0);

        {
            let cancel = ctx.cancel().clone();
            let metrics = ctx.metrics().clone();
            let buffer = buffer.clone();
            let name = name.clone();
            ctx.spawn("ingest", move || {
                let _ingest_alive = ingest_alive;
                loop {
                    select! {
                        recv(input) -> msg => {
                            let value = match msg {
                                Ok(value) => value,
                                Err(_) => {
                                    debug!(stage = %name, "input closed");
                                    break;
                                }
                            };
                            if cancel.is_cancelled() {
                                break;
                            }
                            metrics.record_received();
                            if let Some(displaced) = buffer.push(value) {
                                metrics.record_discarded();
                                warn!(stage = %name, displaced, "buffer full, value dropped");
                            }
                        }
                        recv(cancel.signal()) -> _ => break,
                    }
                }
                debug!(stage = %name, "ingest stopped");
            })?;
        }

        let cancel = ctx.cancel().clone();
        let metrics = ctx.metrics().clone();
        ctx.spawn("flush", move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        if !flush(&name, &buffer, &cancel, &output, &metrics) {
                            break;
                        }
                    }
                    recv(ingest_done) -> _ => {
                        if !cancel.is_cancelled() {
                            flush(&name, &buffer, &cancel, &output, &metrics);
                        }
                        break;
                    }
                    recv(cancel.signal()) -> _ => break,
                }
            }
            debug!(stage = %name, "flush stopped");
        })?;

        Ok(next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Drain the buffer and emit its contents in order.
/// Returns `false` if emission was cut short.
fn flush(
    name: &str,
    buffer: &CircularBuffer<i64>,
    cancel: &CancelToken,
    output: &Sender<i64>,
    metrics: &StageMetrics,
) -> bool {
    let Some(batch) = buffer.drain() else {
        return true;
    };
    debug!(stage = %name, count = batch.len(), "flushing buffer");
    for value in batch {
        if !forward(cancel, output, value) {
            return false;
        }
        metrics.record_forwarded();
    }
    true
}
