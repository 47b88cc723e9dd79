use crate::cancel::CancelToken;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{Stage, StageContext, Worker};
use crossbeam::channel::Receiver;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    cancel: CancelToken,
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder sharing `cancel` with every stage
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            stages: Vec::new(),
        }
    }

    /// Append a stage; values flow through stages in the order they are added
    pub fn add_stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        Ok(Pipeline {
            cancel: self.cancel,
            stages: self.stages,
        })
    }
}

/// A linear chain of stages sharing one cancellation token.
///
/// The pipeline owns no threads or buffers of its own; running it only
/// wires each stage's output to the next stage's input.
pub struct Pipeline {
    cancel: CancelToken,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn builder(cancel: CancelToken) -> PipelineBuilder {
        PipelineBuilder::new(cancel)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Feed `source` through every stage, left to right.
    ///
    /// Consumes the pipeline: a pipeline runs once and is never restarted.
    /// If a stage fails to launch, the stages already started are cancelled.
    pub fn run(self, source: Receiver<i64>) -> Result<RunningPipeline> {
        let Pipeline { cancel, stages } = self;
        let mut current = source;
        let mut workers = Vec::new();
        let mut metrics = Vec::with_capacity(stages.len());

        for (index, stage) in stages.into_iter().enumerate() {
            let name = format!("{}-{}", index, stage.name());
            let stage_metrics = StageMetrics::new();
            let mut ctx = StageContext::new(name.clone(), cancel.clone(), stage_metrics.clone());

            let launched = stage.launch(current, &mut ctx);
            workers.extend(ctx.into_workers());
            current = match launched {
                Ok(next) => next,
                Err(e) => {
                    cancel.cancel();
                    return Err(e);
                }
            };

            debug!(stage = %name, "stage launched");
            metrics.push((name, stage_metrics));
        }

        info!(stages = metrics.len(), workers = workers.len(), "pipeline running");
        Ok(RunningPipeline {
            cancel,
            output: current,
            workers,
            metrics,
        })
    }
}

/// A running pipeline that can be observed and shut down
pub struct RunningPipeline {
    cancel: CancelToken,
    output: Receiver<i64>,
    workers: Vec<Worker>,
    metrics: Vec<(String, StageMetrics)>,
}

impl RunningPipeline {
    /// The final sequence, produced by the last stage
    pub fn output(&self) -> Receiver<i64> {
        self.output.clone()
    }

    /// The token shared by every stage of this pipeline
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Get metrics for a stage by position
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index).map(|(_, metrics)| metrics)
    }

    /// Number of workers that have not exited yet
    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|worker| !worker.is_finished()).count()
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (name, metrics) in &self.metrics {
            summary.push_str(&format!("  Stage {}: {}\n", name, metrics.snapshot().format()));
        }
        summary
    }

    /// Wait for every worker to exit on its own, without cancelling.
    /// Workers exit once the source closes and the output has been read.
    pub fn wait(self) -> Result<()> {
        join_all(self.workers)
    }

    /// Fire the cancellation token and wait up to `timeout` for every worker
    pub fn shutdown(self, timeout: Duration) -> Result<()> {
        self.cancel.cancel();
        let deadline = Instant::now() + timeout;
        while self.workers.iter().any(|worker| !worker.is_finished()) {
            if Instant::now() >= deadline {
                let stuck: Vec<&str> = self
                    .workers
                    .iter()
                    .filter(|worker| !worker.is_finished())
                    .map(|worker| worker.name())
                    .collect();
                return Err(PipelineError::ShutdownError(format!(
                    "workers still running after {:?}: {}",
                    timeout,
                    stuck.join(", ")
                )));
            }
            thread::sleep(Duration::from_millis(1));
        }
        join_all(self.workers)
    }
}

fn join_all(workers: Vec<Worker>) -> Result<()> {
    let mut first_error = None;
    for worker in workers {
        if let Err(e) = worker.join() {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{divisible_by_three_filter, positive_filter};
    use crossbeam::channel::bounded;

    #[test]
    fn test_pipeline_builder() {
        let pipeline = Pipeline::builder(CancelToken::new())
            .add_stage(positive_filter())
            .add_stage(divisible_by_three_filter())
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["positive", "divisible-by-three"]);
    }

    #[test]
    fn test_no_stages_error() {
        let result = PipelineBuilder::new(CancelToken::new()).build();
        assert!(matches!(result, Err(PipelineError::NoStages)));
    }

    #[test]
    fn test_one_worker_per_filter() {
        let (_tx, rx) = bounded::<i64>(0);
        let running = Pipeline::builder(CancelToken::new())
            .add_stage(positive_filter())
            .add_stage(divisible_by_three_filter())
            .build()
            .unwrap()
            .run(rx)
            .unwrap();

        assert_eq!(running.active_workers(), 2);
        assert!(!running.cancel_token().is_cancelled());
        let cancel = running.cancel_token().clone();
        running.shutdown(Duration::from_secs(5)).unwrap();
        assert!(cancel.is_cancelled());
    }
}
