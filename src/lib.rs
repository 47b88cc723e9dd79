//! A cancellable integer pipeline with a time-flushed ring buffer.
//!
//! Integers read from a line-oriented source pass through a fixed chain of
//! stages, each running on its own thread and connected to the next by an
//! unbuffered crossbeam channel:
//!
//! source → positive filter → divisible-by-three filter → batching stage → consumer
//!
//! The batching stage holds survivors in a bounded [`CircularBuffer`] and
//! flushes it downstream on a fixed interval. One [`CancelToken`] is shared
//! by every activity; firing it tears the whole pipeline down.
//!
//! # Example
//!
//! ```ignore
//! use batch_pipeline::{
//!     divisible_by_three_filter, positive_filter, BatchStage, CancelToken, OverflowPolicy,
//!     Pipeline,
//! };
//!
//! let cancel = CancelToken::new();
//! let running = Pipeline::builder(cancel.clone())
//!     .add_stage(positive_filter())
//!     .add_stage(divisible_by_three_filter())
//!     .add_stage(BatchStage::new(10, interval, OverflowPolicy::DropOldest)?)
//!     .build()?
//!     .run(source)?;
//!
//! for value in running.output().iter() {
//!     println!("processed value: {value}");
//! }
//! ```

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod console;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod source;
pub mod stage;

// Re-exports for convenience
pub use buffer::{CircularBuffer, OverflowPolicy, DEFAULT_CAPACITY};
pub use cancel::CancelToken;
pub use config::{parse_interval, PipelineConfig};
pub use console::{Console, SharedBuffer};
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, RunningPipeline};
pub use session::{run_session, SessionReport};
pub use sink::consume;
pub use source::{parse_token, LineSource, SourceSummary, Token};
pub use stage::{
    divisible_by_three_filter, forward, positive_filter, BatchStage, FilterStage, Stage,
    StageContext,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
