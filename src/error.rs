use thiserror::Error;

/// Result type for batch pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No stages in pipeline
    #[error("Cannot build pipeline with no stages")]
    NoStages,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked
    #[error("Thread join error: {0}")]
    ThreadError(String),

    /// Shutdown error
    #[error("Pipeline shutdown error: {0}")]
    ShutdownError(String),

    /// Input line that is neither an integer nor the termination keyword
    #[error("Invalid input token: {0:?}")]
    InvalidToken(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
