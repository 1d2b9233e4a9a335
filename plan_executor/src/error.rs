use assistant_client::{AssistantError, backend::BackendInitError};
use candle_ingestor::{
    IngestError, models::timeframe::TimeFrameError, providers::ProviderInitError,
};
use thiserror::Error;

use crate::io::sink::SinkError;

/// Why a single task body failed.
#[derive(Debug, Error)]
pub enum TaskError {
    /// An upstream output the task needs was not provided.
    #[error("missing input from upstream task `{0}`")]
    MissingInput(String),

    #[error("candle fetch failed: {0}")]
    SourceFetch(#[from] IngestError),

    #[error("text generation failed: {0}")]
    Generation(#[from] AssistantError),

    #[error("document write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Structural problems with a task graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("task `{0}` is declared twice")]
    DuplicateTask(String),

    #[error("task `{task}` depends on unknown task `{dependency}`")]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle through {}", tasks.join(", "))]
    Cycle { tasks: Vec<String> },

    #[error("no task named `{0}`")]
    UnknownTask(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("task `{task}` failed: {source}")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },

    #[error("task `{task}` was skipped, blocked by {}", blocked_by.join(", "))]
    Skipped { task: String, blocked_by: Vec<String> },

    #[error("invalid timeframe: {0}")]
    Timeframe(#[from] TimeFrameError),

    #[error("failed to initialise candle source: {0}")]
    SourceInit(#[from] ProviderInitError),

    #[error("failed to initialise assistant backend: {0}")]
    BackendInit(#[from] BackendInitError),
}
