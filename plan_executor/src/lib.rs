//! Runs the candle digest as an explicit task graph.
//!
//! [`pipeline::Pipeline`] wires candle ingestion, text generation and document
//! persistence into `load -> {table, analysis} -> report` and executes it with the
//! [`graph`] executor.

pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod pipeline;
pub mod prompts;

pub use error::{GraphError, PipelineError, TaskError};
pub use graph::{MissingInputPolicy, RunReport, Task, TaskGraph, TaskInputs, TaskOutcome};
pub use io::sink::{DocumentSink, FsDocumentSink, SinkError};
pub use pipeline::{Pipeline, PipelineParts, Stage};
