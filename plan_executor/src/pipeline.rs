//! The digest pipeline: `load -> {table, analysis} -> report`.
//!
//! `load` fetches and merges candles and hands the merged JSON downstream; `table`
//! and `analysis` each turn it into a document; `report` summarizes both documents.

use std::sync::Arc;

use assistant_client::{SessionRunner, TextGenerator, openai::OpenAiAssistants};
use async_trait::async_trait;
use candle_ingestor::{
    CandleMerger, CandleRequest, IngestError,
    providers::{ProviderInitError, build_source},
};
use tracing::{Instrument, info, info_span, warn};

use crate::{
    config::PipelineConfig,
    error::{GraphError, PipelineError, TaskError},
    graph::{ExecutionPlan, MissingInputPolicy, RunReport, Task, TaskGraph, TaskInputs},
    io::sink::{DocumentSink, FsDocumentSink},
    prompts,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Table,
    Analysis,
    Report,
}

impl Stage {
    /// Declaration order, which is also a valid execution order.
    pub const ALL: [Stage; 4] = [Stage::Load, Stage::Table, Stage::Analysis, Stage::Report];

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Table => "table",
            Stage::Analysis => "analysis",
            Stage::Report => "report",
        }
    }

    pub const fn dependencies(self) -> &'static [&'static str] {
        match self {
            Stage::Load => &[],
            Stage::Table | Stage::Analysis => &["load"],
            Stage::Report => &["table", "analysis"],
        }
    }
}

fn declare<T>(mut payload: impl FnMut(Stage) -> T) -> Result<ExecutionPlan<T>, GraphError> {
    let mut graph = TaskGraph::new();
    for stage in Stage::ALL {
        graph.add_task(stage.name(), stage.dependencies(), payload(stage))?;
    }
    graph.build()
}

/// The pipeline's shape without any collaborators attached.
pub fn layout() -> Result<ExecutionPlan<Stage>, GraphError> {
    declare(|stage| stage)
}

/// Fetches every source and emits the merged series as pretty JSON.
pub struct LoadTask {
    merger: CandleMerger,
    request: CandleRequest,
}

impl LoadTask {
    pub fn new(merger: CandleMerger, request: CandleRequest) -> Self {
        Self { merger, request }
    }

    /// Wires the configured exchanges; no assistant backend is touched.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self, PipelineError> {
        let merger = cfg
            .market
            .exchanges
            .iter()
            .try_fold(CandleMerger::new(), |merger, id| {
                Ok::<_, ProviderInitError>(merger.with_source(id.as_str(), build_source(*id)?))
            })?;
        Ok(Self::new(merger, cfg.candle_request()?))
    }
}

#[async_trait]
impl Task for LoadTask {
    async fn run(&self, _inputs: TaskInputs) -> Result<Option<String>, TaskError> {
        let series = self.merger.fetch_merged(&self.request).await?;
        let json = series.to_json_pretty().map_err(IngestError::from)?;
        Ok(Some(json))
    }
}

type Render = fn(&TaskInputs) -> Result<String, TaskError>;

fn render_table(inputs: &TaskInputs) -> Result<String, TaskError> {
    Ok(prompts::table_prompt(inputs.require(Stage::Load.name())?))
}

fn render_analysis(inputs: &TaskInputs) -> Result<String, TaskError> {
    Ok(prompts::analysis_prompt(inputs.require(Stage::Load.name())?))
}

fn render_report(inputs: &TaskInputs) -> Result<String, TaskError> {
    Ok(prompts::report_prompt(
        inputs.require(Stage::Table.name())?,
        inputs.require(Stage::Analysis.name())?,
    ))
}

/// Renders a prompt, asks the generator, and persists the reply.
pub struct DocumentTask {
    document: &'static str,
    render: Render,
    /// Whether dependents receive the reply.
    forward: bool,
    generator: Arc<dyn TextGenerator>,
    sink: Arc<dyn DocumentSink>,
}

#[async_trait]
impl Task for DocumentTask {
    async fn run(&self, inputs: TaskInputs) -> Result<Option<String>, TaskError> {
        let prompt = (self.render)(&inputs)?;
        let reply = self.generator.generate(&prompt).await?;
        let path = self.sink.write(self.document, &reply).await?;
        info!(document = self.document, path = %path.display(), "document ready");
        Ok(self.forward.then_some(reply))
    }
}

/// Everything the pipeline talks to.
pub struct PipelineParts {
    pub merger: CandleMerger,
    pub request: CandleRequest,
    pub generator: Arc<dyn TextGenerator>,
    pub sink: Arc<dyn DocumentSink>,
}

pub struct Pipeline {
    plan: ExecutionPlan<Arc<dyn Task>>,
    policy: MissingInputPolicy,
}

impl Pipeline {
    pub fn new(parts: PipelineParts, policy: MissingInputPolicy) -> Result<Self, PipelineError> {
        let PipelineParts {
            merger,
            request,
            generator,
            sink,
        } = parts;

        let plan = declare(|stage| -> Arc<dyn Task> {
            let document = |document: &'static str, render: Render, forward: bool| {
                Arc::new(DocumentTask {
                    document,
                    render,
                    forward,
                    generator: Arc::clone(&generator),
                    sink: Arc::clone(&sink),
                })
            };
            match stage {
                Stage::Load => Arc::new(LoadTask::new(merger.clone(), request.clone())),
                Stage::Table => document("table.md", render_table, true),
                Stage::Analysis => document("analysis.md", render_analysis, true),
                Stage::Report => document("report.md", render_report, false),
            }
        })?;

        Ok(Self { plan, policy })
    }

    /// Wires the production collaborators described by `cfg`.
    ///
    /// Fails if the API key variable is unset or the timeframe does not parse.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self, PipelineError> {
        let LoadTask { merger, request } = LoadTask::from_config(cfg)?;

        let backend =
            OpenAiAssistants::from_env_var(&cfg.assistant.api_key_env, &cfg.assistant.base_url)?;
        let runner = SessionRunner::new(Arc::new(backend), cfg.agent_spec())
            .with_poll_policy(cfg.poll_policy());

        Self::new(
            PipelineParts {
                merger,
                request,
                generator: Arc::new(runner),
                sink: Arc::new(FsDocumentSink::new(cfg.output.artifact_dir.clone())),
            },
            cfg.output.missing_input.clone(),
        )
    }

    pub fn order(&self) -> &[String] {
        self.plan.order()
    }

    pub fn policy(&self) -> &MissingInputPolicy {
        &self.policy
    }

    /// Runs the whole graph once.
    pub async fn run(&self) -> RunReport {
        info!(tasks = self.plan.order().len(), "starting pipeline");
        let report = self.plan.execute(&self.policy).await;
        info!(success = report.is_success(), "pipeline finished");
        report
    }

    /// Runs one task on its own, with upstream outputs supplied by the caller.
    ///
    /// Missing inputs are handled by the pipeline's [`MissingInputPolicy`].
    pub async fn run_task(
        &self,
        name: &str,
        mut inputs: TaskInputs,
    ) -> Result<Option<String>, PipelineError> {
        let (Some(task), Some(deps)) = (self.plan.get(name), self.plan.dependencies(name)) else {
            return Err(GraphError::UnknownTask(name.to_string()).into());
        };

        let filled = self.policy.fill(deps, &mut inputs);
        if !filled.is_empty() {
            warn!(task = name, placeholders = ?filled, "running with placeholder inputs");
        }

        task.run(inputs)
            .instrument(info_span!("task", name))
            .await
            .map_err(|source| PipelineError::Task {
                task: name.to_string(),
                source,
            })
    }
}
