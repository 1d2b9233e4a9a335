use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plan_executor::{
    Task, TaskInputs, TaskOutcome,
    config::{PipelineConfig, load_config_path},
    pipeline::{LoadTask, Pipeline, Stage, layout},
};
use shared_utils::env::get_env_var;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Consulted when `--config` is not given.
const CONFIG_ENV: &str = "MARKET_DIGEST_CONFIG";

#[derive(Parser)]
#[command(version, about = "Multi-exchange candle digest")]
struct Cli {
    /// Pipeline config (TOML); built-in defaults apply when omitted
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the whole pipeline once
    Run,

    /// Print the tasks in execution order with their dependencies
    Plan,

    /// Run one task, reading its upstream outputs from files
    ///
    /// `load` only talks to the exchanges; the other tasks need the API key.
    Task {
        /// load, table, analysis or report
        name: String,

        /// Upstream output as DEP=FILE (repeatable)
        #[arg(long = "input", value_name = "DEP=FILE", value_parser = parse_input)]
        inputs: Vec<(String, PathBuf)>,
    },
}

fn parse_input(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((dep, file)) if !dep.is_empty() && !file.is_empty() => {
            Ok((dep.to_string(), PathBuf::from(file)))
        }
        _ => Err(format!("expected DEP=FILE, got `{raw}`")),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    match path.or_else(|| get_env_var(CONFIG_ENV).ok().map(PathBuf::from)) {
        Some(path) => load_config_path(path),
        None => Ok(PipelineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config)?;

    match cli.cmd {
        Cmd::Plan => {
            let plan = layout()?;
            for name in plan.order() {
                let deps = plan.dependencies(name).unwrap_or_default();
                if deps.is_empty() {
                    println!("{name}");
                } else {
                    println!("{name} <- {}", deps.join(", "));
                }
            }
        }
        Cmd::Run => {
            let pipeline = Pipeline::from_config(&cfg)?;
            let report = pipeline.run().await;
            for (task, outcome) in report.iter() {
                match outcome {
                    TaskOutcome::Succeeded(_) => info!(task, "succeeded"),
                    TaskOutcome::Failed(err) => error!(task, error = %err, "failed"),
                    TaskOutcome::Skipped { blocked_by } => warn!(task, ?blocked_by, "skipped"),
                }
            }
            report.into_result()?;
            info!(dir = %cfg.output.artifact_dir.display(), "documents written");
        }
        Cmd::Task { name, .. } if name == Stage::Load.name() => {
            let task = LoadTask::from_config(&cfg)?;
            if let Some(output) = task.run(TaskInputs::new()).await? {
                println!("{output}");
            }
        }
        Cmd::Task { name, inputs } => {
            let pipeline = Pipeline::from_config(&cfg)?;
            let mut task_inputs = TaskInputs::new();
            for (dep, file) in inputs {
                let text = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("read `{dep}` input from {}", file.display()))?;
                task_inputs.insert(dep, text);
            }
            if let Some(output) = pipeline.run_task(&name, task_inputs).await? {
                println!("{output}");
            }
        }
    }

    Ok(())
}
