//! Declarative task graph and its executor.
//!
//! Tasks are declared with their dependencies on a [`TaskGraph`]; [`TaskGraph::build`]
//! validates the edges and fixes a topological order. An
//! [`ExecutionPlan`] of [`Task`]s is then executed with every task started as soon as
//! all of its dependencies have finished, so independent branches run concurrently.
//!
//! When an upstream task fails, its dependents are either skipped or fed a
//! placeholder, depending on the [`MissingInputPolicy`].

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::{StreamExt, stream::FuturesUnordered};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};

use crate::error::{GraphError, PipelineError, TaskError};

/// Upstream outputs handed to a task, keyed by dependency name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInputs {
    values: IndexMap<String, String>,
}

impl TaskInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.values.insert(name.into(), text.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get), but a missing input is an error.
    pub fn require(&self, name: &str) -> Result<&str, TaskError> {
        self.get(name)
            .ok_or_else(|| TaskError::MissingInput(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One unit of work in the graph.
///
/// Returns the text handed to dependents, or `None` for sink-only tasks.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, inputs: TaskInputs) -> Result<Option<String>, TaskError>;
}

/// What a task receives in place of an upstream output that does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingInputPolicy {
    /// Dependents of a failed or skipped task are skipped too.
    #[default]
    Fail,
    /// Dependents run with this literal text standing in for the missing output.
    Placeholder(String),
}

impl MissingInputPolicy {
    /// Fills every dependency absent from `inputs` with the placeholder.
    ///
    /// Returns the names that were filled; always empty under [`MissingInputPolicy::Fail`].
    pub fn fill(&self, deps: &[String], inputs: &mut TaskInputs) -> Vec<String> {
        let MissingInputPolicy::Placeholder(text) = self else {
            return Vec::new();
        };
        let mut filled = Vec::new();
        for dep in deps {
            if !inputs.contains(dep) {
                inputs.insert(dep.clone(), text.clone());
                filled.push(dep.clone());
            }
        }
        filled
    }
}

struct Node<T> {
    deps: Vec<String>,
    payload: T,
}

/// Nodes plus dependency edges, not yet validated.
pub struct TaskGraph<T> {
    nodes: IndexMap<String, Node<T>>,
}

impl<T> Default for TaskGraph<T> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }
}

impl<T> TaskGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name`, to run after every task in `deps`.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        deps: &[&str],
        payload: T,
    ) -> Result<&mut Self, GraphError> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateTask(name));
        }

        let mut unique: Vec<String> = Vec::with_capacity(deps.len());
        for dep in deps {
            if !unique.iter().any(|seen| seen == dep) {
                unique.push((*dep).to_string());
            }
        }
        self.nodes.insert(name, Node { deps: unique, payload });
        Ok(self)
    }

    /// Validates the edges and fixes the execution order.
    ///
    /// Ties are broken by declaration order, so the result is deterministic.
    pub fn build(self) -> Result<ExecutionPlan<T>, GraphError> {
        for (name, node) in &self.nodes {
            if let Some(dep) = node.deps.iter().find(|dep| !self.nodes.contains_key(*dep)) {
                return Err(GraphError::UnknownDependency {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let order = self.topological_order()?;
        Ok(ExecutionPlan {
            nodes: self.nodes,
            order,
        })
    }

    fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let mut pending: IndexMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.deps.len()))
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(ready) = pending
            .iter()
            .find(|(_, unmet)| **unmet == 0)
            .map(|(name, _)| *name)
        {
            pending.shift_remove(ready);
            order.push(ready.to_string());
            for (name, node) in &self.nodes {
                if node.deps.iter().any(|dep| dep == ready) {
                    if let Some(unmet) = pending.get_mut(name.as_str()) {
                        *unmet -= 1;
                    }
                }
            }
        }

        if !pending.is_empty() {
            return Err(GraphError::Cycle {
                tasks: pending.keys().map(|name| name.to_string()).collect(),
            });
        }
        Ok(order)
    }
}

/// A validated graph with a fixed topological order.
pub struct ExecutionPlan<T> {
    nodes: IndexMap<String, Node<T>>,
    order: Vec<String>,
}

impl<T> ExecutionPlan<T> {
    /// Task names, every task after all of its dependencies.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.nodes.get(name).map(|node| node.deps.as_slice())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.nodes.get(name).map(|node| &node.payload)
    }
}

impl ExecutionPlan<Arc<dyn Task>> {
    /// Runs every task once, dependencies first, independent tasks concurrently.
    pub async fn execute(&self, policy: &MissingInputPolicy) -> RunReport {
        let mut outcomes: HashMap<String, TaskOutcome> = HashMap::with_capacity(self.order.len());
        let mut waiting: Vec<&str> = self.order.iter().map(String::as_str).collect();
        let mut running = FuturesUnordered::new();

        loop {
            // `waiting` is in topological order, so one pass resolves every task
            // whose dependencies are already done, including chains of skips.
            let mut still_waiting = Vec::with_capacity(waiting.len());
            for name in waiting {
                let node = &self.nodes[name];
                if !node.deps.iter().all(|dep| outcomes.contains_key(dep)) {
                    still_waiting.push(name);
                    continue;
                }

                let mut inputs = TaskInputs::new();
                let mut blocked_by = Vec::new();
                for dep in &node.deps {
                    match &outcomes[dep] {
                        TaskOutcome::Succeeded(Some(text)) => inputs.insert(dep.clone(), text.clone()),
                        TaskOutcome::Succeeded(None) => {}
                        TaskOutcome::Failed(_) | TaskOutcome::Skipped { .. } => {
                            blocked_by.push(dep.clone())
                        }
                    }
                }

                if !blocked_by.is_empty() && *policy == MissingInputPolicy::Fail {
                    warn!(task = name, ?blocked_by, "skipping task");
                    outcomes.insert(name.to_string(), TaskOutcome::Skipped { blocked_by });
                    continue;
                }

                let filled = policy.fill(&node.deps, &mut inputs);
                if !filled.is_empty() {
                    warn!(task = name, placeholders = ?filled, "running with placeholder inputs");
                }

                let task = Arc::clone(&node.payload);
                let task_name = name.to_string();
                running.push(
                    async move {
                        let result = task.run(inputs).await;
                        (task_name, result)
                    }
                    .instrument(info_span!("task", name)),
                );
            }
            waiting = still_waiting;

            let Some((name, result)) = running.next().await else {
                break;
            };
            let outcome = match result {
                Ok(output) => {
                    info!(task = %name, "task succeeded");
                    TaskOutcome::Succeeded(output)
                }
                Err(err) => {
                    warn!(task = %name, error = %err, "task failed");
                    TaskOutcome::Failed(err)
                }
            };
            outcomes.insert(name, outcome);
        }

        let outcomes = self
            .order
            .iter()
            .filter_map(|name| outcomes.remove_entry(name))
            .collect();
        RunReport { outcomes }
    }
}

#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded(Option<String>),
    Failed(TaskError),
    /// Not run because these dependencies did not succeed.
    Skipped { blocked_by: Vec<String> },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            TaskOutcome::Succeeded(output) => output.as_deref(),
            _ => None,
        }
    }
}

/// Per-task outcomes of one execution, in topological order.
#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: IndexMap<String, TaskOutcome>,
}

impl RunReport {
    pub fn outcome(&self, task: &str) -> Option<&TaskOutcome> {
        self.outcomes.get(task)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskOutcome)> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(TaskOutcome::is_success)
    }

    /// The outputs of every task, or the first failure in execution order.
    pub fn into_result(self) -> Result<IndexMap<String, Option<String>>, PipelineError> {
        let mut outputs = IndexMap::with_capacity(self.outcomes.len());
        for (task, outcome) in self.outcomes {
            match outcome {
                TaskOutcome::Succeeded(output) => {
                    outputs.insert(task, output);
                }
                TaskOutcome::Failed(source) => return Err(PipelineError::Task { task, source }),
                // a skip is always preceded by the failure that caused it
                TaskOutcome::Skipped { blocked_by } => {
                    return Err(PipelineError::Task {
                        source: TaskError::MissingInput(blocked_by.join(", ")),
                        task,
                    });
                }
            }
        }
        Ok(outputs)
    }
}
