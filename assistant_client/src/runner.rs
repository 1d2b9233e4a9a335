//! One prompt, one reply: the request/poll/read protocol against an [`AssistantBackend`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::AssistantBackend,
    errors::{AssistantError, GenerationFailure},
    models::{AgentId, AgentSpec, ConversationId, Order, Role, Run, RunStatus},
};

/// How often to re-check a run, and for how long at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits for a terminal state indefinitely.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Some(Duration::from_secs(600)),
        }
    }
}

/// Anything that turns a prompt into a reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
}

/// Agent + conversation created for exactly one [`SessionRunner::run`] call.
#[derive(Debug)]
struct AgentSession {
    agent: AgentId,
    conversation: ConversationId,
}

/// Runs prompts through a backend, one brand-new agent and conversation per call.
///
/// Nothing is reused across calls, so concurrent `run`s never see each other's
/// messages. Sessions are abandoned after the reply is read; the backend needs no
/// teardown.
pub struct SessionRunner<B> {
    backend: Arc<B>,
    agent: AgentSpec,
    poll: PollPolicy,
}

impl<B: AssistantBackend> SessionRunner<B> {
    pub fn new(backend: Arc<B>, agent: AgentSpec) -> Self {
        Self {
            backend,
            agent,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn agent(&self) -> &AgentSpec {
        &self.agent
    }

    /// Sends `prompt` and returns the assistant's reply, trimmed.
    #[instrument(skip_all, fields(agent = %self.agent.name, prompt_len = prompt.len()))]
    pub async fn run(&self, prompt: &str) -> Result<String, AssistantError> {
        let session = self.open_session().await?;
        self.backend
            .post_message(&session.conversation, Role::User, prompt)
            .await?;

        let run = self
            .backend
            .start_run(&session.conversation, &session.agent)
            .await?;
        info!(run = %run.id, status = %run.status, "run started");

        let status = self.await_terminal(&session.conversation, run).await?;
        if status != RunStatus::Completed {
            warn!(%status, "run did not complete");
            return Err(GenerationFailure::Terminal(status).into());
        }

        let messages = self
            .backend
            .list_messages(&session.conversation, Order::Desc)
            .await?;
        // Assistant messages without text (image-only, say) are not replies.
        messages
            .into_iter()
            .filter(|message| message.role == Role::Assistant)
            .map(|message| message.text.trim().to_string())
            .find(|text| !text.is_empty())
            .ok_or(AssistantError::NoResponseFound)
    }

    async fn open_session(&self) -> Result<AgentSession, AssistantError> {
        let agent = self.backend.create_agent(&self.agent).await?;
        let conversation = self.backend.create_conversation().await?;
        debug!(%agent, %conversation, "opened session");
        Ok(AgentSession {
            agent,
            conversation,
        })
    }

    /// Polls until the run is terminal or the deadline passes.
    ///
    /// The last sleep is cut short at the deadline, where one final check is made.
    async fn await_terminal(
        &self,
        conversation: &ConversationId,
        mut run: Run,
    ) -> Result<RunStatus, AssistantError> {
        let started = Instant::now();
        let mut checks = 1usize;

        loop {
            if run.status.is_terminal() {
                debug!(checks, status = %run.status, "run reached a terminal state");
                return Ok(run.status);
            }
            let mut pause = self.poll.interval;
            if let Some(max_wait) = self.poll.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    return Err(GenerationFailure::PollTimeout {
                        waited,
                        last_status: run.status,
                    }
                    .into());
                }
                pause = pause.min(max_wait - waited);
            }

            sleep(pause).await;
            run = self.backend.retrieve_run(conversation, &run.id).await?;
            checks += 1;
            debug!(checks, status = %run.status, "polled run");
        }
    }
}

#[async_trait]
impl<B: AssistantBackend> TextGenerator for SessionRunner<B> {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        self.run(prompt).await
    }
}
