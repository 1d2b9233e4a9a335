//! The capability surface of a stateful text-generation backend.

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{AgentId, AgentSpec, ConversationId, Message, Order, Role, Run, RunId};

/// Operations a [`SessionRunner`](crate::runner::SessionRunner) needs from the backend.
///
/// Implementations are shared between concurrent callers, so they must not keep
/// per-conversation state of their own.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentId, BackendError>;

    async fn create_conversation(&self) -> Result<ConversationId, BackendError>;

    async fn post_message(
        &self,
        conversation: &ConversationId,
        role: Role,
        text: &str,
    ) -> Result<(), BackendError>;

    /// Starts a run; the returned status is the first observation of the run.
    async fn start_run(
        &self,
        conversation: &ConversationId,
        agent: &AgentId,
    ) -> Result<Run, BackendError>;

    async fn retrieve_run(
        &self,
        conversation: &ConversationId,
        run: &RunId,
    ) -> Result<Run, BackendError>;

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        order: Order,
    ) -> Result<Vec<Message>, BackendError>;
}

/// Errors that can occur during the creation of a backend client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors raised by an [`AssistantBackend`] call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    /// Transport failure or an undecodable response body.
    #[snafu(display("API request failed: {source}"))]
    Request {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The backend answered with a non-success status.
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },
}
