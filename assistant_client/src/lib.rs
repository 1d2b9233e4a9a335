//! Client side of a stateful text-generation backend.
//!
//! The backend is reached through the [`AssistantBackend`](backend::AssistantBackend)
//! capability. [`SessionRunner`](runner::SessionRunner) drives one prompt through it:
//! fresh agent, fresh conversation, user message, run, poll, reply.

pub mod backend;
pub mod errors;
pub mod models;
pub mod openai;
pub mod runner;

pub use backend::{AssistantBackend, BackendError};
pub use errors::{AssistantError, GenerationFailure};
pub use models::{AgentSpec, Message, Order, Role, Run, RunStatus};
pub use runner::{PollPolicy, SessionRunner, TextGenerator};
