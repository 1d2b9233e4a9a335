use std::time::Duration;

use thiserror::Error;

use crate::{backend::BackendError, models::RunStatus};

/// A run that did not end in `completed`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The run reached a terminal state other than `completed`.
    #[error("run finished with status {0}")]
    Terminal(RunStatus),

    /// The run was still not terminal when the poll deadline passed.
    #[error("run still {last_status} after waiting {waited:?}")]
    PollTimeout {
        waited: Duration,
        last_status: RunStatus,
    },
}

/// The unified error type for the `assistant_client` crate.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationFailure),

    /// The run completed but the conversation holds no assistant message.
    #[error("run completed but no assistant response was found")]
    NoResponseFound,

    #[error("assistant backend error: {0}")]
    Backend(#[from] BackendError),
}

impl AssistantError {
    /// Terminal status of the failed run, if the failure was a terminal state.
    pub fn run_status(&self) -> Option<RunStatus> {
        match self {
            AssistantError::Generation(GenerationFailure::Terminal(status)) => Some(*status),
            AssistantError::Generation(GenerationFailure::PollTimeout { last_status, .. }) => {
                Some(*last_status)
            }
            _ => None,
        }
    }
}
