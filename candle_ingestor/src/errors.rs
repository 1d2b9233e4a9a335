use thiserror::Error;

use crate::{normalize::NormalizeError, providers::ProviderError};

/// The unified error type for the `candle_ingestor` crate.
///
/// Both source variants abort the whole fetch cycle: a merged series is never
/// built from a subset of the configured sources.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The exchange call itself failed (network, HTTP status, error code).
    #[error("source `{exchange}` fetch failed: {source}")]
    SourceFetch {
        exchange: String,
        #[source]
        source: ProviderError,
    },

    /// The exchange answered but its rows could not be normalized.
    #[error("source `{exchange}` returned malformed data: {source}")]
    MalformedData {
        exchange: String,
        #[source]
        source: NormalizeError,
    },

    /// No sources were configured for the merger.
    #[error("no candle sources configured")]
    NoSources,

    /// Serializing the merged series failed.
    #[error("failed to serialize merged series")]
    Serialize(#[from] serde_json::Error),
}

impl IngestError {
    /// Name of the source that failed, if the failure is attributable to one.
    pub fn exchange(&self) -> Option<&str> {
        match self {
            IngestError::SourceFetch { exchange, .. } | IngestError::MalformedData { exchange, .. } => {
                Some(exchange)
            }
            _ => None,
        }
    }
}
