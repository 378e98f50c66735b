//! Upstream error types.

use thiserror::Error;

/// Failure talking to the inference backend.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to reach inference backend")]
    Connect(#[source] reqwest::Error),

    #[error("upstream stream interrupted")]
    Body(#[source] reqwest::Error),

    #[error("failed to encode upstream request")]
    Encode(#[from] serde_json::Error),
}

impl UpstreamError {
    /// The error and every underlying cause, joined with `": "`.
    ///
    /// This is the text the client sees inside the error envelope. reqwest
    /// keeps the interesting part (refused, reset, DNS) in its source chain,
    /// so the top-level message alone is not enough.
    pub fn cause_text(&self) -> String {
        anyhow::Chain::new(self)
            .map(|cause| cause.to_string())
            .collect::<Vec<_>>()
            .join(": ")
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Body(e)
    }
}
