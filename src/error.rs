use thiserror::Error;

/// Failure reason produced by a [`Step`](crate::Step).
///
/// The variants follow the places a step can go wrong: calling a wrapper
/// method out of sequence, the transport layer, reading the body, and the
/// assertions themselves.
#[derive(Debug, Error)]
pub enum StepError {
    /// A wrapper method was invoked out of sequence.
    #[error("{0}")]
    Precondition(String),

    /// The injected client failed to perform the exchange.
    #[error("error performing {request}: {source}")]
    Transport {
        request: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request could not be constructed (bad method, URL, or header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),

    /// Expected-vs-actual divergence in an assertion.
    #[error("{0}")]
    Mismatch(String),

    /// A value could not be serialized or parsed as JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The schema validator itself failed, as opposed to the document
    /// failing validation.
    #[error("schema validator error: {0}")]
    Validator(String),
}
