// src/error.rs
// Unified error taxonomy for the search orchestrator.
//
// Each subsystem (embedding, vector store, LLM, profile API) defines its own
// thiserror-derived error enum close to where it's thrown; this module collects
// them behind a single type so the Routing Scheduler can match on failure kind
// without depending on every subsystem's crate path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("dense encoder unavailable: {0}")]
    DenseUnavailable(String),
    #[error("sparse encoder unavailable: {0}")]
    SparseUnavailable(String),
}

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store connection failed: {0}")]
    ConnectionFailed(String),
    #[error("vector store request failed: {0}")]
    RequestFailed(String),
    #[error("vector store returned malformed data: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),
    #[error("LLM response could not be parsed as JSON: {reason} (raw: {raw})")]
    ParseError { reason: String, raw: String },
}

#[derive(Debug, Error)]
pub enum ProfileApiError {
    #[error("profile {0} not found")]
    NotFound(String),
    #[error("profile API request failed: {0}")]
    RequestFailed(String),
}

/// The Scheduler's single error type. Every subsystem error folds into this
/// so call sites can decide, in one place, which kinds are fatal to a turn
/// and which degrade gracefully (see the fallback rules per component).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    ProfileApi(#[from] ProfileApiError),

    #[error("turn deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
