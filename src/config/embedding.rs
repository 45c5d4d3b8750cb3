// src/config/embedding.rs
// Embedding Engine configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// HTTP endpoint for the dense encoder (BGE-M3-class model server).
    pub dense_endpoint: String,
    pub dense_api_key: String,
    pub dense_dimensions: usize,
    /// HTTP endpoint for the SPLADE-class sparse encoder, if one is deployed.
    /// When unset, the engine falls back to the TF-IDF sparse encoder.
    pub sparse_endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            dense_endpoint: super::helpers::env_or("EMBEDDING_DENSE_ENDPOINT", ""),
            dense_api_key: super::helpers::env_or("EMBEDDING_DENSE_API_KEY", ""),
            dense_dimensions: super::helpers::env_usize("EMBEDDING_DENSE_DIMENSIONS", 1024),
            sparse_endpoint: std::env::var("EMBEDDING_SPARSE_ENDPOINT").ok(),
            timeout_secs: super::helpers::env_u64("EMBEDDING_TIMEOUT_SECS", 15),
        }
    }
}
