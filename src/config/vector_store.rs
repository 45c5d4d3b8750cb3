// src/config/vector_store.rs
// Vector Store Client configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_factor: f32,
}

impl VectorStoreConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("QDRANT_URL", "http://localhost:6334"),
            api_key: std::env::var("QDRANT_API_KEY").ok(),
            collection: super::helpers::env_or("QDRANT_COLLECTION", "user_vectors_1024"),
            timeout_secs: super::helpers::env_u64("QDRANT_TIMEOUT_SECS", 10),
            max_retries: super::helpers::env_usize("QDRANT_MAX_RETRIES", 3) as u32,
            retry_base_delay_ms: super::helpers::env_u64("QDRANT_RETRY_BASE_DELAY_MS", 1000),
            retry_factor: super::helpers::env_f32("QDRANT_RETRY_FACTOR", 1.5),
        }
    }
}
