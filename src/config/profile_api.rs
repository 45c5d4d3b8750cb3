// src/config/profile_api.rs
// Profile API Client configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Upper bound on in-flight profile fetches per batch call.
    pub max_batch_concurrency: usize,
}

impl ProfileApiConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: super::helpers::env_or("PROFILE_API_BASE_URL", "http://localhost:8081"),
            timeout_secs: super::helpers::env_u64("PROFILE_API_TIMEOUT_SECS", 30),
            max_batch_concurrency: super::helpers::env_usize("PROFILE_API_MAX_BATCH", 32),
        }
    }
}
