// src/config/llm.rs
// LLM Client configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_factor: f32,
    /// Self-imposed outbound throttle against the provider's own rate
    /// limit, independent of the retry policy above.
    pub rate_limit_rpm: u32,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: super::helpers::env_or("LLM_API_KEY", ""),
            base_url: super::helpers::env_or(
                "LLM_BASE_URL",
                "https://open.bigmodel.cn/api/paas/v4",
            ),
            model: super::helpers::env_or("LLM_MODEL", "glm-4-flash"),
            timeout_secs: super::helpers::env_u64("LLM_TIMEOUT_SECS", 30),
            max_retries: super::helpers::env_usize("LLM_MAX_RETRIES", 3) as u32,
            retry_base_delay_ms: super::helpers::env_u64("LLM_RETRY_BASE_DELAY_MS", 1000),
            retry_factor: super::helpers::env_f32("LLM_RETRY_FACTOR", 1.5),
            rate_limit_rpm: super::helpers::env_usize("LLM_RATE_LIMIT_RPM", 120) as u32,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow::anyhow!(
                "LLM_API_KEY is required to reach the chat-completions endpoint"
            ));
        }
        Ok(())
    }
}
