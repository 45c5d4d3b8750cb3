// src/config/server.rs
// HTTP server and logging configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Recommended cooperative deadline for a single search turn (§5 Cancellation).
    pub turn_deadline_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("ORCHESTRATOR_HOST", "0.0.0.0"),
            port: super::helpers::env_usize("ORCHESTRATOR_PORT", 8080) as u16,
            turn_deadline_secs: super::helpers::env_u64("ORCHESTRATOR_TURN_DEADLINE_SECS", 60),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: super::helpers::env_or("ORCHESTRATOR_LOG_LEVEL", "info"),
            json: super::helpers::env_bool("ORCHESTRATOR_LOG_JSON", false),
        }
    }
}
