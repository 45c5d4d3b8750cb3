// src/config/mod.rs
// Central, layered configuration for the search orchestrator. Each domain
// component owns its own sub-config with a `from_env()` constructor; this
// module composes them into one aggregate that is loaded once at startup
// and handed to components as an explicit constructor argument rather than
// read from a global on every call, so components stay test-friendly.

pub mod embedding;
pub mod helpers;
pub mod llm;
pub mod profile_api;
pub mod retriever;
pub mod server;
pub mod vector_store;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: OrchestratorConfig = OrchestratorConfig::from_env();
}

/// Aggregate configuration for the orchestrator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub llm: llm::LlmConfig,
    pub vector_store: vector_store::VectorStoreConfig,
    pub embedding: embedding::EmbeddingConfig,
    pub profile_api: profile_api::ProfileApiConfig,
    pub retriever: retriever::RetrieverConfig,
    pub server: server::ServerConfig,
    pub logging: server::LoggingConfig,
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            llm: llm::LlmConfig::from_env(),
            vector_store: vector_store::VectorStoreConfig::from_env(),
            embedding: embedding::EmbeddingConfig::from_env(),
            profile_api: profile_api::ProfileApiConfig::from_env(),
            retriever: retriever::RetrieverConfig::from_env(),
            server: server::ServerConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
        }
    }

    /// Validate config on startup
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.validate()?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
