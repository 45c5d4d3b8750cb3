// src/config/retriever.rs
// Hybrid Retriever configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Weight given to the dense signal in DBSF fusion; sparse gets `1.0 - dbsf_alpha`.
    /// Open question in the source spec, resolved here as a tunable default.
    pub dbsf_alpha: f32,
    pub rrf_k: f32,
}

impl RetrieverConfig {
    pub fn from_env() -> Self {
        Self {
            dbsf_alpha: super::helpers::env_f32("RETRIEVER_DBSF_ALPHA", 0.2),
            rrf_k: super::helpers::env_f32("RETRIEVER_RRF_K", 60.0),
        }
    }
}
