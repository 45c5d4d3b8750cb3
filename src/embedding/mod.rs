// src/embedding/mod.rs
// Embedding Engine: dense (BGE-M3-class) + sparse (SPLADE-class primary,
// TF-IDF fallback) text encoders behind a single handle, built once at
// startup and shared via Arc.

pub mod sparse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::embedding::EmbeddingConfig;
use crate::error::EmbeddingError;

pub use sparse::{tfidf_sparse_vector, SparseVector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseVector(pub Vec<f32>);

impl DenseVector {
    /// L2-normalize in place. Dense vectors from the reference encoder are
    /// expected to already be unit-length, but callers that build vectors
    /// from raw model output should normalize before handing them to the
    /// Vector Store Client.
    pub fn normalize(&mut self) {
        let norm: f32 = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in self.0.iter_mut() {
                *x /= norm;
            }
        }
    }
}

#[async_trait]
pub trait EmbeddingEngine: Send + Sync {
    /// Dense embedding for a text. The dense encoder is the hard dependency
    /// of the search path: failure here is fatal to that turn.
    async fn embed_dense(&self, text: &str) -> Result<DenseVector, EmbeddingError>;

    /// Sparse embedding for a text. Prefers a SPLADE-class encoder when one
    /// is configured; otherwise computes a TF-IDF vector locally, which
    /// never fails (it's pure computation), so this only returns an error
    /// when a remote sparse encoder is configured and unreachable.
    async fn embed_sparse(&self, text: &str) -> Result<SparseVector, EmbeddingError>;
}

pub struct HttpEmbeddingEngine {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingEngine {
    pub fn new(config: EmbeddingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingEngine for HttpEmbeddingEngine {
    async fn embed_dense(&self, text: &str) -> Result<DenseVector, EmbeddingError> {
        if self.config.dense_endpoint.is_empty() {
            return Err(EmbeddingError::DenseUnavailable(
                "EMBEDDING_DENSE_ENDPOINT not configured".to_string(),
            ));
        }

        let resp = self
            .client
            .post(&self.config.dense_endpoint)
            .bearer_auth(&self.config.dense_api_key)
            .json(&serde_json::json!({ "input": text }))
            .send()
            .await
            .map_err(|e| EmbeddingError::DenseUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EmbeddingError::DenseUnavailable(format!(
                "HTTP {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::DenseUnavailable(e.to_string()))?;

        let values = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| EmbeddingError::DenseUnavailable("missing embedding field".into()))?;

        let mut vec = DenseVector(
            values
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect(),
        );
        vec.normalize();
        Ok(vec)
    }

    async fn embed_sparse(&self, text: &str) -> Result<SparseVector, EmbeddingError> {
        match &self.config.sparse_endpoint {
            None => Ok(tfidf_sparse_vector(text)),
            Some(endpoint) => {
                let resp = self
                    .client
                    .post(endpoint)
                    .bearer_auth(&self.config.dense_api_key)
                    .json(&serde_json::json!({ "input": text }))
                    .send()
                    .await
                    .map_err(|e| EmbeddingError::SparseUnavailable(e.to_string()))?;

                if !resp.status().is_success() {
                    return Err(EmbeddingError::SparseUnavailable(format!(
                        "HTTP {}",
                        resp.status()
                    )));
                }

                let body: SparseVector = resp
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::SparseUnavailable(e.to_string()))?;
                Ok(body)
            }
        }
    }
}
