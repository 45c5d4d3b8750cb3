// src/profile/mod.rs
// Profile API Client: fetches full profile records for candidate ids,
// bounded-concurrency batch fan-out against an external profile service.

use futures::stream::{self, StreamExt};
use std::time::Duration;

use crate::config::profile_api::ProfileApiConfig;
use crate::error::ProfileApiError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

pub struct ProfileApiClient {
    client: reqwest::Client,
    config: ProfileApiConfig,
}

impl ProfileApiClient {
    pub fn new(config: ProfileApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn get(&self, user_id: &str) -> Result<Profile, ProfileApiError> {
        let url = format!("{}/users/{}", self.config.base_url, user_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProfileApiError::RequestFailed(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProfileApiError::NotFound(user_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(ProfileApiError::RequestFailed(format!("HTTP {}", resp.status())));
        }

        resp.json()
            .await
            .map_err(|e| ProfileApiError::RequestFailed(e.to_string()))
    }

    /// Bounded-concurrency batch fetch, capped at `max_batch_concurrency`
    /// (default 32) in-flight requests, with a ~30s deadline for the whole
    /// batch (§5 Concurrency & Resource Model). Results are paired with the
    /// requested id rather than returned positionally, since
    /// `buffer_unordered` completes them out of order.
    pub async fn get_batch(&self, user_ids: &[String]) -> Vec<(String, Option<Profile>)> {
        let deadline = Duration::from_secs(30);
        let fetches = stream::iter(user_ids.iter().cloned())
            .map(|user_id| async move {
                let profile = self.get(&user_id).await.ok();
                (user_id, profile)
            })
            .buffer_unordered(self.config.max_batch_concurrency);

        match tokio::time::timeout(deadline, fetches.collect::<Vec<_>>()).await {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!("profile API batch fetch exceeded 30s deadline");
                Vec::new()
            }
        }
    }
}
