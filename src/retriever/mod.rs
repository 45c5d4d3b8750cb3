// src/retriever/mod.rs
// Hybrid Retriever: escalates through standard -> expanded -> custom
// strategies, fusing dense and sparse signals via DBSF (default) with a
// raw-order fallback if the fusion computation itself fails. Strategy
// escalation is strictly sequential: attempt k's evaluation always
// completes before attempt k+1 starts.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::retriever::RetrieverConfig;
use crate::embedding::{EmbeddingEngine, SparseVector};
use crate::model::Candidate;
use crate::profile::ProfileApiClient;
use crate::vectorstore::{SearchFilter, VectorStoreClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Standard,
    Expanded,
    Custom,
}

impl Strategy {
    /// Prefetch K per strategy, per the source adapter's exact formulas.
    fn prefetch_k(&self, limit: usize) -> usize {
        match self {
            Strategy::Standard => limit.max(50),
            Strategy::Expanded => limit.max(150),
            Strategy::Custom => 120,
        }
    }

    fn next(&self) -> Option<Strategy> {
        match self {
            Strategy::Standard => Some(Strategy::Expanded),
            Strategy::Expanded => Some(Strategy::Custom),
            Strategy::Custom => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Standard => "standard",
            Strategy::Expanded => "expanded",
            Strategy::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FusionMethod {
    Dbsf,
    Rrf,
}

pub struct HybridRetriever {
    embeddings: Arc<dyn EmbeddingEngine>,
    store: Arc<dyn VectorStoreClient>,
    profile_client: Arc<ProfileApiClient>,
    config: RetrieverConfig,
}

impl HybridRetriever {
    pub fn new(
        embeddings: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn VectorStoreClient>,
        profile_client: Arc<ProfileApiClient>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embeddings,
            store,
            profile_client,
            config,
        }
    }

    /// Runs a single strategy attempt against the default (standard)
    /// strategy with no swiped-id post-filter and no detail enrichment.
    /// Most callers go through `search_with_strategy` directly; this
    /// wrapper exists for simple single-shot callers.
    pub async fn search(
        &self,
        dense_query: &str,
        sparse_query: &str,
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> anyhow::Result<Vec<Candidate>> {
        self.search_with_strategy(
            dense_query,
            sparse_query,
            limit,
            filter,
            &[],
            false,
            Strategy::Standard,
        )
        .await
    }

    /// Encodes `dense_query`/`sparse_query`, asks the Vector Store Client
    /// for `prefetch_k(limit)` candidates (already excluding `viewed_ids`
    /// via `filter`), fuses scores, then drops any candidate whose
    /// `user_id` is in `swiped_ids` -- even though such candidates may have
    /// been present in the pre-filter pool. Returns up to `limit`
    /// survivors; a shorter result signals to the caller that this
    /// strategy should be escalated. When `fetch_details` is set, survivors
    /// are enriched with a Profile API batch lookup before returning.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_with_strategy(
        &self,
        dense_query: &str,
        sparse_query: &str,
        limit: usize,
        filter: Option<&SearchFilter>,
        swiped_ids: &[String],
        fetch_details: bool,
        strategy: Strategy,
    ) -> anyhow::Result<Vec<Candidate>> {
        let dense = self.embeddings.embed_dense(dense_query).await?;
        let sparse = self.embeddings.embed_sparse(sparse_query).await.ok();

        let top_k = strategy.prefetch_k(limit);
        let candidates = self
            .store
            .hybrid_search(&dense, sparse.as_ref(), top_k, filter)
            .await?;

        let fusion_method = match strategy {
            Strategy::Standard | Strategy::Custom => FusionMethod::Dbsf,
            Strategy::Expanded => FusionMethod::Rrf,
        };
        let fused = self.fuse(candidates, sparse.as_ref(), fusion_method);

        let survivors: Vec<Candidate> = fused
            .into_iter()
            .filter(|c| !swiped_ids.iter().any(|s| s == &c.user_id))
            .take(limit)
            .map(Self::strip_internal_fields)
            .collect();

        if fetch_details {
            Ok(self.enrich_with_profiles(survivors).await)
        } else {
            Ok(survivors)
        }
    }

    /// Looks up each survivor's `user_id` through the Profile API in one
    /// bounded-concurrency batch, then merges the returned fields *over*
    /// the vector payload -- database fields win on conflict, vector-only
    /// fields are kept as supplements. A missing or 404'd profile doesn't
    /// drop the candidate; it's flagged so the caller can render a
    /// placeholder instead.
    async fn enrich_with_profiles(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }

        let ids: Vec<String> = candidates.iter().map(|c| c.user_id.clone()).collect();
        let mut fetched: HashMap<String, Option<crate::profile::Profile>> =
            self.profile_client.get_batch(&ids).await.into_iter().collect();

        candidates
            .into_iter()
            .map(|mut candidate| match fetched.remove(&candidate.user_id) {
                Some(Some(profile)) => {
                    for (key, value) in profile.fields {
                        candidate.payload.insert(key, value);
                    }
                    candidate
                }
                _ => {
                    candidate
                        .payload
                        .insert("error".to_string(), serde_json::json!("User does not exist"));
                    candidate
                }
            })
            .collect()
    }

    /// Strips retriever-internal payload keys (the raw sparse term map used
    /// for reranking) before candidates leave this component.
    fn strip_internal_fields(mut candidate: Candidate) -> Candidate {
        candidate.payload.remove("sparse_vector_data");
        candidate
    }

    pub fn next_strategy(strategy: Strategy) -> Option<Strategy> {
        strategy.next()
    }

    /// Blend dense rank score with a sparse term-overlap score. DBSF
    /// z-score normalizes each signal before blending with `dbsf_alpha`
    /// weight on dense (default 0.2) and the remainder on sparse. If the
    /// fusion computation fails for any reason, falls back to the
    /// adapter's raw result order rather than aborting the turn.
    fn fuse(
        &self,
        candidates: Vec<Candidate>,
        sparse_query: Option<&SparseVector>,
        method: FusionMethod,
    ) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }

        let fused = match method {
            FusionMethod::Dbsf => self.fuse_dbsf(&candidates, sparse_query),
            FusionMethod::Rrf => self.fuse_rrf(&candidates),
        };

        // A fusion pass that somehow yields no scored candidates (e.g. a
        // malformed sparse payload) falls back to the store's raw result
        // order rather than aborting the turn.
        if fused.len() != candidates.len() {
            return candidates;
        }

        let mut fused = fused;
        // Ties broken by user_id ascending for determinism (spec's custom-fusion
        // tie-break, applied uniformly since RRF/DBSF can both produce exact ties).
        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        fused
    }

    fn fuse_dbsf(&self, candidates: &[Candidate], sparse_query: Option<&SparseVector>) -> Vec<Candidate> {
        let dense_scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
        let dense_z = z_scores(&dense_scores);

        let sparse_scores: Vec<f32> = candidates
            .iter()
            .map(|c| sparse_overlap_score(c, sparse_query))
            .collect();
        let sparse_z = z_scores(&sparse_scores);

        let alpha = self.config.dbsf_alpha;
        candidates
            .iter()
            .cloned()
            .zip(dense_z.iter().zip(sparse_z.iter()))
            .map(|(mut candidate, (d, s))| {
                candidate.score = alpha * d + (1.0 - alpha) * s;
                candidate
            })
            .collect()
    }

    fn fuse_rrf(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let k = self.config.rrf_k;
        candidates
            .iter()
            .enumerate()
            .map(|(rank, candidate)| {
                let mut candidate = candidate.clone();
                candidate.score = 1.0 / (k + rank as f32 + 1.0);
                candidate
            })
            .collect()
    }
}

fn z_scores(values: &[f32]) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std_dev).collect()
}

fn sparse_overlap_score(candidate: &Candidate, sparse_query: Option<&SparseVector>) -> f32 {
    let sparse_query = match sparse_query {
        Some(s) => s,
        None => return 0.0,
    };

    let candidate_terms = candidate
        .payload
        .get("sparse_vector_data")
        .and_then(|v| v.as_object());

    match candidate_terms {
        Some(terms) => sparse_query
            .iter()
            .filter_map(|(term, weight)| {
                terms
                    .get(term)
                    .and_then(|v| v.as_f64())
                    .map(|candidate_weight| weight * candidate_weight as f32)
            })
            .sum(),
        None => 0.0,
    }
}
