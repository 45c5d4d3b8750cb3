// src/model.rs
// Shared data model for the search orchestrator.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A candidate profile surfaced by the Hybrid Retriever and ranked by the
/// Candidate Evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub user_id: String,
    pub score: f32,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Detected conversational intent for an incoming turn. Unknown intents
/// returned by the classifier collapse to `Chat` at the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Search,
    Inquiry,
    Chat,
    Casual,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Search => "search",
            Intent::Inquiry => "inquiry",
            Intent::Chat => "chat",
            Intent::Casual => "casual",
        }
    }
}

/// Result of intent classification, including the confidence and tie-break
/// reasoning the classifier attached to its decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub intent: Intent,
    pub confidence: f32,
    pub reasoning: String,
    pub clarification_needed: bool,
    pub uncertainty_reason: String,
}

/// Detected conversational language plus the confidence of the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageDetection {
    pub language: String,
    pub confidence: f32,
}

/// Quality tier assigned to a retrieved-and-evaluated candidate set.
/// `Poor` means fewer than 3 candidates met the primary requirement;
/// `Fair` means exactly 3 with weak mutual fit; `Good`/`Excellent` mean
/// 3+ with decent/strong mutual fit respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl OverallQuality {
    /// `good`/`excellent` are the quality tiers that satisfy the Scheduler's
    /// strategy-escalation stop condition on their own.
    pub fn is_satisfactory(&self) -> bool {
        matches!(self, OverallQuality::Good | OverallQuality::Excellent)
    }
}

/// A Candidate enriched with the Evaluator's bidirectional-fit judgement.
/// `payload` is the original candidate's payload, copied back in during the
/// enrichment step so downstream consumers never see a bare LLM fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysedCandidate {
    pub user_id: String,
    pub match_score: f32,
    #[serde(default)]
    pub key_strengths: Vec<String>,
    pub match_reason: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Output of the Candidate Evaluator: see spec "Analysis result". Invariant:
/// `selected_candidates` is empty when `overall_quality == Poor`; otherwise
/// it holds 1-3 entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub overall_quality: OverallQuality,
    pub candidate_count: usize,
    pub should_continue: bool,
    pub selected_candidates: Vec<AnalysedCandidate>,
    pub analysis: String,
    pub intro: String,
}

/// A match surfaced for a stored casual/activity request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasualMatch {
    pub user_id: String,
    pub summary: String,
    pub score: f32,
}

/// At most one active record per user -- `put_casual_request` upserts over
/// the existing row for `user_id` and resets `last_activity_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasualRequestRecord {
    pub user_id: String,
    pub original_query: String,
    pub optimised_query: String,
    #[serde(default)]
    pub province_id: Option<String>,
    #[serde(default)]
    pub city_id: Option<String>,
    #[serde(default = "default_preferences")]
    pub preferences: serde_json::Value,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
}

fn default_preferences() -> serde_json::Value {
    serde_json::json!({})
}

/// Process-wide counters. All six fields are always surfaced by the
/// snapshot accessor -- `vector_searches` and `casual_count` are tracked
/// alongside the rest, not dropped from the read path.
#[derive(Debug, Default)]
pub struct Statistics {
    search_count: AtomicU64,
    total_search_time_micros: AtomicU64,
    llm_calls: AtomicU64,
    cache_hits: AtomicU64,
    vector_searches: AtomicU64,
    casual_count: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub search_count: u64,
    pub total_search_time_secs: f64,
    pub llm_calls: u64,
    pub cache_hits: u64,
    pub vector_searches: u64,
    pub casual_count: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search(&self, duration: std::time::Duration) {
        self.search_count.fetch_add(1, Ordering::Relaxed);
        self.total_search_time_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_llm_call(&self) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vector_search(&self) {
        self.vector_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_casual(&self) {
        self.casual_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Coherent-enough snapshot of every tracked field. Individual counters
    /// are atomics updated independently, so this is a "recent" view rather
    /// than a transactional one -- adequate for a stats endpoint, not for
    /// billing.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            search_count: self.search_count.load(Ordering::Relaxed),
            total_search_time_secs: self.total_search_time_micros.load(Ordering::Relaxed) as f64
                / 1_000_000.0,
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            vector_searches: self.vector_searches.load(Ordering::Relaxed),
            casual_count: self.casual_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_surfaces_every_field() {
        let stats = Statistics::new();
        stats.record_search(std::time::Duration::from_millis(250));
        stats.record_llm_call();
        stats.record_llm_call();
        stats.record_cache_hit();
        stats.record_vector_search();
        stats.record_casual();

        let snap = stats.snapshot();
        assert_eq!(snap.search_count, 1);
        assert!(snap.total_search_time_secs > 0.0);
        assert_eq!(snap.llm_calls, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.vector_searches, 1);
        assert_eq!(snap.casual_count, 1);
    }
}
