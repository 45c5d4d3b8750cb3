// src/evaluator/mod.rs
// Candidate Evaluator: a single LLM JSON call that judges bidirectional fit
// (candidate satisfies the user's query/demands/goals, and the user
// plausibly satisfies the candidate's demands/goals), tiers the result
// quality, and selects up to 3 candidates with per-candidate rationale.
// Prompt wording and the quality-tier definitions are grounded in the
// reference `analyze_candidates` method.

use std::sync::Arc;

use crate::llm::{ChatOptions, LlmProvider, Message, ResponseFormat};
use crate::model::{AnalysedCandidate, AnalysisResult, Candidate, OverallQuality};

const SYSTEM_PROMPT: &str = r#"You evaluate candidates for a people-search assistant using bidirectional matching: does the candidate satisfy the searcher's stated query, demands, and goals -- AND does the searcher plausibly satisfy the candidate's own demands and goals?

Quality tiers:
- "poor": fewer than 3 candidates meet the primary requirement.
- "fair": exactly 3 candidates qualify, with weak mutual fit.
- "good": 3 or more candidates qualify, with decent mutual fit.
- "excellent": 3 or more candidates qualify, with strong mutual fit.

Rules:
- Never include "selected_candidates" when overall_quality is "poor".
- Otherwise select 1 to 3 candidates, each with a natural-language "match_reason" and a short list of "key_strengths".
- Write an "intro" of at most 200 characters summarizing the selected set.
- Set "should_continue" to true when the search should escalate to a broader strategy (e.g. quality is "poor" or "fair" and a broader strategy might do better), false when this result is good enough to stop.

Reply in JSON: {"overall_quality": "poor"|"fair"|"good"|"excellent", "should_continue": bool, "selected_candidates": [{"candidate_id": "...", "match_score": 1-10, "key_strengths": ["..."], "match_reason": "..."}], "analysis": "...", "intro": "..."}"#;

pub struct CandidateEvaluator {
    llm: Arc<dyn LlmProvider>,
}

impl CandidateEvaluator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Evaluates up to the first 10 candidates against `user_query`.
    /// Short-circuits to a `poor` analysis without an LLM call when the
    /// candidate set is already empty.
    pub async fn evaluate(&self, user_query: &str, candidates: &[Candidate]) -> AnalysisResult {
        if candidates.is_empty() {
            return AnalysisResult {
                overall_quality: OverallQuality::Poor,
                candidate_count: 0,
                should_continue: true,
                selected_candidates: Vec::new(),
                analysis: "no candidates were retrieved".to_string(),
                intro: "No suitable candidates found. Please try expanding your search criteria.".to_string(),
            };
        }

        let considered: Vec<&Candidate> = candidates.iter().take(10).collect();
        let candidates_json: Vec<serde_json::Value> = considered
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut payload = c.payload.clone();
                payload.remove("sparse_vector_data");
                serde_json::json!({
                    "index": i,
                    "candidate_id": c.user_id,
                    "score": c.score,
                    "profile": payload,
                })
            })
            .collect();

        let user_prompt = format!(
            "Request: {}\n\nCandidates ({} total retrieved, showing up to 10):\n{}",
            user_query,
            candidates.len(),
            serde_json::to_string(&candidates_json).unwrap_or_default()
        );

        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(user_prompt)];
        let options = ChatOptions {
            temperature: Some(0.2),
            max_tokens: Some(2000),
            response_format: Some(ResponseFormat::JsonObject),
            ..Default::default()
        };

        match self.llm.json_chat(messages, options).await {
            Ok(value) => Self::parse_result(value, candidates),
            Err(_) => Self::degraded_fallback(candidates),
        }
    }

    fn parse_result(value: serde_json::Value, candidates: &[Candidate]) -> AnalysisResult {
        let overall_quality = match value["overall_quality"].as_str().unwrap_or("poor") {
            "excellent" => OverallQuality::Excellent,
            "good" => OverallQuality::Good,
            "fair" => OverallQuality::Fair,
            _ => OverallQuality::Poor,
        };

        let mut selected: Vec<AnalysedCandidate> = if overall_quality == OverallQuality::Poor {
            Vec::new()
        } else {
            value["selected_candidates"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|item| {
                            let candidate_id = item["candidate_id"].as_str()?.to_string();
                            let payload = candidates
                                .iter()
                                .find(|c| c.user_id == candidate_id)
                                .map(|c| {
                                    let mut p = c.payload.clone();
                                    p.remove("sparse_vector_data");
                                    p
                                })
                                .unwrap_or_default();
                            Some(AnalysedCandidate {
                                user_id: candidate_id,
                                match_score: item["match_score"].as_f64().unwrap_or(5.0) as f32,
                                key_strengths: item["key_strengths"]
                                    .as_array()
                                    .map(|a| {
                                        a.iter()
                                            .filter_map(|v| v.as_str().map(str::to_string))
                                            .collect()
                                    })
                                    .unwrap_or_default(),
                                match_reason: item["match_reason"]
                                    .as_str()
                                    .unwrap_or_default()
                                    .to_string(),
                                payload,
                            })
                        })
                        .take(3)
                        .collect()
                })
                .unwrap_or_default()
        };
        // Quality gate: poor implies no selection; everything else must
        // have at least one entry, even if the LLM under-delivered.
        if overall_quality != OverallQuality::Poor && selected.is_empty() {
            selected = Self::degraded_fallback(candidates).selected_candidates;
        }

        AnalysisResult {
            overall_quality,
            candidate_count: candidates.len(),
            should_continue: value["should_continue"].as_bool().unwrap_or(!overall_quality.is_satisfactory()),
            selected_candidates: selected,
            analysis: value["analysis"].as_str().unwrap_or_default().to_string(),
            intro: {
                let intro = value["intro"].as_str().unwrap_or_default();
                if intro.is_empty() {
                    "Here are some candidates that may be a good fit.".to_string()
                } else {
                    intro.chars().take(200).collect()
                }
            },
        }
    }

    /// LLM failure path: mark quality `fair`, keep the first three
    /// candidates, and compose a default rationale from payload fields
    /// (skills, university, project count, current company) rather than
    /// leaving `match_reason` empty.
    fn degraded_fallback(candidates: &[Candidate]) -> AnalysisResult {
        let selected: Vec<AnalysedCandidate> = candidates
            .iter()
            .take(3)
            .map(|c| {
                let mut payload = c.payload.clone();
                payload.remove("sparse_vector_data");
                AnalysedCandidate {
                    user_id: c.user_id.clone(),
                    match_score: (c.score * 10.0).clamp(1.0, 10.0),
                    key_strengths: Vec::new(),
                    match_reason: default_match_reason(&payload),
                    payload,
                }
            })
            .collect();

        AnalysisResult {
            overall_quality: OverallQuality::Fair,
            candidate_count: candidates.len(),
            should_continue: true,
            selected_candidates: selected,
            analysis: "evaluation unavailable, showing closest retrieved matches".to_string(),
            intro: "We found some candidates, though detailed analysis wasn't available this time."
                .to_string(),
        }
    }
}

/// Builds a plausible-sounding rationale out of whatever profile fields are
/// present, for the LLM-unavailable degraded path.
fn default_match_reason(payload: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut parts = Vec::new();

    if let Some(skills) = payload.get("skills").and_then(|v| v.as_array()) {
        let skills: Vec<&str> = skills.iter().filter_map(|v| v.as_str()).collect();
        if !skills.is_empty() {
            parts.push(format!("skills in {}", skills.join(", ")));
        }
    }
    if let Some(university) = payload.get("current_university").and_then(|v| v.as_str()) {
        parts.push(format!("studied at {university}"));
    }
    if let Some(count) = payload.get("project_count").and_then(|v| v.as_u64()) {
        parts.push(format!("{count} projects on record"));
    }
    if let Some(company) = payload.get("current_company").and_then(|v| v.as_str()) {
        parts.push(format!("currently at {company}"));
    }

    if parts.is_empty() {
        "Retrieved as a close semantic match to your request.".to_string()
    } else {
        format!("Matched on {}.", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::LlmError;
    use crate::llm::ChatResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        reply: String,
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                content: self.reply.clone(),
                model: "x".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            user_id: id.to_string(),
            score: 0.8,
            payload: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn empty_candidates_short_circuit_without_llm_call() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            reply: "{}".to_string(),
        });
        let evaluator = CandidateEvaluator::new(provider.clone());
        let result = evaluator.evaluate("rust devs", &[]).await;

        assert_eq!(result.overall_quality, OverallQuality::Poor);
        assert!(result.selected_candidates.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn poor_quality_never_carries_selected_candidates() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            reply: r#"{"overall_quality": "poor", "selected_candidates": [{"candidate_id": "1", "match_score": 9}], "analysis": "weak", "intro": "no luck"}"#.to_string(),
        });
        let evaluator = CandidateEvaluator::new(provider);
        let result = evaluator.evaluate("rust devs", &[candidate("1")]).await;

        assert_eq!(result.overall_quality, OverallQuality::Poor);
        assert!(result.selected_candidates.is_empty());
    }

    #[tokio::test]
    async fn good_quality_keeps_one_to_three_selections() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            reply: r#"{"overall_quality": "good", "should_continue": false, "selected_candidates": [{"candidate_id": "1", "match_score": 8, "key_strengths": ["rust"], "match_reason": "strong fit"}], "analysis": "solid", "intro": "Found a great match."}"#.to_string(),
        });
        let evaluator = CandidateEvaluator::new(provider);
        let result = evaluator
            .evaluate("rust devs", &[candidate("1"), candidate("2")])
            .await;

        assert_eq!(result.overall_quality, OverallQuality::Good);
        assert!(!result.should_continue);
        assert_eq!(result.selected_candidates.len(), 1);
        assert_eq!(result.selected_candidates[0].match_reason, "strong fit");
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_fair_with_first_three() {
        struct FailingProvider;
        #[async_trait]
        impl LlmProvider for FailingProvider {
            fn name(&self) -> &'static str {
                "failing"
            }
            async fn chat(
                &self,
                _messages: Vec<Message>,
                _options: ChatOptions,
            ) -> Result<ChatResponse, LlmError> {
                Err(LlmError::Unavailable("down".to_string()))
            }
        }

        let evaluator = CandidateEvaluator::new(Arc::new(FailingProvider));
        let candidates: Vec<Candidate> = (1..=5).map(|i| candidate(&i.to_string())).collect();
        let result = evaluator.evaluate("rust devs", &candidates).await;

        assert_eq!(result.overall_quality, OverallQuality::Fair);
        assert_eq!(result.selected_candidates.len(), 3);
        assert!(result
            .selected_candidates
            .iter()
            .all(|c| !c.match_reason.is_empty()));
    }
}
