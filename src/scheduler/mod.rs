// src/scheduler/mod.rs
// Routing Scheduler: the top-level pipeline. Detects language, classifies
// intent, and dispatches to the search / inquiry / chat / casual
// sub-pipeline, wrapping the whole turn in a cooperative deadline. Failure
// inside the Retriever never surfaces a partial result -- a turn either
// completes or reports an error envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::casual::CasualRequestStore;
use crate::config::OrchestratorConfig;
use crate::evaluator::CandidateEvaluator;
use crate::intent::{detect_language, IntentClassifier};
use crate::llm::{ChatOptions, LlmProvider, Message};
use crate::model::{CasualRequestRecord, Intent, OverallQuality, Statistics};
use crate::preprocessor::QueryPreprocessor;
use crate::profile::ProfileApiClient;
use crate::retriever::{HybridRetriever, Strategy};

pub struct RoutingScheduler {
    intent_classifier: IntentClassifier,
    preprocessor: QueryPreprocessor,
    retriever: HybridRetriever,
    evaluator: CandidateEvaluator,
    profile_client: Arc<ProfileApiClient>,
    casual_store: Arc<dyn CasualRequestStore>,
    llm: Arc<dyn LlmProvider>,
    stats: Arc<Statistics>,
    turn_deadline: Duration,
}

pub struct TurnContext {
    pub user_id: String,
    pub referenced_user: Option<String>,
    pub viewed_ids: Vec<String>,
    pub swiped_ids: Vec<String>,
}

impl RoutingScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &OrchestratorConfig,
        intent_classifier: IntentClassifier,
        preprocessor: QueryPreprocessor,
        retriever: HybridRetriever,
        evaluator: CandidateEvaluator,
        profile_client: Arc<ProfileApiClient>,
        casual_store: Arc<dyn CasualRequestStore>,
        llm: Arc<dyn LlmProvider>,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            intent_classifier,
            preprocessor,
            retriever,
            evaluator,
            profile_client,
            casual_store,
            llm,
            stats,
            turn_deadline: Duration::from_secs(config.server.turn_deadline_secs),
        }
    }

    pub async fn process_turn(&self, input: &str, ctx: TurnContext) -> Value {
        match tokio::time::timeout(self.turn_deadline, self.process_turn_inner(input, &ctx)).await
        {
            Ok(value) => value,
            Err(_) => json!({
                "type": "error_response",
                "status": "error",
                "error": format!("turn exceeded deadline of {:?}", self.turn_deadline),
            }),
        }
    }

    async fn process_turn_inner(&self, input: &str, ctx: &TurnContext) -> Value {
        let start = Instant::now();
        let language = detect_language(input);

        // Current-user and referenced-user hydration: best-effort, a
        // failure here never aborts the turn, it just proceeds without
        // that context.
        let current_user = self.profile_client.get(&ctx.user_id).await.ok();
        let referenced_profile = match &ctx.referenced_user {
            Some(id) => self.profile_client.get(id).await.ok(),
            None => None,
        };

        let current_user_json = current_user
            .as_ref()
            .map(|p| serde_json::to_string_pretty(&p.fields).unwrap_or_default());
        let referenced_json = referenced_profile
            .as_ref()
            .map(|p| serde_json::to_string_pretty(&p.fields).unwrap_or_default());

        let intent_analysis = self
            .intent_classifier
            .analyze(input, referenced_json.as_deref(), current_user_json.as_deref())
            .await;

        let _turn_timer = crate::metrics::TurnTimer::new(intent_analysis.intent.as_str());

        let result = match intent_analysis.intent {
            Intent::Search => self.process_search(input, ctx).await,
            Intent::Inquiry => self.process_inquiry(input, ctx, &language.language).await,
            Intent::Chat => {
                self.process_chat(input, &language.language, intent_analysis.clarification_needed)
                    .await
            }
            Intent::Casual => self.process_casual_request(input, ctx).await,
        };

        let mut merged = result;
        if let Value::Object(ref mut map) = merged {
            map.insert(
                "intent_analysis".to_string(),
                serde_json::to_value(&intent_analysis).unwrap_or(Value::Null),
            );
            map.insert(
                "language".to_string(),
                serde_json::to_value(&language).unwrap_or(Value::Null),
            );
            map.insert(
                "processing_time".to_string(),
                json!(start.elapsed().as_secs_f64()),
            );
            map.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));
            map.insert(
                "stats".to_string(),
                serde_json::to_value(self.stats.snapshot()).unwrap_or(Value::Null),
            );
            // Superset merge fields (source implementation's top-level entry
            // point carries these through so a caller can correlate the
            // envelope with its request without re-threading state).
            map.entry("user_id").or_insert_with(|| json!(ctx.user_id));
            map.entry("referenced_ids").or_insert_with(|| {
                json!(ctx.referenced_user.iter().cloned().collect::<Vec<_>>())
            });
            map.entry("viewed_ids").or_insert_with(|| json!(ctx.viewed_ids));
        }
        merged
    }

    /// `intelligent_search` sub-pipeline: concurrent preprocessing, then
    /// strategy escalation standard -> expanded -> custom, stopping as soon
    /// as a quality gate is satisfied or strategies run out.
    async fn process_search(&self, input: &str, ctx: &TurnContext) -> Value {
        let search_start = Instant::now();
        let preprocessed = self.preprocessor.preprocess(input).await;

        let mut filter = preprocessed.filter.clone();
        filter.exclude_user_ids.extend(ctx.viewed_ids.iter().cloned());

        let limit = 10;
        let mut strategy = Strategy::Standard;
        let mut attempts = 0u32;
        let mut total_found = 0usize;

        loop {
            attempts += 1;
            self.stats.record_vector_search();
            if attempts > 1 {
                crate::metrics::record_strategy_escalation(strategy.as_str());
            }

            let search_result = self
                .retriever
                .search_with_strategy(
                    &preprocessed.dense_query,
                    &preprocessed.sparse_query,
                    limit,
                    Some(&filter),
                    &ctx.swiped_ids,
                    true,
                    strategy,
                )
                .await;
            crate::metrics::record_vector_search(search_result.is_ok());
            let candidates = search_result.unwrap_or_default();
            total_found += candidates.len();

            if candidates.is_empty() {
                match HybridRetriever::next_strategy(strategy) {
                    Some(next) => {
                        strategy = next;
                        continue;
                    }
                    None => {
                        self.stats.record_search(search_start.elapsed());
                        return self.assemble_poor_envelope(&preprocessed.dense_query, search_start, attempts);
                    }
                }
            }

            let analysis = self.evaluator.evaluate(input, &candidates).await;

            let next = HybridRetriever::next_strategy(strategy);
            let stop = analysis.overall_quality.is_satisfactory()
                || !analysis.should_continue
                || next.is_none();

            if stop {
                self.stats.record_search(search_start.elapsed());
                return self.assemble_envelope(&preprocessed.dense_query, &analysis, search_start, attempts, total_found);
            }

            strategy = next.expect("checked above");
        }
    }

    fn assemble_poor_envelope(&self, query: &str, search_start: Instant, attempts: u32) -> Value {
        json!({
            "type": "search",
            "status": "ok",
            "search_time": search_start.elapsed().as_secs_f64(),
            "query": query,
            "candidates": Vec::<Value>::new(),
            "intro_message": "No suitable candidates found. Please try expanding your search criteria.",
            "candidate_count": 0,
            "total_candidates_found": 0,
            "search_quality": "poor",
            "analysis": "every retrieval strategy returned an empty pool",
            "search_attempts": attempts,
            "performance_stats": {
                "search_time_secs": search_start.elapsed().as_secs_f64(),
            },
        })
    }

    fn assemble_envelope(
        &self,
        query: &str,
        analysis: &crate::model::AnalysisResult,
        search_start: Instant,
        attempts: u32,
        total_found: usize,
    ) -> Value {
        json!({
            "type": "search",
            "status": "ok",
            "search_time": search_start.elapsed().as_secs_f64(),
            "query": query,
            "candidates": analysis.selected_candidates,
            "intro_message": analysis.intro,
            "candidate_count": analysis.selected_candidates.len(),
            "total_candidates_found": total_found,
            "search_quality": quality_str(analysis.overall_quality),
            "analysis": analysis.analysis,
            "search_attempts": attempts,
            "performance_stats": {
                "search_time_secs": search_start.elapsed().as_secs_f64(),
            },
        })
    }

    /// `inquiry` intent with no referenced user in context downgrades to
    /// `chat` with `clarification_needed`, per the source spec -- the
    /// orchestrator has nothing to analyze without a referenced person.
    async fn process_inquiry(&self, input: &str, ctx: &TurnContext, language: &str) -> Value {
        let Some(referenced) = ctx.referenced_user.clone() else {
            let message = if language == "zh" {
                "请问您想了解哪位用户的信息？"
            } else {
                "Which user would you like to know more about?"
            };
            return json!({
                "type": "chat_response",
                "status": "ok",
                "content": message,
                "clarification": true,
            });
        };

        let profile = match self.profile_client.get(&referenced).await {
            Ok(profile) => profile,
            Err(e) => {
                return json!({
                    "type": "error_response",
                    "status": "error",
                    "error": format!("profile {referenced} not found: {e}"),
                })
            }
        };

        let prompt = format!(
            "Question: {input}\n\nProfile: {}",
            serde_json::to_string(&profile.fields).unwrap_or_default()
        );
        let messages = vec![
            Message::system(
                "Answer the question about this person's profile, concisely and in third person.",
            ),
            Message::user(prompt),
        ];
        let answer = self
            .llm
            .chat(
                messages,
                ChatOptions {
                    temperature: Some(0.3),
                    max_tokens: Some(150),
                    ..Default::default()
                },
            )
            .await
            .map(|r| r.content)
            .unwrap_or_else(|e| format!("unable to answer: {e}"));

        json!({
            "type": "inquiry_response",
            "status": "ok",
            "content": answer,
            "referenced_user": profile,
        })
    }

    /// `chat` intent: a single mode-specific LLM completion. Carries
    /// forward the classifier's `clarification_needed` flag so the caller
    /// knows whether to prompt for more detail.
    async fn process_chat(&self, input: &str, language: &str, clarification_needed: bool) -> Value {
        let system_prompt = if language == "zh" {
            "你是一个人脉搜索助手的聊天模式。友好、简洁地回应问候或闲聊，并在合适时引导用户描述他们想寻找的人。"
        } else {
            "You are the chat mode of a people-search assistant. Respond to greetings or small talk warmly and briefly, and nudge the user toward describing who they're looking for when relevant."
        };

        let messages = vec![Message::system(system_prompt), Message::user(input)];
        let content = self
            .llm
            .chat(
                messages,
                ChatOptions {
                    temperature: Some(0.5),
                    max_tokens: Some(200),
                    ..Default::default()
                },
            )
            .await
            .map(|r| r.content)
            .unwrap_or_else(|_| {
                if language == "zh" {
                    "你好！有什么我可以帮你找的人吗？".to_string()
                } else {
                    "Hi! Is there someone I can help you find?".to_string()
                }
            });

        json!({
            "type": "chat_response",
            "status": "ok",
            "content": content,
            "clarification": clarification_needed,
        })
    }

    /// Classifies and optimizes the utterance into an activity description
    /// via the Query Preprocessor's activity-partner framing (distinct from
    /// the person-search dense optimization used by `process_search`),
    /// writes through to the casual-request store, then does a best-effort
    /// read of current matches -- failures on the read never fail the write.
    async fn process_casual_request(&self, input: &str, ctx: &TurnContext) -> Value {
        self.stats.record_casual();
        let optimised_query = self.preprocessor.optimize_casual_query(input).await;

        let now = chrono::Utc::now();
        let record = CasualRequestRecord {
            user_id: ctx.user_id.clone(),
            original_query: input.to_string(),
            optimised_query: optimised_query.clone(),
            province_id: None,
            city_id: None,
            preferences: serde_json::json!({}),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        };

        let storage_result = match self.casual_store.put_casual_request(record).await {
            Ok(()) => "success",
            Err(_) => "failed",
        };

        let matches = self
            .casual_store
            .find_casual_matches(&ctx.user_id, 5)
            .await
            .unwrap_or_default();

        let ack = if matches.is_empty() {
            "Got it, I'll let you know if someone else is up for the same thing.".to_string()
        } else {
            format!(
                "Found {} people who might be up for the same thing.",
                matches.len()
            )
        };

        json!({
            "type": "casual_request",
            "status": "ok",
            "content": ack,
            "query": optimised_query,
            "storage_result": { "success": storage_result == "success" },
            "matches": matches,
        })
    }
}

fn quality_str(quality: OverallQuality) -> &'static str {
    match quality {
        OverallQuality::Poor => "poor",
        OverallQuality::Fair => "fair",
        OverallQuality::Good => "good",
        OverallQuality::Excellent => "excellent",
    }
}
