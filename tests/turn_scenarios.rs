// tests/turn_scenarios.rs
// End-to-end scenarios through the Routing Scheduler, with hand-written
// mock implementations standing in for the LLM, embedding, vector store,
// and profile API dependencies -- no mocking framework, matching the
// style of the rest of this codebase's tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use search_orchestrator::casual::InMemoryCasualRequestStore;
use search_orchestrator::config::OrchestratorConfig;
use search_orchestrator::embedding::{DenseVector, EmbeddingEngine, SparseVector};
use search_orchestrator::error::{EmbeddingError, LlmError, VectorStoreError};
use search_orchestrator::evaluator::CandidateEvaluator;
use search_orchestrator::intent::IntentClassifier;
use search_orchestrator::llm::{ChatOptions, ChatResponse, LlmProvider, Message};
use search_orchestrator::model::{Candidate, Statistics};
use search_orchestrator::preprocessor::QueryPreprocessor;
use search_orchestrator::profile::ProfileApiClient;
use search_orchestrator::retriever::HybridRetriever;
use search_orchestrator::scheduler::{RoutingScheduler, TurnContext};
use search_orchestrator::vectorstore::{SearchFilter, VectorStoreClient};

/// Scripted LLM: returns a canned reply for each prompt role, keyed by
/// substring-matching the system prompt. This keeps every scheduler stage
/// driven by the same mock without a recording/replay framework.
struct ScriptedLlm {
    calls: AtomicUsize,
    intent_reply: String,
}

impl ScriptedLlm {
    fn new(intent_reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            intent_reply: intent_reply.to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let content = if system.contains("intent classifier") {
            self.intent_reply.clone()
        } else if system.contains("structured search filters") {
            "{}".to_string()
        } else if system.contains("keyword tags") {
            "rust kubernetes beijing".to_string()
        } else if system.contains("dense semantic retrieval") {
            "experienced rust engineers who enjoy outdoor activities".to_string()
        } else if system.contains("activity they want a partner for") {
            "watching movies this weekend".to_string()
        } else if system.contains("bidirectional matching") {
            r#"{"overall_quality": "good", "should_continue": false, "selected_candidates": [{"candidate_id": "1", "match_score": 9, "key_strengths": ["rust"], "match_reason": "strong rust background"}], "analysis": "solid fit", "intro": "Found a great match for you."}"#.to_string()
        } else if options.response_format.is_some() {
            "{}".to_string()
        } else {
            "ok".to_string()
        };

        Ok(ChatResponse {
            content,
            model: "scripted-model".to_string(),
            prompt_tokens: 1,
            completion_tokens: 1,
        })
    }
}

struct FakeEmbeddings;

#[async_trait]
impl EmbeddingEngine for FakeEmbeddings {
    async fn embed_dense(&self, _text: &str) -> Result<DenseVector, EmbeddingError> {
        Ok(DenseVector(vec![0.1, 0.2, 0.3]))
    }

    async fn embed_sparse(&self, text: &str) -> Result<SparseVector, EmbeddingError> {
        Ok(search_orchestrator::embedding::tfidf_sparse_vector(text))
    }
}

struct FakeVectorStore;

#[async_trait]
impl VectorStoreClient for FakeVectorStore {
    async fn hybrid_search(
        &self,
        _dense: &DenseVector,
        _sparse: Option<&SparseVector>,
        _top_k: usize,
        _filter: Option<&SearchFilter>,
    ) -> Result<Vec<Candidate>, VectorStoreError> {
        let mut payload = serde_json::Map::new();
        payload.insert("name".to_string(), serde_json::json!("Alex Chen"));
        payload.insert("skills".to_string(), serde_json::json!(["rust", "kubernetes"]));
        Ok(vec![Candidate {
            user_id: "1".to_string(),
            score: 0.92,
            payload,
        }])
    }

    async fn insert_upsert(
        &self,
        _user_id: &str,
        _dense: &DenseVector,
        _sparse: Option<&SparseVector>,
        _payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// A store that always reports the requested candidate as swiped, to
/// exercise the escalation-on-exhaustion path.
struct EmptyVectorStore;

#[async_trait]
impl VectorStoreClient for EmptyVectorStore {
    async fn hybrid_search(
        &self,
        _dense: &DenseVector,
        _sparse: Option<&SparseVector>,
        _top_k: usize,
        _filter: Option<&SearchFilter>,
    ) -> Result<Vec<Candidate>, VectorStoreError> {
        Ok(Vec::new())
    }

    async fn insert_upsert(
        &self,
        _user_id: &str,
        _dense: &DenseVector,
        _sparse: Option<&SparseVector>,
        _payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Spins up a tiny axum server standing in for the external Profile API, the
/// same `TcpListener::bind("127.0.0.1:0")` + `axum::serve` pattern used
/// elsewhere in this codebase's integration tests, rather than a mocking
/// framework.
async fn spawn_profile_api() -> (String, tokio::task::JoinHandle<()>) {
    use axum::{extract::Path, routing::get, Json, Router};

    async fn get_user(Path(user_id): Path<String>) -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "user_id": user_id,
            "name": "Jordan Lee",
            "skills": ["rust", "distributed systems"],
            "project_experience": "Led a team building a Rust-based search platform.",
        }))
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/users/{user_id}", get(get_user));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    (format!("http://{addr}"), handle)
}

fn build_scheduler_with_store(
    llm: Arc<dyn LlmProvider>,
    vector_store: Arc<dyn VectorStoreClient>,
) -> RoutingScheduler {
    let config = OrchestratorConfig::from_env();
    let stats = Arc::new(Statistics::new());
    let embeddings: Arc<dyn EmbeddingEngine> = Arc::new(FakeEmbeddings);
    let profile_client = Arc::new(ProfileApiClient::new(config.profile_api.clone()).unwrap());
    let casual_store = Arc::new(InMemoryCasualRequestStore::new());

    let intent_classifier = IntentClassifier::new(llm.clone());
    let preprocessor = QueryPreprocessor::new(llm.clone());
    let retriever = HybridRetriever::new(
        embeddings,
        vector_store,
        profile_client.clone(),
        config.retriever.clone(),
    );
    let evaluator = CandidateEvaluator::new(llm.clone());

    RoutingScheduler::new(
        &config,
        intent_classifier,
        preprocessor,
        retriever,
        evaluator,
        profile_client,
        casual_store,
        llm,
        stats,
    )
}

fn build_scheduler(llm: Arc<dyn LlmProvider>) -> RoutingScheduler {
    build_scheduler_with_store(llm, Arc::new(FakeVectorStore))
}

fn build_scheduler_with_profile_api(llm: Arc<dyn LlmProvider>, base_url: String) -> RoutingScheduler {
    let mut config = OrchestratorConfig::from_env();
    config.profile_api.base_url = base_url;
    let stats = Arc::new(Statistics::new());
    let embeddings: Arc<dyn EmbeddingEngine> = Arc::new(FakeEmbeddings);
    let profile_client = Arc::new(ProfileApiClient::new(config.profile_api.clone()).unwrap());
    let casual_store = Arc::new(InMemoryCasualRequestStore::new());

    let intent_classifier = IntentClassifier::new(llm.clone());
    let preprocessor = QueryPreprocessor::new(llm.clone());
    let retriever = HybridRetriever::new(
        embeddings,
        Arc::new(FakeVectorStore),
        profile_client.clone(),
        config.retriever.clone(),
    );
    let evaluator = CandidateEvaluator::new(llm.clone());

    RoutingScheduler::new(
        &config,
        intent_classifier,
        preprocessor,
        retriever,
        evaluator,
        profile_client,
        casual_store,
        llm,
        stats,
    )
}

fn ctx(user_id: &str) -> TurnContext {
    TurnContext {
        user_id: user_id.to_string(),
        referenced_user: None,
        viewed_ids: Vec::new(),
        swiped_ids: Vec::new(),
    }
}

#[tokio::test]
async fn search_turn_returns_ranked_candidates() {
    let llm = Arc::new(ScriptedLlm::new(
        r#"{"intent": "search", "confidence": 0.9, "reasoning": "criteria given", "clarification_needed": false, "uncertainty_reason": ""}"#,
    ));
    let scheduler = build_scheduler(llm);

    let result = scheduler
        .process_turn("Looking for a rust engineer in Beijing who hikes", ctx("u1"))
        .await;

    assert_eq!(result["type"], "search");
    assert_eq!(result["search_quality"], "good");
    assert_eq!(result["candidate_count"], 1);
    assert!(result["candidates"][0]["match_reason"].as_str().unwrap().len() > 0);
    assert!(result["intro_message"].as_str().unwrap().len() > 0);
    assert_eq!(result["stats"]["search_count"], 1);
}

#[tokio::test]
async fn search_exhausts_all_strategies_when_pool_is_empty() {
    let llm = Arc::new(ScriptedLlm::new(
        r#"{"intent": "search", "confidence": 0.9, "reasoning": "criteria given", "clarification_needed": false, "uncertainty_reason": ""}"#,
    ));
    let scheduler = build_scheduler_with_store(llm, Arc::new(EmptyVectorStore));

    let result = scheduler
        .process_turn("find me a mobile developer", ctx("u1"))
        .await;

    assert_eq!(result["type"], "search");
    assert_eq!(result["search_quality"], "poor");
    assert_eq!(result["search_attempts"], 3);
    assert_eq!(result["candidates"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn casual_turn_is_classified_distinctly_from_chat_and_stored() {
    let llm = Arc::new(ScriptedLlm::new(
        r#"{"intent": "casual", "confidence": 0.8, "reasoning": "social activity invite", "clarification_needed": false, "uncertainty_reason": ""}"#,
    ));
    let scheduler = build_scheduler(llm);

    let result = scheduler
        .process_turn("anyone want to hang out this weekend?", ctx("u2"))
        .await;

    assert_eq!(result["type"], "casual_request");
    assert_eq!(result["storage_result"]["success"], true);
    assert_eq!(result["intent_analysis"]["intent"], "casual");
    assert!(result["query"].as_str().unwrap().contains("movies"));
}

#[tokio::test]
async fn chat_turn_gets_a_genuine_chat_reply_not_the_casual_pipeline() {
    let llm = Arc::new(ScriptedLlm::new(
        r#"{"intent": "chat", "confidence": 0.4, "reasoning": "vague", "clarification_needed": false, "uncertainty_reason": ""}"#,
    ));
    let scheduler = build_scheduler(llm);

    let result = scheduler
        .process_turn("Hello! How does this platform work?", ctx("u3"))
        .await;

    assert_eq!(result["type"], "chat_response");
    assert!(result["content"].as_str().unwrap().len() > 0);
    assert_eq!(result["intent_analysis"]["intent"], "chat");
}

#[tokio::test]
async fn inquiry_without_referenced_user_downgrades_to_chat_with_clarification() {
    let llm = Arc::new(ScriptedLlm::new(
        r#"{"intent": "inquiry", "confidence": 0.7, "reasoning": "asks about a person", "clarification_needed": false, "uncertainty_reason": ""}"#,
    ));
    let scheduler = build_scheduler(llm);

    let mut turn_ctx = ctx("u4");
    turn_ctx.referenced_user = None;
    let result = scheduler
        .process_turn("What are this user's technical skills?", turn_ctx)
        .await;

    assert_eq!(result["type"], "chat_response");
    assert_eq!(result["clarification"], true);
}

#[tokio::test]
async fn inquiry_with_referenced_user_answers_from_their_profile() {
    let (base_url, _server) = spawn_profile_api().await;
    let llm = Arc::new(ScriptedLlm::new(
        r#"{"intent": "inquiry", "confidence": 0.85, "reasoning": "asks about a specific referenced user", "clarification_needed": false, "uncertainty_reason": ""}"#,
    ));
    let scheduler = build_scheduler_with_profile_api(llm, base_url);

    let mut turn_ctx = ctx("u5");
    turn_ctx.referenced_user = Some("124".to_string());
    let result = scheduler
        .process_turn("这个用户的项目经验如何？", turn_ctx)
        .await;

    assert_eq!(result["type"], "inquiry_response");
    assert_eq!(result["referenced_user"]["user_id"], "124");
    assert!(result["content"].as_str().unwrap().len() > 0);
}
