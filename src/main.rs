// src/main.rs
// Search orchestrator entry point: wires the Embedding Engine, Vector Store
// Client, LLM Client, Intent Classifier, Query Preprocessor, Hybrid
// Retriever, Candidate Evaluator, Profile API Client and casual-request
// store into a Routing Scheduler, then serves it over HTTP.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use search_orchestrator::api::{self, AppState};
use search_orchestrator::casual::InMemoryCasualRequestStore;
use search_orchestrator::config::OrchestratorConfig;
use search_orchestrator::embedding::HttpEmbeddingEngine;
use search_orchestrator::evaluator::CandidateEvaluator;
use search_orchestrator::intent::IntentClassifier;
use search_orchestrator::llm::GlmProvider;
use search_orchestrator::metrics;
use search_orchestrator::model::Statistics;
use search_orchestrator::preprocessor::QueryPreprocessor;
use search_orchestrator::profile::ProfileApiClient;
use search_orchestrator::retriever::HybridRetriever;
use search_orchestrator::scheduler::RoutingScheduler;
use search_orchestrator::vectorstore::QdrantVectorStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = OrchestratorConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.logging.level.clone()))
        .with_ansi(!config.logging.json)
        .init();

    config.validate()?;
    metrics::init_metrics();

    info!("starting search orchestrator");

    let stats = Arc::new(Statistics::new());
    let llm: Arc<dyn search_orchestrator::llm::LlmProvider> =
        Arc::new(GlmProvider::new(config.llm.clone(), stats.clone())?);
    let embeddings: Arc<dyn search_orchestrator::embedding::EmbeddingEngine> =
        Arc::new(HttpEmbeddingEngine::new(config.embedding.clone())?);
    let vector_store: Arc<dyn search_orchestrator::vectorstore::VectorStoreClient> =
        Arc::new(QdrantVectorStore::new(config.vector_store.clone()));
    let profile_client = Arc::new(ProfileApiClient::new(config.profile_api.clone())?);
    let casual_store: Arc<dyn search_orchestrator::casual::CasualRequestStore> =
        Arc::new(InMemoryCasualRequestStore::new());

    let intent_classifier = IntentClassifier::new(llm.clone());
    let preprocessor = QueryPreprocessor::new(llm.clone());
    let retriever = HybridRetriever::new(
        embeddings,
        vector_store,
        profile_client.clone(),
        config.retriever.clone(),
    );
    let evaluator = CandidateEvaluator::new(llm.clone());

    let scheduler = Arc::new(RoutingScheduler::new(
        &config,
        intent_classifier,
        preprocessor,
        retriever,
        evaluator,
        profile_client,
        casual_store,
        llm,
        stats,
    ));

    let state = Arc::new(AppState { scheduler });
    let app = api::router(state);

    let bind_address = config.bind_address();
    info!(%bind_address, "listening");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
