mod cache;
mod config;
mod metrics;
mod pipeline;
mod routes;

use anyhow::{Context, Result};
use cache::{CachedLlm, ResponseCache};
use config::AppConfig;
use extract::{DisabledLlm, LlmClient, OllamaClient};
use index::{GraphExtractor, GraphStorage, LocalObjectStore, Neo4jIndexer};
use routes::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

async fn connect_neo4j(config: &AppConfig) -> Option<Arc<Neo4jIndexer>> {
    if !config.neo4j.enabled {
        return None;
    }
    let connected = async {
        let indexer = Neo4jIndexer::connect(&config.neo4j.uri, &config.neo4j.user, &config.neo4j.password).await?;
        indexer.init_schema().await?;
        anyhow::Ok(indexer)
    }
    .await;

    match connected {
        Ok(indexer) => Some(Arc::new(indexer)),
        Err(e) => {
            tracing::warn!(uri = %config.neo4j.uri, error = %e, "Neo4j unavailable, continuing without graph upload");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(mode = ?config.mode, llm = config.llm.enabled, neo4j = config.neo4j.enabled, "Configuration loaded");

    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(ResponseCache::new(config.cache.max_entries)));

    let llm: Arc<dyn LlmClient> = if config.llm.enabled {
        let ollama = OllamaClient::new(config.llm.base_url.clone(), config.llm.model.clone());
        Arc::new(CachedLlm::new(
            Arc::new(ollama),
            cache.clone(),
            config.concurrency.max_concurrent_llm_calls,
            config.retry_policy(),
        ))
    } else {
        Arc::new(DisabledLlm)
    };

    let store = Arc::new(LocalObjectStore::new(config.storage.root.clone()));
    let extractor = Arc::new(GraphExtractor::new(GraphStorage::new(store, config.retry_policy())));
    let neo4j = connect_neo4j(&config).await;

    let state = Arc::new(AppState::new(
        llm,
        config.llm.enabled.then(|| config.llm.base_url.clone()),
        extractor,
        neo4j,
        cache,
        config.concurrency.max_concurrent_extractions,
    ));

    let app = routes::router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.concurrency.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    tracing::info!(addr = %config.listen_addr, "Server listening");

    axum::serve(listener, app).await.context("Server error")
}
