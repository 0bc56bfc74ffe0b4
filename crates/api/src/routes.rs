use crate::cache::ResponseCache;
use crate::metrics::{Metrics, Stage, TimedOperation};
use crate::pipeline::{Pipeline, PipelineRequest};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use extract::{InterviewProcessor, LlmClient};
use hypergraph::{BuildInput, HypergraphBuilder};
use index::{ErrorCategory, ExtractionError, GraphExtractor, Neo4jIndexer, sanitize_message};
use needs::{ContentType, NeedsAnalyzer, NeedsInput};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

const DEFAULT_QUERY_LIMIT: usize = 100;

pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    pub llm_url: Option<String>,
    pub extractor: Arc<GraphExtractor>,
    pub neo4j: Option<Arc<Neo4jIndexer>>,
    pub pipeline: Pipeline,
    pub pipeline_slots: Semaphore,
    pub metrics: Arc<Metrics>,
    pub cache: Option<Arc<ResponseCache>>,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        llm_url: Option<String>,
        extractor: Arc<GraphExtractor>,
        neo4j: Option<Arc<Neo4jIndexer>>,
        cache: Option<Arc<ResponseCache>>,
        max_concurrent_pipelines: usize,
    ) -> Self {
        let metrics = Metrics::new();
        let pipeline = Pipeline::new(
            InterviewProcessor::new(llm.clone()),
            NeedsAnalyzer::new(llm.clone()),
            HypergraphBuilder::new(llm.clone()),
            extractor.clone(),
            neo4j.clone(),
            metrics.clone(),
        );
        Self {
            llm,
            llm_url,
            extractor,
            neo4j,
            pipeline,
            pipeline_slots: Semaphore::new(max_concurrent_pipelines.max(1)),
            metrics,
            cache,
        }
    }

    fn neo4j(&self) -> Result<&Neo4jIndexer, ApiError> {
        self.neo4j.as_deref().ok_or_else(|| {
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Neo4j is not configured")
        })
    }
}

/// JSON error body; every error carries a correlation id to find it in the logs.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    category: Option<ErrorCategory>,
    correlation_id: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            category: None,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn from_extraction(error: &ExtractionError) -> Self {
        let category = ErrorCategory::of(error);
        let status = if category.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            category: Some(category),
            ..Self::new(status, error.to_string())
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(error: ExtractionError) -> Self {
        Self::from_extraction(&error)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        if let Some(extraction) = error.downcast_ref::<ExtractionError>() {
            return Self::from_extraction(extraction);
        }
        if error.chain().any(|cause| cause.is::<ingest::UnsupportedFormat>()) {
            return Self {
                category: Some(ErrorCategory::Validation),
                ..Self::bad_request(format!("{:#}", error))
            };
        }
        let not_found = error.chain().any(|cause| {
            cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
        });
        let status = if not_found { StatusCode::NOT_FOUND } else { StatusCode::INTERNAL_SERVER_ERROR };
        Self::new(status, format!("{:#}", error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = sanitize_message(&self.message);
        if self.status.is_server_error() {
            tracing::error!(correlation_id = %self.correlation_id, status = %self.status, error = %message, "Request failed");
        } else {
            tracing::warn!(correlation_id = %self.correlation_id, status = %self.status, error = %message, "Request rejected");
        }
        let body = json!({
            "error": message,
            "category": self.category.map(|c| c.as_str()),
            "correlation_id": self.correlation_id,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Count the request and its outcome.
fn track<T>(state: &AppState, result: ApiResult<T>) -> ApiResult<T> {
    state.metrics.record_request(result.is_ok());
    result
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_file))
        .route("/process", post(process_interview))
        .route("/needs", post(analyze_needs))
        .route("/hypergraph", post(build_hypergraph))
        .route("/extract", post(extract_graph))
        .route("/upload", post(upload_graph))
        .route("/query", post(query_graph))
        .route("/pipeline", post(run_pipeline))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    llm: String,
    neo4j: String,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm = match &state.llm_url {
        None => "disabled".to_string(),
        Some(url) => match reqwest::get(format!("{}/api/tags", url)).await {
            Ok(resp) if resp.status().is_success() => "ok".to_string(),
            Ok(resp) => format!("error: status {}", resp.status()),
            Err(e) => format!("error: {}", e),
        },
    };

    let neo4j = match &state.neo4j {
        None => "disabled".to_string(),
        Some(neo4j) => match neo4j.ping().await {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {}", e),
        },
    };

    Json(HealthResponse { status: "ok", llm, neo4j })
}

#[derive(Deserialize)]
struct FileRequest {
    file_path: String,
}

async fn read_input(file_path: &str) -> Result<String, ApiError> {
    ingest::FileReader::read_file(Path::new(file_path))
        .await
        .map_err(ApiError::from)
}

async fn analyze_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FileRequest>,
) -> ApiResult<ingest::FileAnalysis> {
    let timer = TimedOperation::start();
    let result = async {
        let content = read_input(&req.file_path).await?;
        Ok::<_, ApiError>(Json(ingest::FileAnalyzer::analyze_content(&req.file_path, &content)))
    }
    .await;
    state.metrics.record_stage(Stage::Analyze, timer.elapsed());
    track(&state, result)
}

#[derive(Deserialize)]
struct ProcessRequest {
    #[serde(default)]
    file_path: Option<String>,
    /// Inline transcript; `file_path` is then only a label
    #[serde(default)]
    text: Option<String>,
}

async fn process_interview(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<extract::InterviewResult> {
    let timer = TimedOperation::start();
    let result = async {
        let label = req.file_path.clone().unwrap_or_else(|| "inline".to_string());
        let text = match (&req.text, &req.file_path) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => read_input(path).await?,
            (None, None) => return Err(ApiError::bad_request("file_path or text is required")),
        };
        let processor = InterviewProcessor::new(state.llm.clone());
        Ok::<_, ApiError>(Json(processor.process(&label, &text).await?))
    }
    .await;
    state.metrics.record_stage(Stage::Interview, timer.elapsed());
    track(&state, result)
}

#[derive(Deserialize)]
struct NeedsRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

async fn analyze_needs(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NeedsRequest>,
) -> ApiResult<needs::NeedsAnalysis> {
    let timer = TimedOperation::start();
    let result = async {
        let text = match (&req.text, &req.file_path) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => read_input(path).await?,
            (None, None) => return Err(ApiError::bad_request("file_path or text is required")),
        };
        let content_type = req
            .content_type
            .as_deref()
            .map(ContentType::parse)
            .unwrap_or_default();
        let analyzer = NeedsAnalyzer::new(state.llm.clone());
        let input = NeedsInput::from_text(ingest::strip_front_matter(&text), content_type);
        Ok::<_, ApiError>(Json(analyzer.analyze(&input).await))
    }
    .await;
    state.metrics.record_stage(Stage::Needs, timer.elapsed());
    track(&state, result)
}

async fn build_hypergraph(
    State(state): State<Arc<AppState>>,
    Json(input): Json<BuildInput>,
) -> ApiResult<hypergraph::Hypergraph> {
    let timer = TimedOperation::start();
    let graph = HypergraphBuilder::new(state.llm.clone()).build(&input).await;
    state.metrics.record_stage(Stage::Hypergraph, timer.elapsed());
    state.metrics.record_graph(graph.total_nodes, graph.total_edges);
    track(&state, Ok(Json(graph)))
}

async fn extract_graph(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Value>,
) -> ApiResult<Value> {
    let timer = TimedOperation::start();
    let result = state
        .extractor
        .extract(&event)
        .await
        .map(|r| Json(r.summary()))
        .map_err(ApiError::from);
    state.metrics.record_stage(Stage::Extract, timer.elapsed());
    track(&state, result)
}

#[derive(Deserialize)]
struct UploadRequest {
    #[serde(default)]
    prefix: Option<String>,
    /// Upload the customer's latest extraction when no prefix is given
    #[serde(default)]
    customer_id: Option<String>,
}

async fn upload_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<Value> {
    let timer = TimedOperation::start();
    let result = async {
        let neo4j = state.neo4j()?;
        let storage = state.extractor.storage();

        let prefix = match (&req.prefix, &req.customer_id) {
            (Some(prefix), _) => prefix.clone(),
            (None, Some(customer)) => storage
                .customer_manifest(customer)
                .await
                .map_err(ExtractionError::from)?
                .and_then(|m| m.extractions.last().map(|e| e.prefix.clone()))
                .ok_or_else(|| {
                    ApiError::new(StatusCode::NOT_FOUND, format!("No extractions for customer {}", customer))
                })?,
            (None, None) => return Err(ApiError::bad_request("prefix or customer_id is required")),
        };

        let (nodes, edges) = storage.load(&prefix).await.map_err(ExtractionError::from)?;
        let report = neo4j.upload(&nodes, &edges).await?;
        Ok::<_, ApiError>(Json(json!({ "prefix": prefix, "nodes_uploaded": report.nodes, "edges_uploaded": report.edges })))
    }
    .await;
    state.metrics.record_stage(Stage::Upload, timer.elapsed());
    track(&state, result)
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum QueryType {
    Nodes,
    Edges,
    Summary,
}

#[derive(Deserialize)]
struct QueryRequest {
    customer_id: String,
    query_type: QueryType,
    #[serde(default)]
    limit: Option<usize>,
}

async fn query_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> ApiResult<Value> {
    let timer = TimedOperation::start();
    let result = async {
        if req.customer_id.trim().is_empty() {
            return Err(ApiError::bad_request("customer_id is required"));
        }
        let neo4j = state.neo4j()?;
        let limit = req.limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        let body = match req.query_type {
            QueryType::Nodes => {
                let rows = neo4j.query_nodes(&req.customer_id, limit).await?;
                json!({ "type": "nodes", "count": rows.len(), "data": rows })
            }
            QueryType::Edges => {
                let rows = neo4j.query_edges(&req.customer_id, limit).await?;
                json!({ "type": "edges", "count": rows.len(), "data": rows })
            }
            QueryType::Summary => {
                let summary = neo4j.summary(&req.customer_id).await?;
                json!({ "type": "summary", "data": summary })
            }
        };
        Ok::<_, ApiError>(Json(body))
    }
    .await;
    state.metrics.record_stage(Stage::Query, timer.elapsed());
    track(&state, result)
}

async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PipelineRequest>,
) -> ApiResult<crate::pipeline::PipelineReport> {
    let result = async {
        let _slot = state
            .pipeline_slots
            .acquire()
            .await
            .map_err(|e| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
        Ok::<_, ApiError>(Json(state.pipeline.run(&req).await?))
    }
    .await;
    track(&state, result)
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "metrics": state.metrics.snapshot(),
        "cache": state.cache.as_ref().map(|c| c.stats()),
    }))
}
