//! End-to-end run over one transcript: analysis, interview processing,
//! needs analysis, graph building, storage and optional Neo4j upload.

use crate::metrics::{Metrics, Stage, TimedOperation};
use anyhow::{Context, Result};
use extract::InterviewProcessor;
use hypergraph::{BuildInput, GraphInsights, GraphMetrics, HypergraphBuilder};
use index::neo4j_index::UploadReport;
use index::{GraphExtractor, Neo4jIndexer};
use ingest::{Agent, FileAnalysis, FileAnalyzer, FileReader};
use needs::{ContentType, NeedsAnalysis, NeedsAnalyzer, NeedsInput};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    pub file_path: String,
    /// Falls back to the transcript header, then the customer name
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Mirror the stored records into Neo4j
    #[serde(default)]
    pub upload: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewSummary {
    pub entities: usize,
    pub insights: usize,
    pub confidence: f64,
    pub entity_quality_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub execution_id: String,
    pub file_analysis: FileAnalysis,
    pub interview: InterviewSummary,
    pub needs: Option<NeedsAnalysis>,
    pub graph_metrics: GraphMetrics,
    pub graph_insights: GraphInsights,
    pub extraction: Value,
    pub upload: Option<UploadReport>,
    pub stage_times_ms: BTreeMap<&'static str, f64>,
}

pub struct Pipeline {
    processor: InterviewProcessor,
    needs: NeedsAnalyzer,
    builder: HypergraphBuilder,
    extractor: Arc<GraphExtractor>,
    neo4j: Option<Arc<Neo4jIndexer>>,
    metrics: Arc<Metrics>,
}

fn first_non_empty(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

impl Pipeline {
    pub fn new(
        processor: InterviewProcessor,
        needs: NeedsAnalyzer,
        builder: HypergraphBuilder,
        extractor: Arc<GraphExtractor>,
        neo4j: Option<Arc<Neo4jIndexer>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { processor, needs, builder, extractor, neo4j, metrics }
    }

    fn timed(&self, stage: Stage, timer: TimedOperation, times: &mut BTreeMap<&'static str, f64>) {
        let elapsed = timer.elapsed();
        self.metrics.record_stage(stage, elapsed);
        times.insert(stage.as_str(), elapsed.as_secs_f64() * 1000.0);
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineReport> {
        let execution_id = request
            .execution_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut times = BTreeMap::new();
        tracing::info!(execution_id = %execution_id, file = %request.file_path, "Pipeline started");

        let timer = TimedOperation::start();
        let content = FileReader::read_file(Path::new(&request.file_path))
            .await
            .context("Failed to read input file")?;
        let analysis = FileAnalyzer::analyze_content(&request.file_path, &content);
        self.timed(Stage::Analyze, timer, &mut times);

        let timer = TimedOperation::start();
        let interview = self
            .processor
            .process(&request.file_path, &content)
            .await
            .context("Interview processing failed")?;
        self.timed(Stage::Interview, timer, &mut times);

        let needs = if analysis.requires(Agent::NeedsAnalysis) {
            let timer = TimedOperation::start();
            let input = NeedsInput::from_interview(&interview, ContentType::parse(&analysis.content_type));
            let result = self.needs.analyze(&input).await;
            self.timed(Stage::Needs, timer, &mut times);
            Some(result)
        } else {
            None
        };

        let customer_name = first_non_empty([
            request.customer_name.clone(),
            analysis.metadata.get_str("customer_name").map(str::to_string),
        ]);
        let customer_id = first_non_empty([
            request.customer_id.clone(),
            analysis.metadata.get_str("customer_id").map(str::to_string),
            customer_name.clone(),
        ]);

        let timer = TimedOperation::start();
        let input = BuildInput::from_interview(&interview, customer_name, needs.clone());
        let graph = self.builder.build(&input).await;
        self.metrics.record_graph(graph.total_nodes, graph.total_edges);
        self.timed(Stage::Hypergraph, timer, &mut times);

        let timer = TimedOperation::start();
        let mut event = json!({
            "execution_id": execution_id,
            "source_file": request.file_path,
            "result": graph,
        });
        if let Some(customer_id) = &customer_id {
            event["customer_id"] = json!(customer_id);
        }
        let extraction = self.extractor.extract(&event).await?;
        self.timed(Stage::Extract, timer, &mut times);

        let upload = match (&self.neo4j, request.upload) {
            (Some(neo4j), true) => {
                let timer = TimedOperation::start();
                let report = neo4j
                    .upload(&extraction.extracted_nodes, &extraction.extracted_edges)
                    .await
                    .context("Neo4j upload failed")?;
                self.timed(Stage::Upload, timer, &mut times);
                Some(report)
            }
            (None, true) => {
                tracing::warn!(execution_id = %execution_id, "Upload requested but Neo4j is not configured");
                None
            }
            _ => None,
        };

        tracing::info!(
            execution_id = %execution_id,
            nodes = graph.total_nodes,
            edges = graph.total_edges,
            extraction_id = %extraction.extraction_id,
            "Pipeline complete"
        );

        Ok(PipelineReport {
            execution_id,
            file_analysis: analysis,
            interview: InterviewSummary {
                entities: interview.entities.len(),
                insights: interview.key_insights.total(),
                confidence: interview.confidence,
                entity_quality_score: interview.entity_quality_score,
            },
            needs,
            graph_metrics: graph.graph_metrics,
            graph_insights: graph.graph_insights,
            extraction: extraction.summary(),
            upload,
            stage_times_ms: times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::DisabledLlm;
    use index::{GraphStorage, LocalObjectStore, RetryPolicy};

    const TRANSCRIPT: &str = "---\n{\"content_type\": \"interview_transcript\", \"customer_name\": \"Jane Doe\"}\n---\n\
        Interviewer: Tell me about your work at Acme Corp.\n\
        Jane Doe: I lead financial planning and I love learning new budgeting tools. \
        My family and community matter a lot to me, and I want to grow every year.";

    fn offline_pipeline(root: &Path, metrics: Arc<Metrics>) -> Pipeline {
        let storage = GraphStorage::new(Arc::new(LocalObjectStore::new(root)), RetryPolicy::new(0, 1, 1));
        Pipeline::new(
            InterviewProcessor::new(Arc::new(DisabledLlm)),
            NeedsAnalyzer::new(Arc::new(DisabledLlm)),
            HypergraphBuilder::offline(),
            Arc::new(GraphExtractor::new(storage)),
            None,
            metrics,
        )
    }

    #[tokio::test]
    async fn offline_run_stores_an_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("jane_interview.txt");
        tokio::fs::write(&file, TRANSCRIPT).await.unwrap();
        let store_root = dir.path().join("store");

        let metrics = Metrics::new();
        let pipeline = offline_pipeline(&store_root, metrics.clone());
        let request = PipelineRequest {
            file_path: file.to_string_lossy().to_string(),
            customer_id: None,
            customer_name: None,
            execution_id: Some("12345678-aaaa".to_string()),
            upload: true,
        };

        let report = pipeline.run(&request).await.unwrap();

        assert!(report.needs.is_some());
        assert!(report.graph_metrics.total_nodes > 0);
        assert_eq!(report.extraction["customer_id"], "Jane Doe");
        assert!(report.extraction["extraction_id"].as_str().unwrap().ends_with("_12345678"));
        assert!(report.upload.is_none());
        assert!(report.stage_times_ms.contains_key("hypergraph"));
        assert!(store_root.join("customer-graphs/Jane_Doe/manifest.json").exists());
        assert_eq!(metrics.snapshot().files_processed, 1);
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = offline_pipeline(dir.path(), Metrics::new());
        let request = PipelineRequest {
            file_path: dir.path().join("nope.txt").to_string_lossy().to_string(),
            customer_id: Some("acme".into()),
            customer_name: None,
            execution_id: None,
            upload: false,
        };
        assert!(pipeline.run(&request).await.is_err());
    }
}
