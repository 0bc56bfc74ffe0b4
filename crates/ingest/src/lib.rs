pub mod analyzer;
pub mod frontmatter;
pub mod reader;
pub mod transcript;

pub use analyzer::{
    complexity_score, required_agents, Agent, ContentAnalysis, FileAnalysis, FileAnalyzer,
    ProcessingRequirements, TextStats,
};
pub use frontmatter::{parse_front_matter, strip_front_matter, DocumentMetadata};
pub use reader::{FileReader, UnsupportedFormat};
pub use transcript::{
    estimate_duration_minutes, parse_interview_structure, speaker_dynamics, InterviewStructure,
    Segment, SpeakerDynamics,
};

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Read and analyze a single file.
pub async fn analyze_file(file_path: &Path) -> Result<FileAnalysis> {
    FileAnalyzer::analyze(file_path).await
}

/// Analyze every supported file under a directory.
pub async fn analyze_directory(dir_path: &Path) -> Result<Vec<(FileAnalysis, String)>> {
    let files = FileReader::read_directory(dir_path).await?;

    let analyses = files
        .into_iter()
        .map(|(path, content)| (FileAnalyzer::analyze_content(&path, &content), content))
        .collect::<Vec<_>>();

    tracing::info!(files = analyses.len(), dir = ?dir_path, "Analyzed directory");
    Ok(analyses)
}
