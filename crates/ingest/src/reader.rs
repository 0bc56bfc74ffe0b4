use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// The file's extension is not one the pipeline can read.
#[derive(Debug, thiserror::Error)]
#[error("Unsupported file format: {0}")]
pub struct UnsupportedFormat(pub String);

pub struct FileReader;

impl FileReader {
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub async fn read_file(path: &Path) -> Result<String> {
        if !Self::is_supported(path) {
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            return Err(UnsupportedFormat(extension.to_string()).into());
        }

        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", path))
    }

    /// Recursively collect every transcript under `dir`, sorted by path.
    pub async fn read_directory(dir: &Path) -> Result<Vec<(String, String)>> {
        let paths: Vec<PathBuf> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| Self::is_supported(path))
            .collect();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let content = Self::read_file(&path).await?;
            files.push((path.to_string_lossy().to_string(), content));
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, "binary").unwrap();

        let err = FileReader::read_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported file format"));
        assert_eq!(err.downcast_ref::<UnsupportedFormat>().map(|e| e.0.as_str()), Some("pdf"));
    }

    #[tokio::test]
    async fn reads_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("customer_a")).unwrap();
        std::fs::write(dir.path().join("customer_a/interview.txt"), "Host: hi").unwrap();
        std::fs::write(dir.path().join("advice.md"), "# Advice").unwrap();
        std::fs::write(dir.path().join("skip.json"), "{}").unwrap();

        let files = FileReader::read_directory(dir.path()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|(p, c)| p.ends_with("interview.txt") && c == "Host: hi"));
    }
}
