//! Object storage layout for extractions.
//!
//! Each extraction lands under
//! `customer-graphs/{customer}/extractions/{extraction}/` as four JSON
//! objects; a per-customer manifest lists every extraction.

use crate::error::StorageError;
use crate::records::{ExtractedEdge, ExtractedNode};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

pub const ROOT_PREFIX: &str = "customer-graphs";
const MAX_KEY_COMPONENT: usize = 50;

static UNSAFE_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\-_.]").expect("valid key pattern"));

/// Restrict a key component to `[A-Za-z0-9._-]`, at most 50 characters.
pub fn sanitize_key_component(component: &str) -> String {
    let replaced = UNSAFE_KEY_CHARS.replace_all(component, "_");
    let trimmed: String = replaced.trim_matches('_').chars().take(MAX_KEY_COMPONENT).collect();
    if trimmed.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        trimmed
    }
}

pub fn extraction_prefix(customer_id: &str, extraction_id: &str) -> String {
    format!(
        "{}/{}/extractions/{}",
        ROOT_PREFIX,
        sanitize_key_component(customer_id),
        sanitize_key_component(extraction_id)
    )
}

pub fn customer_manifest_key(customer_id: &str) -> String {
    format!("{}/{}/manifest.json", ROOT_PREFIX, sanitize_key_component(customer_id))
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    /// Object size, or `None` when absent.
    async fn size(&self, key: &str) -> Result<Option<u64>, StorageError>;
    /// Keys under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
    /// Human-readable location of the store root.
    fn location(&self) -> String;
}

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(StorageError::Failed {
                key: key.to_string(),
                message: "invalid object key".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn walk(&self, dir: PathBuf, keys: &mut Vec<String>) -> Result<(), StorageError> {
        let mut stack = vec![dir];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::from_io(&dir.display().to_string(), e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::from_io(&dir.display().to_string(), e))?
            {
                let path = entry.path();
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    stack.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(key, e))?;
        }
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| StorageError::from_io(key, e))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| StorageError::from_io(key, e))
    }

    async fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        self.walk(self.root.clone(), &mut keys).await?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn location(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestFiles {
    pub nodes: String,
    pub edges: String,
    pub metadata: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManifestStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageMetadata {
    pub location: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub extraction_id: String,
    pub customer_id: String,
    pub extraction_timestamp: String,
    pub files: ManifestFiles,
    pub statistics: ManifestStatistics,
    #[serde(default)]
    pub source_metadata: Value,
    pub storage_metadata: StorageMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub extraction_id: String,
    pub timestamp: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerManifest {
    pub customer_id: String,
    pub created_at: String,
    #[serde(default)]
    pub extractions: Vec<ManifestEntry>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Everything written for one extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extraction_id: String,
    pub customer_id: String,
    pub extracted_nodes: Vec<ExtractedNode>,
    pub extracted_edges: Vec<ExtractedEdge>,
    /// Set once stored
    #[serde(default)]
    pub location: Option<String>,
    pub extraction_metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredExtraction {
    pub customer_id: String,
    pub extraction_id: String,
    pub prefix: String,
}

fn to_json<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(value).map_err(|e| StorageError::Failed {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn from_json<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::Validation(format!("{} is not valid JSON: {}", key, e)))
}

/// Records stored either as a bare array or wrapped as `{field: [...]}`.
fn records_from<T: DeserializeOwned>(key: &str, bytes: &[u8], field: &str) -> Result<Vec<T>, StorageError> {
    let value: Value = from_json(key, bytes)?;
    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove(field).unwrap_or(Value::Array(Vec::new())),
        _ => return Err(StorageError::Validation(format!("{} holds no {}", key, field))),
    };
    serde_json::from_value(items)
        .map_err(|e| StorageError::Validation(format!("{} has malformed {}: {}", key, field, e)))
}

fn statistics(result: &ExtractionResult) -> ManifestStatistics {
    let mut stats = ManifestStatistics {
        total_nodes: result.extracted_nodes.len(),
        total_edges: result.extracted_edges.len(),
        ..Default::default()
    };
    for node in &result.extracted_nodes {
        *stats.node_types.entry(node.node_type.clone()).or_insert(0) += 1;
    }
    for edge in &result.extracted_edges {
        *stats.edge_types.entry(edge.relationship_type.clone()).or_insert(0) += 1;
    }
    stats
}

pub struct GraphStorage {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl GraphStorage {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    async fn put_json<T: Serialize + ?Sized + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let body = to_json(key, value)?;
        self.retry
            .retry_if(
                &format!("put {}", key),
                || self.store.put(key, body.clone()),
                StorageError::is_retryable,
            )
            .await
    }

    /// Write the four extraction objects, update the customer manifest and
    /// verify what was written. Returns the storage location.
    pub async fn store(&self, result: &ExtractionResult) -> Result<String, StorageError> {
        let prefix = extraction_prefix(&result.customer_id, &result.extraction_id);
        let files = ManifestFiles {
            nodes: format!("{}/nodes.json", prefix),
            edges: format!("{}/edges.json", prefix),
            metadata: format!("{}/metadata.json", prefix),
        };
        let manifest_key = format!("{}/manifest.json", prefix);
        let timestamp = result
            .extraction_metadata
            .get("extraction_timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        self.put_json(&files.nodes, &result.extracted_nodes).await?;
        self.put_json(&files.edges, &result.extracted_edges).await?;
        self.put_json(&files.metadata, &result.extraction_metadata).await?;

        let manifest = Manifest {
            extraction_id: result.extraction_id.clone(),
            customer_id: result.customer_id.clone(),
            extraction_timestamp: timestamp.clone(),
            files: files.clone(),
            statistics: statistics(result),
            source_metadata: result.extraction_metadata.clone(),
            storage_metadata: StorageMetadata {
                location: self.store.location(),
                prefix: prefix.clone(),
            },
        };
        self.put_json(&manifest_key, &manifest).await?;

        let entry = ManifestEntry {
            extraction_id: result.extraction_id.clone(),
            timestamp,
            prefix: prefix.clone(),
        };
        if let Err(e) = self.update_customer_manifest(&result.customer_id, entry).await {
            warn!(customer_id = %result.customer_id, error = %e, "Failed to update customer manifest");
        }

        self.validate(&files, &manifest_key, result).await?;

        let location = format!("{}/{}", self.store.location(), prefix);
        info!(
            extraction_id = %result.extraction_id,
            nodes = result.extracted_nodes.len(),
            edges = result.extracted_edges.len(),
            location = %location,
            "Stored extraction"
        );
        Ok(location)
    }

    async fn update_customer_manifest(&self, customer_id: &str, entry: ManifestEntry) -> Result<(), StorageError> {
        let key = customer_manifest_key(customer_id);
        let now = chrono::Utc::now().to_rfc3339();

        let mut manifest = match self.store.get(&key).await {
            Ok(bytes) => from_json::<CustomerManifest>(&key, &bytes)?,
            Err(StorageError::NotFound(_)) => CustomerManifest {
                customer_id: customer_id.to_string(),
                created_at: now.clone(),
                extractions: Vec::new(),
                last_updated: None,
            },
            Err(e) => return Err(e),
        };

        manifest.extractions.retain(|e| e.extraction_id != entry.extraction_id);
        manifest.extractions.push(entry);
        manifest.last_updated = Some(now);
        self.put_json(&key, &manifest).await
    }

    async fn validate(&self, files: &ManifestFiles, manifest_key: &str, result: &ExtractionResult) -> Result<(), StorageError> {
        for key in [files.nodes.as_str(), files.edges.as_str(), files.metadata.as_str(), manifest_key] {
            match self.store.size(key).await? {
                Some(size) if size > 0 => {}
                Some(_) => return Err(StorageError::Validation(format!("{} is empty", key))),
                None => return Err(StorageError::Validation(format!("{} was not written", key))),
            }
        }

        let nodes: Vec<Value> = from_json(&files.nodes, &self.store.get(&files.nodes).await?)?;
        if nodes.len() != result.extracted_nodes.len() {
            return Err(StorageError::Validation(format!(
                "node count mismatch: expected {}, stored {}",
                result.extracted_nodes.len(),
                nodes.len()
            )));
        }
        let edges: Vec<Value> = from_json(&files.edges, &self.store.get(&files.edges).await?)?;
        if edges.len() != result.extracted_edges.len() {
            return Err(StorageError::Validation(format!(
                "edge count mismatch: expected {}, stored {}",
                result.extracted_edges.len(),
                edges.len()
            )));
        }
        Ok(())
    }

    /// Stored extractions under `prefix`, found through their manifests.
    pub async fn discover(&self, prefix: &str) -> Result<Vec<StoredExtraction>, StorageError> {
        let keys = self.store.list(prefix).await?;
        let found = keys
            .iter()
            .filter_map(|key| {
                let parts: Vec<&str> = key.split('/').collect();
                match parts.as_slice() {
                    [root, customer, "extractions", extraction, "manifest.json"] if *root == ROOT_PREFIX => {
                        Some(StoredExtraction {
                            customer_id: customer.to_string(),
                            extraction_id: extraction.to_string(),
                            prefix: format!("{}/{}/extractions/{}", ROOT_PREFIX, customer, extraction),
                        })
                    }
                    _ => None,
                }
            })
            .collect();
        Ok(found)
    }

    /// Nodes and edges of a stored extraction.
    pub async fn load(&self, prefix: &str) -> Result<(Vec<ExtractedNode>, Vec<ExtractedEdge>), StorageError> {
        let prefix = prefix.trim_end_matches('/');
        let nodes_key = format!("{}/nodes.json", prefix);
        let edges_key = format!("{}/edges.json", prefix);

        let nodes = records_from(&nodes_key, &self.store.get(&nodes_key).await?, "nodes")?;
        let edges = records_from(&edges_key, &self.store.get(&edges_key).await?, "edges")?;
        Ok((nodes, edges))
    }

    pub async fn customer_manifest(&self, customer_id: &str) -> Result<Option<CustomerManifest>, StorageError> {
        let key = customer_manifest_key(customer_id);
        match self.store.get(&key).await {
            Ok(bytes) => from_json(&key, &bytes).map(Some),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ExtractionResult {
    /// Summary suitable for an API response.
    pub fn summary(&self) -> Value {
        json!({
            "extraction_id": self.extraction_id,
            "customer_id": self.customer_id,
            "nodes_extracted": self.extracted_nodes.len(),
            "edges_extracted": self.extracted_edges.len(),
            "location": self.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::HypergraphParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_result(customer: &str) -> ExtractionResult {
        let graph = json!({
            "hypernodes": [
                { "id": "p", "content": "Jane", "node_type": "person", "confidence": 0.9 },
                { "id": "s", "content": "Budgeting", "node_type": "skill", "confidence": 0.8 }
            ],
            "hyperedges": [
                { "source_node_id": "p", "target_node_id": "s", "edge_type": "specializes_in", "confidence": 0.8 }
            ]
        });
        let (nodes, edges) = HypergraphParser::new(customer, "a.md").parse(&graph).unwrap();
        ExtractionResult {
            extraction_id: "extraction_1700000000_abcdef12".to_string(),
            customer_id: customer.to_string(),
            extracted_nodes: nodes,
            extracted_edges: edges,
            location: None,
            extraction_metadata: json!({ "extraction_timestamp": "2024-01-01T00:00:00Z" }),
        }
    }

    fn storage(dir: &Path) -> GraphStorage {
        GraphStorage::new(Arc::new(LocalObjectStore::new(dir)), RetryPolicy::new(2, 1, 2))
    }

    #[test]
    fn key_components_are_sanitized() {
        assert_eq!(sanitize_key_component("acme corp/../x"), "acme_corp_.._x");
        assert_eq!(sanitize_key_component("__a__"), "a");
        assert_eq!(sanitize_key_component("///"), "unknown");
        assert_eq!(sanitize_key_component(".."), "unknown");
        assert_eq!(sanitize_key_component(&"x".repeat(80)).len(), 50);
    }

    #[tokio::test]
    async fn local_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("../outside.json", b"{}".to_vec()).await.is_err());
        assert!(store.put("/abs.json", b"{}".to_vec()).await.is_err());
        assert_eq!(store.size("missing.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_writes_layout_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let result = sample_result("acme");

        let location = storage.store(&result).await.unwrap();
        let prefix = "customer-graphs/acme/extractions/extraction_1700000000_abcdef12";
        assert!(location.ends_with(prefix));

        for file in ["nodes.json", "edges.json", "metadata.json", "manifest.json"] {
            assert!(dir.path().join(prefix).join(file).exists(), "{}", file);
        }

        let manifest: Manifest =
            serde_json::from_slice(&std::fs::read(dir.path().join(prefix).join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest.statistics.total_nodes, 2);
        assert_eq!(manifest.statistics.edge_types["specializes_in"], 1);
        assert_eq!(manifest.storage_metadata.prefix, prefix);

        // storing again replaces the manifest entry rather than duplicating it
        storage.store(&result).await.unwrap();
        let customer = storage.customer_manifest("acme").await.unwrap().unwrap();
        assert_eq!(customer.extractions.len(), 1);
        assert!(customer.last_updated.is_some());
    }

    #[tokio::test]
    async fn discover_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let result = sample_result("acme");
        storage.store(&result).await.unwrap();

        let found = storage.discover(ROOT_PREFIX).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].customer_id, "acme");
        assert_eq!(found[0].extraction_id, result.extraction_id);

        let (nodes, edges) = storage.load(&found[0].prefix).await.unwrap();
        assert_eq!(nodes, result.extracted_nodes);
        assert_eq!(edges.len(), 1);
    }

    #[tokio::test]
    async fn load_accepts_wrapped_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let result = sample_result("acme");
        store
            .put("x/nodes.json", serde_json::to_vec(&json!({ "nodes": result.extracted_nodes })).unwrap())
            .await
            .unwrap();
        store
            .put("x/edges.json", serde_json::to_vec(&json!({ "edges": result.extracted_edges })).unwrap())
            .await
            .unwrap();

        let storage = GraphStorage::new(Arc::new(store), RetryPolicy::default());
        let (nodes, edges) = storage.load("x/").await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
    }

    /// Fails the first write of every key with a transient error.
    struct Flaky {
        inner: LocalObjectStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for Flaky {
        async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
            if self.failures.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return Err(StorageError::Transient { key: key.to_string(), message: "throttled".into() });
            }
            self.inner.put(key, body).await
        }
        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.get(key).await
        }
        async fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
            self.inner.size(key).await
        }
        async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(prefix).await
        }
        fn location(&self) -> String {
            self.inner.location()
        }
    }

    #[tokio::test]
    async fn transient_write_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let flaky = Flaky { inner: LocalObjectStore::new(dir.path()), failures: AtomicUsize::new(0) };
        let storage = GraphStorage::new(Arc::new(flaky), RetryPolicy::new(2, 1, 2));

        storage.store(&sample_result("acme")).await.unwrap();
        assert!(storage.customer_manifest("acme").await.unwrap().is_some());
    }

    /// Pretends every write succeeds without persisting anything.
    struct BlackHole;

    #[async_trait]
    impl ObjectStore for BlackHole {
        async fn put(&self, _key: &str, _body: Vec<u8>) -> Result<(), StorageError> {
            Ok(())
        }
        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound(key.to_string()))
        }
        async fn size(&self, _key: &str) -> Result<Option<u64>, StorageError> {
            Ok(None)
        }
        async fn list(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
        fn location(&self) -> String {
            "memory://void".to_string()
        }
    }

    #[tokio::test]
    async fn validation_catches_missing_files() {
        let storage = GraphStorage::new(Arc::new(BlackHole), RetryPolicy::new(0, 1, 1));
        let err = storage.store(&sample_result("acme")).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }
}
