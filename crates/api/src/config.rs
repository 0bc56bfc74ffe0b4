use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub listen_addr: String,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub neo4j: Neo4jConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Cache aggressively, short timeouts
    Accurate,  // Always fresh completions
    Balanced,
}

impl FromStr for OperationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(OperationMode::Fast),
            "accurate" => Ok(OperationMode::Accurate),
            "balanced" => Ok(OperationMode::Balanced),
            other => anyhow::bail!("Unknown operation mode: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// When off, every stage takes its rule-based path
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub enabled: bool,
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
    pub max_concurrent_extractions: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("data/graphs") }
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            listen_addr: "0.0.0.0:3000".to_string(),
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            neo4j: Neo4jConfig::default(),
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 3,
                max_concurrent_extractions: 5,
                request_timeout_secs: 300,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid value for {}: {:?}", name, raw))
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        Self {
            mode: OperationMode::Fast,
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 10,
                max_concurrent_extractions: 20,
                request_timeout_secs: 120,
            },
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 50000,
            },
            ..Self::default()
        }
    }

    pub fn accurate_mode() -> Self {
        Self {
            mode: OperationMode::Accurate,
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 2,
                max_concurrent_extractions: 3,
                request_timeout_secs: 600,
            },
            retry: RetryConfig {
                max_retries: 4,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            cache: CacheConfig {
                enabled: false,
                max_entries: 0,
            },
            ..Self::default()
        }
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    /// `.env` then process environment, over the preset picked by `HG_MODE`.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = match lookup("HG_MODE") {
            Some(raw) => parse_var("HG_MODE", &raw)?,
            None => OperationMode::Balanced,
        };
        let mut config = Self::for_mode(mode);
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("HG_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = var("HG_LLM_ENABLED") {
            self.llm.enabled = parse_var("HG_LLM_ENABLED", &v)?;
        }
        if let Some(v) = var("HG_LLM_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = var("HG_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = var("HG_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Some(v) = var("HG_NEO4J_URI") {
            self.neo4j.uri = v;
            self.neo4j.enabled = true;
        }
        if let Some(v) = var("HG_NEO4J_USER") {
            self.neo4j.user = v;
        }
        if let Some(v) = var("HG_NEO4J_PASSWORD") {
            self.neo4j.password = v;
        }
        if let Some(v) = var("HG_NEO4J_ENABLED") {
            self.neo4j.enabled = parse_var("HG_NEO4J_ENABLED", &v)?;
        }
        if let Some(v) = var("HG_MAX_RETRIES") {
            self.retry.max_retries = parse_var("HG_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("HG_MAX_CONCURRENT_LLM_CALLS") {
            self.concurrency.max_concurrent_llm_calls = parse_var("HG_MAX_CONCURRENT_LLM_CALLS", &v)?;
        }
        if let Some(v) = var("HG_REQUEST_TIMEOUT_SECS") {
            self.concurrency.request_timeout_secs = parse_var("HG_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("HG_CACHE_ENABLED") {
            self.cache.enabled = parse_var("HG_CACHE_ENABLED", &v)?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> index::RetryPolicy {
        index::RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn mode_selects_preset() {
        let config = AppConfig::from_lookup(lookup(&[("HG_MODE", "accurate")])).unwrap();
        assert_eq!(config.mode, OperationMode::Accurate);
        assert!(!config.cache.enabled);
        assert_eq!(config.retry.max_retries, 4);
    }

    #[test]
    fn env_overrides_apply_on_top() {
        let config = AppConfig::from_lookup(lookup(&[
            ("HG_LLM_ENABLED", "false"),
            ("HG_STORAGE_ROOT", "/tmp/graphs"),
            ("HG_NEO4J_URI", "bolt://db:7687"),
            ("HG_MAX_RETRIES", "7"),
        ]))
        .unwrap();

        assert!(!config.llm.enabled);
        assert_eq!(config.storage.root, PathBuf::from("/tmp/graphs"));
        assert!(config.neo4j.enabled);
        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.mode, OperationMode::Balanced);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[("HG_MAX_RETRIES", "lots")])).unwrap_err();
        assert!(format!("{:#}", err).contains("HG_MAX_RETRIES"));
        assert!(AppConfig::from_lookup(lookup(&[("HG_MODE", "turbo")])).is_err());
    }

    #[test]
    fn password_is_not_serialized() {
        let mut config = AppConfig::default();
        config.neo4j.password = "s3cret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cret"));
    }
}
