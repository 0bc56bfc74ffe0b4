use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use extract::{GenerationOptions, LlmClient};
use index::RetryPolicy;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Completions keyed by a hash of prompt and sampling options.
pub struct ResponseCache {
    responses: DashMap<String, String>,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: DashMap::new(),
            max_entries,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn key(prompt: &str, options: &GenerationOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update(format!("|{}|{}|{}", options.max_tokens, options.temperature, options.json).as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.responses.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, response: String) {
        if self.max_entries == 0 {
            return;
        }
        if self.responses.len() >= self.max_entries {
            // Simple eviction: drop a quarter when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(key, response);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            llm_responses_cached: self.responses.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub llm_responses_cached: usize,
    pub hits: usize,
    pub misses: usize,
}

/// LLM client with response caching, bounded concurrency and retries.
pub struct CachedLlm {
    inner: Arc<dyn LlmClient>,
    cache: Option<Arc<ResponseCache>>,
    permits: Semaphore,
    retry: RetryPolicy,
}

impl CachedLlm {
    pub fn new(
        inner: Arc<dyn LlmClient>,
        cache: Option<Arc<ResponseCache>>,
        max_concurrent: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            cache,
            permits: Semaphore::new(max_concurrent.max(1)),
            retry,
        }
    }
}

#[async_trait]
impl LlmClient for CachedLlm {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let key = ResponseCache::key(prompt, options);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            return Ok(hit);
        }

        let _permit = self.permits.acquire().await?;
        let response = self
            .retry
            .retry("llm_generate", || self.inner.generate(prompt, options))
            .await?;

        if let Some(cache) = &self.cache {
            cache.insert(key, response.clone());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Counting {
        calls: AtomicUsize,
        failures_left: Mutex<usize>,
    }

    #[async_trait]
    impl LlmClient for Counting {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                anyhow::bail!("temporarily unavailable");
            }
            Ok(format!("echo: {}", prompt))
        }
    }

    fn counting(failures: usize) -> Arc<Counting> {
        Arc::new(Counting { calls: AtomicUsize::new(0), failures_left: Mutex::new(failures) })
    }

    #[tokio::test]
    async fn repeated_prompts_are_served_from_cache() {
        let inner = counting(0);
        let cache = Arc::new(ResponseCache::new(100));
        let llm = CachedLlm::new(inner.clone(), Some(cache.clone()), 2, RetryPolicy::new(0, 1, 1));
        let options = GenerationOptions::default();

        assert_eq!(llm.generate("hi", &options).await.unwrap(), "echo: hi");
        assert_eq!(llm.generate("hi", &options).await.unwrap(), "echo: hi");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        // different options are a different entry
        llm.generate("hi", &options.clone().with_max_tokens(10)).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn failures_are_retried_and_not_cached() {
        let inner = counting(1);
        let cache = Arc::new(ResponseCache::new(100));
        let llm = CachedLlm::new(inner.clone(), Some(cache.clone()), 1, RetryPolicy::new(1, 1, 1));

        assert!(llm.generate("x", &GenerationOptions::default()).await.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        let failing = counting(5);
        let llm = CachedLlm::new(failing, Some(cache.clone()), 1, RetryPolicy::new(1, 1, 1));
        assert!(llm.generate("y", &GenerationOptions::default()).await.is_err());
        assert_eq!(cache.stats().llm_responses_cached, 1);
    }

    #[test]
    fn full_cache_evicts() {
        let cache = ResponseCache::new(4);
        for i in 0..10 {
            cache.insert(format!("k{}", i), "v".to_string());
        }
        assert!(cache.stats().llm_responses_cached <= 4);

        let disabled = ResponseCache::new(0);
        disabled.insert("k".into(), "v".into());
        assert_eq!(disabled.stats().llm_responses_cached, 0);
    }
}
