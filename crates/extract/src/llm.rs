use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::prompt::build_retry_prompt;

/// Sampling parameters passed along with each completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the backend for JSON-only output
    pub json: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.2,
            json: true,
        }
    }
}

impl GenerationOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Generate and return the first valid JSON value in the completion,
    /// asking the model to repair its output between attempts.
    async fn generate_json_with_retry(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        max_retries: usize,
    ) -> Result<String> {
        for attempt in 0..max_retries {
            let response = self.generate(prompt, options).await?;

            if let Some(json) = extract_json_block(&response) {
                return Ok(json);
            }

            if attempt + 1 < max_retries {
                tracing::debug!(attempt, "Completion was not valid JSON, asking for a fix");
                let corrected = self.generate(&build_retry_prompt(&response), options).await?;
                if let Some(json) = extract_json_block(&corrected) {
                    return Ok(json);
                }
            }
        }

        anyhow::bail!("Failed to get valid JSON after {} retries", max_retries)
    }
}

/// Pull the first complete JSON object or array out of a completion.
/// Models often wrap JSON in prose or code fences.
pub fn extract_json_block(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    for (start, _) in trimmed.match_indices(['{', '[']) {
        let mut stream =
            serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_object() || value.is_array() {
                let end = start + stream.byte_offset();
                return Some(trimmed[start..end].to_string());
            }
        }
    }

    None
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new("http://localhost:11434".to_string(), "llama3".to_string())
    }
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: options.json.then_some("json"),
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

/// Backend used when LLM calls are switched off. Every call fails, so
/// callers take their heuristic fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        anyhow::bail!("LLM backend is disabled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            let mut replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let text = "Sure! Here it is:\n```json\n{\"a\": [1, 2]}\n```\nAnything else?";
        assert_eq!(extract_json_block(text).as_deref(), Some("{\"a\": [1, 2]}"));
    }

    #[test]
    fn extracts_top_level_array() {
        assert_eq!(
            extract_json_block("patterns: [\"x\", \"y\"] done").as_deref(),
            Some("[\"x\", \"y\"]")
        );
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json_block("nothing structured {here").is_none());
    }

    #[tokio::test]
    async fn retry_uses_correction_reply() {
        let llm = Scripted::new(&["not json", "{\"fixed\": true}"]);
        let json = llm
            .generate_json_with_retry("prompt", &GenerationOptions::default(), 2)
            .await
            .unwrap();
        assert_eq!(json, "{\"fixed\": true}");
    }

    #[tokio::test]
    async fn disabled_backend_always_fails() {
        let result = DisabledLlm
            .generate("anything", &GenerationOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn default_client_targets_local_ollama() {
        let client = OllamaClient::default();
        assert_eq!(client.model(), "llama3");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
