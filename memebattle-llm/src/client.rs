//! LLM client with Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use memebattle_core::config::LlmConfig;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// Server root, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// OpenAI-compatible chat completions API.
    OpenAiCompatible {
        /// Server root; `/v1/chat/completions` is appended.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No LLM available; all calls return [`LlmError::Unavailable`].
    None,
}

impl LlmProvider {
    /// Build a provider from the `[llm]` config section.
    ///
    /// # Errors
    /// Returns [`LlmError::ConfigError`] for an unknown provider name.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        match config.provider.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama {
                base_url: config.base_url.trim_end_matches('/').to_string(),
            }),
            "openai" | "openai-compatible" | "openai_compatible" => Ok(Self::OpenAiCompatible {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
            }),
            "none" | "" => Ok(Self::None),
            other => Err(LlmError::ConfigError(format!("unknown LLM provider '{other}'"))),
        }
    }
}

/// Routes requests to the configured backend with bounded retries.
#[derive(Debug)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
        }
    }

    /// Create a client from the `[llm]` config section.
    ///
    /// # Errors
    /// Returns [`LlmError::ConfigError`] for an unknown provider name.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = LlmProvider::from_config(config)?;
        Ok(Self::new(provider, config.model.clone(), config.max_retries))
    }

    /// Create a client with no LLM backend.
    #[must_use]
    pub fn none() -> Self {
        Self {
            provider: LlmProvider::None,
            http: Client::new(),
            model: String::new(),
            max_retries: 0,
        }
    }

    /// Generate a response from the LLM.
    ///
    /// # Errors
    /// Returns `Err` if the LLM is unavailable or all retries fail.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, request).await,
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
        }
    }

    /// Generate using Ollama's API.
    async fn generate_ollama(&self, base_url: &str, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/api/generate");
        let mut body = json!({
            "model": self.model,
            "prompt": format!("{}\n\n{}", request.system, request.user),
            "stream": false,
            "format": "json",
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        if let Some(grammar) = &request.grammar {
            body["options"]["grammar"] = json!(grammar);
        }

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying Ollama call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .json(&body)
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await;
            let latency_ms = elapsed_ms(start);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: serde_json::Value =
                        resp.json().await.map_err(|e| LlmError::ParseError(e.to_string()))?;
                    return Ok(LlmResponse {
                        text: json["response"].as_str().unwrap_or("").to_string(),
                        tokens_generated: token_count(&json["eval_count"]),
                        latency_ms,
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}: {}", resp.status(), resp.text().await.unwrap_or_default());
                    warn!("Ollama returned error: {}", last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!("Ollama request timed out after {}ms", request.timeout_ms);
                    } else {
                        warn!("Ollama request failed: {}", last_error);
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Generate using an OpenAI-compatible API.
    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/v1/chat/completions");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "response_format": { "type": "json_object" },
        });

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying OpenAI call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await;
            let latency_ms = elapsed_ms(start);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: serde_json::Value =
                        resp.json().await.map_err(|e| LlmError::ParseError(e.to_string()))?;
                    return Ok(LlmResponse {
                        text: json["choices"][0]["message"]["content"]
                            .as_str()
                            .unwrap_or("")
                            .to_string(),
                        tokens_generated: token_count(&json["usage"]["completion_tokens"]),
                        latency_ms,
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                    warn!("OpenAI API returned error: {}", last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("OpenAI API request failed: {}", last_error);
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Parse a raw LLM response text as structured JSON.
    ///
    /// Models often wrap JSON in a code fence or a sentence; everything
    /// outside the outermost braces is ignored.
    ///
    /// # Errors
    /// Returns `Err` if no valid JSON object of type `T` can be extracted.
    pub fn parse_structured<T: serde::de::DeserializeOwned>(&self, response: &LlmResponse) -> Result<T, LlmError> {
        let text = response.text.trim();
        let candidate = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => text,
        };
        serde_json::from_str(candidate)
            .map_err(|e| LlmError::ParseError(format!("JSON parse error: {e}; raw text: '{}'", response.text)))
    }

    /// Check if the LLM client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Model name used for every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn token_count(value: &serde_json::Value) -> u32 {
    value.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}
