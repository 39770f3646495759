//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// System prompt (role, rules, output format).
    pub system: String,
    /// User prompt (the meme being judged).
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Optional GBNF grammar for structured output.
    pub grammar: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// Create a request with scoring-friendly defaults.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 200,
            temperature: 0.4,
            grammar: None,
            timeout_ms: 10_000,
        }
    }

    /// Set a GBNF grammar for structured output.
    #[must_use]
    pub fn with_grammar(mut self, grammar: impl Into<String>) -> Self {
        self.grammar = Some(grammar.into());
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

/// Raw scoring answer as the model writes it (matches the grammar).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemeScoreResponse {
    /// Score, nominally 0 to 100. Models sometimes overshoot.
    pub score: f64,
    /// One-sentence judgement.
    pub verdict: String,
    /// What the meme has going for it.
    #[serde(default)]
    pub strengths: Vec<String>,
}

/// A meme score ready to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeScore {
    /// Score in `0..=100`.
    pub score: u8,
    /// One-sentence judgement.
    pub verdict: String,
    /// What the meme has going for it.
    pub strengths: Vec<String>,
    /// Model that produced the score.
    pub model: String,
    /// LLM round-trip latency.
    pub latency_ms: u64,
}
