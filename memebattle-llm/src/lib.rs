//! # memebattle-llm
//!
//! LLM access for the meme battle service. Supported backends:
//!   - **Ollama** (local, default)
//!   - **OpenAI-compatible API** (any provider exposing `/v1/chat/completions`)
//!   - **None** (every call fails with [`LlmError::Unavailable`])
//!
//! The only feature built on top is meme scoring: the model rates a meme
//! from 0 to 100 and explains itself in a short structured JSON answer.

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod prompt;
pub mod scorer;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use scorer::MemeScorer;
pub use types::{LlmRequest, LlmResponse, MemeScore};
