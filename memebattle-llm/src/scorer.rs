//! Meme scoring on top of [`LlmClient`].

use memebattle_core::types::{Battle, Meme};
use tracing::{debug, info};

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::prompt::{self, MEME_SCORE_GRAMMAR, MEME_SCORE_SYSTEM, MEME_SCORE_USER};
use crate::types::{LlmRequest, MemeScore, MemeScoreResponse};

/// Most strengths kept from a model answer.
const MAX_STRENGTHS: usize = 3;

/// Asks the LLM to rate a meme.
#[derive(Debug)]
pub struct MemeScorer {
    client: LlmClient,
    timeout_ms: u64,
}

impl MemeScorer {
    /// Wrap a client; `timeout_ms` applies to each attempt.
    #[must_use]
    pub fn new(client: LlmClient, timeout_ms: u64) -> Self {
        Self { client, timeout_ms }
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.client.is_available()
    }

    /// Build the scoring request for one meme of a battle.
    #[must_use]
    pub fn build_request(&self, battle: &Battle, meme: &Meme) -> LlmRequest {
        let battle_name = prompt::sanitize_var(&battle.name);
        let battle_description = prompt::sanitize_var(&battle.description);
        let meme_name = prompt::sanitize_var(&meme.name);
        let meme_hashtag = prompt::sanitize_var(&meme.hashtag);
        let meme_image = prompt::sanitize_var(&meme.image);
        let user = prompt::render_template(
            MEME_SCORE_USER,
            &[
                ("battle_name", &battle_name),
                ("battle_description", &battle_description),
                ("meme_name", &meme_name),
                ("meme_hashtag", &meme_hashtag),
                ("meme_image", &meme_image),
            ],
        );
        LlmRequest::new(MEME_SCORE_SYSTEM, user)
            .with_grammar(MEME_SCORE_GRAMMAR)
            .with_timeout(self.timeout_ms)
    }

    /// Score `meme` in the context of `battle`.
    ///
    /// # Errors
    /// Propagates backend failures, and returns [`LlmError::ParseError`] or
    /// [`LlmError::SchemaValidation`] when the answer is unusable.
    pub async fn score(&self, battle: &Battle, meme: &Meme) -> Result<MemeScore, LlmError> {
        let request = self.build_request(battle, meme);
        let response = self.client.generate(&request).await?;
        let raw: MemeScoreResponse = self.client.parse_structured(&response)?;
        debug!(meme = %meme.name, raw_score = raw.score, "LLM answered");

        let score = finalize(raw, response.model, response.latency_ms)?;
        info!(
            battle = %battle.id,
            meme = %meme.name,
            score = score.score,
            latency_ms = score.latency_ms,
            "Meme scored"
        );
        Ok(score)
    }
}

/// Clamp and tidy a raw model answer.
///
/// # Errors
/// Returns [`LlmError::SchemaValidation`] for a non-finite score or an
/// empty verdict.
pub fn finalize(raw: MemeScoreResponse, model: String, latency_ms: u64) -> Result<MemeScore, LlmError> {
    if !raw.score.is_finite() {
        return Err(LlmError::SchemaValidation(format!("score is not a number: {}", raw.score)));
    }
    let verdict = raw.verdict.trim().to_string();
    if verdict.is_empty() {
        return Err(LlmError::SchemaValidation("empty verdict".into()));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = raw.score.round().clamp(0.0, 100.0) as u8;

    let strengths = raw
        .strengths
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_STRENGTHS)
        .collect();

    Ok(MemeScore {
        score,
        verdict,
        strengths,
        model,
        latency_ms,
    })
}
