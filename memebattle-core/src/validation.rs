//! Input validation for battle forms, chat messages and bets.
//!
//! Battle forms report every failing field at once so the caller can
//! highlight all of them; chat and bet checks fail fast.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::{BattleConfig, ChatConfig};
use crate::error::{FieldError, MemeBattleError, Result};
use crate::types::{Meme, WalletAddress, Wei};

/// Message attached to every empty required field.
pub const REQUIRED_FIELD: &str = "Enter this field";

/// A meme as entered on the add-battle form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemeDraft {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Image URL.
    #[serde(default)]
    pub image: String,
    /// Hashtag, with or without `#`.
    #[serde(default)]
    pub hashtag: String,
}

/// The add-battle form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BattleDraft {
    /// Battle title.
    #[serde(default)]
    pub name: String,
    /// Battle description.
    #[serde(default)]
    pub description: String,
    /// Competing memes.
    #[serde(default)]
    pub memes: Vec<MemeDraft>,
    /// Duration in seconds; the configured default applies when absent.
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// A battle form that passed validation.
#[derive(Debug, Clone)]
pub struct ValidBattle {
    /// Trimmed title.
    pub name: String,
    /// Trimmed description.
    pub description: String,
    /// Normalised memes.
    pub memes: Vec<Meme>,
    /// Duration in seconds.
    pub duration_secs: u64,
}

/// Validate a single meme entry.
///
/// # Errors
/// Returns [`MemeBattleError::Validation`] listing every empty field.
pub fn validate_meme(draft: &MemeDraft) -> Result<Meme> {
    let mut errors = Vec::new();
    for (field, value) in [
        ("memeName", &draft.name),
        ("memeImage", &draft.image),
        ("memeHashtag", &draft.hashtag),
    ] {
        if value.trim().is_empty() {
            errors.push(FieldError {
                field,
                message: REQUIRED_FIELD.to_string(),
            });
        }
    }
    if draft.hashtag.trim().trim_start_matches('#').is_empty() && errors.iter().all(|e| e.field != "memeHashtag") {
        errors.push(FieldError {
            field: "memeHashtag",
            message: REQUIRED_FIELD.to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(MemeBattleError::Validation(errors));
    }
    Ok(Meme::new(draft.name.trim(), draft.image.trim(), draft.hashtag.trim()))
}

/// Validate the whole add-battle form.
///
/// # Errors
/// Returns [`MemeBattleError::Validation`] listing every failing field.
pub fn validate_battle(draft: &BattleDraft, config: &BattleConfig) -> Result<ValidBattle> {
    let mut errors = Vec::new();

    if draft.name.trim().is_empty() {
        errors.push(FieldError {
            field: "battleName",
            message: REQUIRED_FIELD.to_string(),
        });
    }
    if draft.description.trim().is_empty() {
        errors.push(FieldError {
            field: "battleDescription",
            message: REQUIRED_FIELD.to_string(),
        });
    }

    let duration_secs = draft.duration_secs.unwrap_or(config.default_duration_secs);
    if duration_secs < config.min_duration_secs || duration_secs > config.max_duration_secs {
        errors.push(FieldError {
            field: "battleDuration",
            message: format!(
                "Duration must be between {} and {} seconds",
                config.min_duration_secs, config.max_duration_secs
            ),
        });
    }

    let mut memes = Vec::with_capacity(draft.memes.len());
    if draft.memes.is_empty() {
        errors.push(FieldError {
            field: "memes",
            message: "Add at least one meme".to_string(),
        });
    }
    for meme in &draft.memes {
        match validate_meme(meme) {
            Ok(m) => memes.push(m),
            Err(MemeBattleError::Validation(mut e)) => errors.append(&mut e),
            Err(other) => return Err(other),
        }
    }

    if !errors.is_empty() {
        return Err(MemeBattleError::Validation(errors));
    }

    Ok(ValidBattle {
        name: draft.name.trim().to_string(),
        description: draft.description.trim().to_string(),
        memes,
        duration_secs,
    })
}

/// Validate a chat message and return the trimmed content.
///
/// # Errors
/// Returns [`MemeBattleError::Validation`] when the message is empty or too
/// long.
pub fn validate_chat_message(content: &str, config: &ChatConfig) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(MemeBattleError::Validation(vec![FieldError {
            field: "content",
            message: "Message is empty".to_string(),
        }]));
    }
    let chars = trimmed.chars().count();
    if chars > config.max_message_chars {
        return Err(MemeBattleError::Validation(vec![FieldError {
            field: "content",
            message: format!(
                "Message too long: {chars} chars (max: {})",
                config.max_message_chars
            ),
        }]));
    }
    Ok(trimmed.to_string())
}

/// Parse a bet amount in ether and reject zero.
///
/// # Errors
/// Returns [`MemeBattleError::InvalidAmount`] for malformed or zero amounts.
pub fn validate_bet_amount(raw: &str) -> Result<Wei> {
    let amount = Wei::parse_ether(raw)?;
    if amount.is_zero() {
        return Err(MemeBattleError::InvalidAmount(format!(
            "bet must be greater than zero (got '{raw}')"
        )));
    }
    Ok(amount)
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// A sliding-window rate limiter for a single sender.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum allowed attempts per window.
    max_per_window: u32,
    /// Window duration in seconds.
    window_seconds: u64,
    /// Timestamps of recent attempts.
    attempts: Vec<u64>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new(max_per_window: u32, window_seconds: u64) -> Self {
        Self {
            max_per_window,
            window_seconds,
            attempts: Vec::new(),
        }
    }

    /// Whether another attempt fits in the window ending at
    /// `current_time_secs`.
    pub fn allows(&mut self, current_time_secs: u64) -> bool {
        // Prune old attempts outside the window.
        let cutoff = current_time_secs.saturating_sub(self.window_seconds);
        self.attempts.retain(|&t| t >= cutoff);
        self.attempts.len() < self.max_per_window as usize
    }

    /// Count an attempt at `current_time_secs`.
    pub fn record(&mut self, current_time_secs: u64) {
        self.attempts.push(current_time_secs);
    }

    /// Check if an attempt is allowed, and record it if so.
    pub fn check_and_record(&mut self, current_time_secs: u64) -> bool {
        let allowed = self.allows(current_time_secs);
        if allowed {
            self.record(current_time_secs);
        }
        allowed
    }

    /// True when no attempt is left inside the window.
    #[must_use]
    pub fn is_idle(&self, current_time_secs: u64) -> bool {
        let cutoff = current_time_secs.saturating_sub(self.window_seconds);
        self.attempts.iter().all(|&t| t < cutoff)
    }
}

/// Rate limiters keyed by sending account.
///
/// Senders with no attempt left in the window are dropped at most once per
/// window, so the map only holds recently active senders.
#[derive(Debug)]
pub struct SenderRateLimits {
    max_per_window: u32,
    window_seconds: u64,
    limiters: HashMap<WalletAddress, RateLimiter>,
    last_sweep: u64,
}

impl SenderRateLimits {
    /// Create limits from chat configuration.
    #[must_use]
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            max_per_window: config.rate_limit_messages,
            window_seconds: config.rate_limit_window_secs,
            limiters: HashMap::new(),
            last_sweep: 0,
        }
    }

    /// Check whether `sender` may make another attempt, without counting it.
    ///
    /// # Errors
    /// Returns [`MemeBattleError::RateLimited`] if the sender is over the limit.
    pub fn check(&mut self, sender: &WalletAddress, now_secs: u64) -> Result<()> {
        let allowed = self
            .limiters
            .get_mut(sender)
            .is_none_or(|limiter| limiter.allows(now_secs));
        if allowed {
            Ok(())
        } else {
            Err(MemeBattleError::RateLimited(format!(
                "{sender} may send at most {} messages per {}s",
                self.max_per_window, self.window_seconds
            )))
        }
    }

    /// Count an attempt by `sender`.
    pub fn record(&mut self, sender: &WalletAddress, now_secs: u64) {
        self.sweep(now_secs);
        let (max, window) = (self.max_per_window, self.window_seconds);
        self.limiters
            .entry(sender.clone())
            .or_insert_with(|| RateLimiter::new(max, window))
            .record(now_secs);
    }

    /// [`Self::check`] then [`Self::record`].
    ///
    /// # Errors
    /// Returns [`MemeBattleError::RateLimited`] if the sender is over the limit.
    pub fn check_and_record(&mut self, sender: &WalletAddress, now_secs: u64) -> Result<()> {
        self.check(sender, now_secs)?;
        self.record(sender, now_secs);
        Ok(())
    }

    /// Number of senders currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.limiters.len()
    }

    fn sweep(&mut self, now_secs: u64) {
        if now_secs < self.last_sweep.saturating_add(self.window_seconds) {
            return;
        }
        self.limiters.retain(|_, limiter| !limiter.is_idle(now_secs));
        self.last_sweep = now_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meme(name: &str, image: &str, tag: &str) -> MemeDraft {
        MemeDraft {
            name: name.into(),
            image: image.into(),
            hashtag: tag.into(),
        }
    }

    fn fields(err: MemeBattleError) -> Vec<&'static str> {
        match err {
            MemeBattleError::Validation(f) => f.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_battle_passes() {
        let draft = BattleDraft {
            name: "  Dog vs Cat ".into(),
            description: "who wins".into(),
            memes: vec![meme("Doge", "https://i/doge.png", "#doge"), meme("Cat", "https://i/cat.png", "cat")],
            duration_secs: None,
        };
        let ok = validate_battle(&draft, &BattleConfig::default()).expect("valid");
        assert_eq!(ok.name, "Dog vs Cat");
        assert_eq!(ok.duration_secs, 600);
        assert_eq!(ok.memes[0].hashtag, "doge");
    }

    #[test]
    fn reports_every_missing_field() {
        let draft = BattleDraft {
            name: String::new(),
            description: " ".into(),
            memes: vec![meme("", "img", "")],
            duration_secs: Some(600),
        };
        let f = fields(validate_battle(&draft, &BattleConfig::default()).expect_err("invalid"));
        assert_eq!(f, vec!["battleName", "battleDescription", "memeName", "memeHashtag"]);
    }

    #[test]
    fn requires_at_least_one_meme() {
        let draft = BattleDraft {
            name: "n".into(),
            description: "d".into(),
            memes: vec![],
            duration_secs: None,
        };
        let f = fields(validate_battle(&draft, &BattleConfig::default()).expect_err("invalid"));
        assert_eq!(f, vec!["memes"]);
    }

    #[test]
    fn duration_bounds() {
        let mut draft = BattleDraft {
            name: "n".into(),
            description: "d".into(),
            memes: vec![meme("a", "b", "c")],
            duration_secs: Some(59),
        };
        let config = BattleConfig::default();
        assert_eq!(fields(validate_battle(&draft, &config).expect_err("short")), vec!["battleDuration"]);
        draft.duration_secs = Some(1801);
        assert!(validate_battle(&draft, &config).is_err());
        draft.duration_secs = Some(60);
        assert!(validate_battle(&draft, &config).is_ok());
        draft.duration_secs = Some(1800);
        assert!(validate_battle(&draft, &config).is_ok());
    }

    #[test]
    fn bare_hash_is_not_a_hashtag() {
        assert_eq!(fields(validate_meme(&meme("a", "b", "#")).expect_err("invalid")), vec!["memeHashtag"]);
    }

    #[test]
    fn chat_message_is_trimmed_and_bounded() {
        let config = ChatConfig::default();
        assert_eq!(validate_chat_message("  gm  ", &config).expect("ok"), "gm");
        assert!(validate_chat_message("   ", &config).is_err());
        assert!(validate_chat_message(&"x".repeat(501), &config).is_err());
        assert!(validate_chat_message(&"x".repeat(500), &config).is_ok());
    }

    #[test]
    fn zero_bet_rejected() {
        assert!(validate_bet_amount("0").is_err());
        assert!(validate_bet_amount("").is_err());
        assert!(validate_bet_amount("abc").is_err());
        assert_eq!(validate_bet_amount("0.01").expect("ok"), Wei(10_000_000_000_000_000));
    }

    #[test]
    fn rate_limiter_works() {
        let mut limiter = RateLimiter::new(3, 60);
        assert!(limiter.check_and_record(0));
        assert!(limiter.check_and_record(10));
        assert!(limiter.check_and_record(20));
        assert!(!limiter.check_and_record(30)); // 4th attempt in 60s window
        assert!(limiter.check_and_record(70)); // outside window, old attempts pruned
    }

    #[test]
    fn limits_are_per_sender() {
        let config = ChatConfig {
            rate_limit_messages: 1,
            ..ChatConfig::default()
        };
        let mut limits = SenderRateLimits::new(&config);
        let a = WalletAddress::parse("0x1111111111111111111111111111111111111111").expect("addr");
        let b = WalletAddress::parse("0x2222222222222222222222222222222222222222").expect("addr");
        assert!(limits.check_and_record(&a, 0).is_ok());
        assert!(limits.check_and_record(&a, 1).is_err());
        assert!(limits.check_and_record(&b, 1).is_ok());
    }

    #[test]
    fn check_alone_does_not_use_a_slot() {
        let config = ChatConfig {
            rate_limit_messages: 1,
            ..ChatConfig::default()
        };
        let mut limits = SenderRateLimits::new(&config);
        let a = WalletAddress::parse("0x1111111111111111111111111111111111111111").expect("addr");
        for _ in 0..5 {
            assert!(limits.check(&a, 0).is_ok());
        }
        assert_eq!(limits.tracked(), 0);
        limits.record(&a, 0);
        assert!(limits.check(&a, 0).is_err());
    }

    #[test]
    fn idle_senders_are_evicted() {
        let config = ChatConfig {
            rate_limit_messages: 5,
            rate_limit_window_secs: 60,
            ..ChatConfig::default()
        };
        let mut limits = SenderRateLimits::new(&config);
        for i in 0..1_000u32 {
            let sender = WalletAddress::parse(&format!("0x{i:040x}")).expect("addr");
            limits.check_and_record(&sender, 100).expect("first message");
        }
        assert_eq!(limits.tracked(), 1_000);

        let late = WalletAddress::parse("0x2222222222222222222222222222222222222222").expect("addr");
        limits.check_and_record(&late, 200).expect("late message");
        assert_eq!(limits.tracked(), 1, "only the active sender is kept");
    }
}
