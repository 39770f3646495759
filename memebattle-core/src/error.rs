//! Error types for the meme battle core library.

use thiserror::Error;

use crate::types::BattleId;

/// Top-level error type for all meme battle operations.
#[derive(Error, Debug)]
pub enum MemeBattleError {
    /// No battle exists with the given id.
    #[error("Battle not found: {0}")]
    BattleNotFound(String),

    /// A meme index was outside the battle's meme list.
    #[error("Meme {index} does not exist in battle {battle} ({len} memes)")]
    MemeIndexOutOfRange {
        /// Battle that was addressed.
        battle: BattleId,
        /// Requested index.
        index: usize,
        /// Number of memes in the battle.
        len: usize,
    },

    /// One or more form fields failed validation.
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// Bets are only accepted while the battle clock is running.
    #[error("Betting is closed for battle {0}")]
    BettingClosed(BattleId),

    /// The winner has already been recorded.
    #[error("Winner has already been declared for battle {0}")]
    WinnerAlreadyDeclared(BattleId),

    /// The battle has not ended yet.
    #[error("Battle {0} is still running")]
    BattleStillRunning(BattleId),

    /// No meme could be matched as winner.
    #[error("Could not determine the winner of battle {0}")]
    WinnerUndetermined(BattleId),

    /// An operation needs a connected wallet.
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// A wallet address failed to parse.
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// An ether / wei amount failed to parse or was not allowed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The sender exceeded the chat rate limit.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    /// Form field name (`battleName`, `memeHashtag`, ...).
    pub field: &'static str,
    /// Human-readable message.
    pub message: String,
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MemeBattleError>;
