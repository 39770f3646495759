//! Error types for adapters and the battle service.

use memebattle_core::error::MemeBattleError;
use memebattle_core::types::BattleId;
use memebattle_llm::LlmError;
use thiserror::Error;

use crate::bridge::TxHash;

/// Failure talking to an external service.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport-level or non-success HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The JSON-RPC endpoint returned an error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The request or receipt wait timed out.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The transaction was mined but reverted.
    #[error("Transaction {0} reverted")]
    Reverted(String),

    /// A response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Required configuration is missing.
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    /// The LLM client could not be built.
    #[error("LLM client: {0}")]
    Llm(#[source] LlmError),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(err.to_string())
        } else if err.is_decode() {
            AdapterError::Decode(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

/// Error returned by [`crate::service::BattleService`] operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Validation, lookup, state or storage failure.
    #[error(transparent)]
    Domain(#[from] MemeBattleError),

    /// The battle was saved but `createBattle` failed on-chain.
    #[error("Battle {battle} was saved but the on-chain createBattle call failed: {source}")]
    CreateOnChainFailed {
        /// The stored battle.
        battle: BattleId,
        /// Contract failure.
        #[source]
        source: AdapterError,
    },

    /// A contract call failed; nothing was written.
    #[error("Contract call failed: {0}")]
    Contract(#[source] AdapterError),

    /// The winner is on-chain but the database write failed.
    #[error("Winner of battle {battle} was declared on-chain in {tx_hash} but could not be saved: {source}")]
    WinnerNotPersisted {
        /// Battle being decided.
        battle: BattleId,
        /// Transaction that declared the winner.
        tx_hash: TxHash,
        /// Storage failure.
        #[source]
        source: MemeBattleError,
    },

    /// Another declaration for the same battle is running.
    #[error("Winner declaration already in progress for battle {0}")]
    DeclarationInProgress(BattleId),

    /// The attestation service rejected or failed the bet.
    #[error("Attestation failed: {0}")]
    Attestation(#[source] AdapterError),

    /// An adapter could not be built from the configuration.
    #[error("Adapter setup failed: {0}")]
    Setup(#[source] AdapterError),

    /// Meme scoring failed.
    #[error("Meme scoring failed: {0}")]
    Scoring(#[from] LlmError),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ServiceError>;
