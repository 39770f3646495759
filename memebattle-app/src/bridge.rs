//! Seams between the battle service and the outside world.
//!
//! Each external collaborator is an `async_trait` object so the service can
//! hold `Arc<dyn ...>` handles and tests can swap in local stand-ins.

use std::fmt;

use async_trait::async_trait;
use memebattle_core::types::{Battle, BattleId, Meme, WalletAddress, Wei};
use memebattle_llm::{LlmError, MemeScore, MemeScorer};
use serde::{Deserialize, Serialize};

use crate::attestation::{AttestationReceipt, BetAttestation};
use crate::error::AdapterError;

/// Hash of a mined transaction, `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of hashtag popularity.
#[async_trait]
pub trait HashtagMetrics: Send + Sync {
    /// Number of posts carrying `hashtag` (given without `#`).
    async fn media_count(&self, hashtag: &str) -> Result<u64, AdapterError>;
}

/// The battle smart contract.
///
/// Every method returns once the transaction is mined and succeeded.
#[async_trait]
pub trait ContractBridge: Send + Sync {
    /// `createBattle(battleId, memeNames, duration)` with `stake` attached.
    async fn create_battle(
        &self,
        battle_id: &BattleId,
        meme_names: &[String],
        duration_secs: u64,
        stake: Wei,
    ) -> Result<TxHash, AdapterError>;

    /// `declareWinner(battleId, memeId)`; `meme_id` is 1-based.
    async fn declare_winner(&self, battle_id: &BattleId, meme_id: u64) -> Result<TxHash, AdapterError>;

    /// `placeBet(battleId, memeId)` sent from `bettor` with `amount` attached;
    /// `meme_id` is 1-based.
    async fn place_bet(
        &self,
        bettor: &WalletAddress,
        battle_id: &BattleId,
        meme_id: u64,
        amount: Wei,
    ) -> Result<TxHash, AdapterError>;
}

/// The attestation protocol that records bets.
#[async_trait]
pub trait AttestationService: Send + Sync {
    /// Create an attestation for a bet.
    async fn attest_bet(&self, attestation: &BetAttestation) -> Result<AttestationReceipt, AdapterError>;
}

/// LLM-backed meme rating.
#[async_trait]
pub trait MemeScoring: Send + Sync {
    /// Rate `meme` within `battle`.
    async fn score(&self, battle: &Battle, meme: &Meme) -> Result<MemeScore, LlmError>;
}

#[async_trait]
impl MemeScoring for MemeScorer {
    async fn score(&self, battle: &Battle, meme: &Meme) -> Result<MemeScore, LlmError> {
        MemeScorer::score(self, battle, meme).await
    }
}
