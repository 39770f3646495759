//! In-process stand-ins for the external services.
//!
//! Selected by `general.offline = true` so the whole service runs on a laptop
//! without API keys or a chain, and used as fakes by the test suites. Every
//! stand-in records what it was asked to do.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use memebattle_core::types::{BattleId, WalletAddress, Wei};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::abi;
use crate::attestation::{AttestationReceipt, BetAttestation};
use crate::bridge::{AttestationService, ContractBridge, HashtagMetrics, TxHash};
use crate::error::AdapterError;

// ---------------------------------------------------------------------------
// Hashtags
// ---------------------------------------------------------------------------

/// Hashtag counts from a table; unknown tags count as zero.
#[derive(Debug, Default)]
pub struct StaticHashtagMetrics {
    counts: RwLock<HashMap<String, u64>>,
    failing: RwLock<HashSet<String>>,
    lookups: AtomicU64,
}

impl StaticHashtagMetrics {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count for `hashtag`.
    pub fn set(&self, hashtag: &str, count: u64) {
        self.counts.write().insert(hashtag.to_string(), count);
    }

    /// Make lookups of `hashtag` fail.
    pub fn fail(&self, hashtag: &str) {
        self.failing.write().insert(hashtag.to_string());
    }

    /// Number of lookups served so far.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HashtagMetrics for StaticHashtagMetrics {
    async fn media_count(&self, hashtag: &str) -> Result<u64, AdapterError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.failing.read().contains(hashtag) {
            return Err(AdapterError::Http(format!("lookup of #{hashtag} failed")));
        }
        Ok(self.counts.read().get(hashtag).copied().unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A contract call as recorded by [`RecordingContract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// `createBattle`
    CreateBattle {
        /// Battle key.
        battle_id: BattleId,
        /// Meme names in order.
        meme_names: Vec<String>,
        /// Duration in seconds.
        duration_secs: u64,
        /// Attached value.
        stake: Wei,
    },
    /// `declareWinner`
    DeclareWinner {
        /// Battle key.
        battle_id: BattleId,
        /// 1-based meme id.
        meme_id: u64,
    },
    /// `placeBet`
    PlaceBet {
        /// Sender.
        bettor: WalletAddress,
        /// Battle key.
        battle_id: BattleId,
        /// 1-based meme id.
        meme_id: u64,
        /// Attached value.
        amount: Wei,
    },
}

/// A contract that accepts every call and remembers it.
#[derive(Debug, Default)]
pub struct RecordingContract {
    calls: Mutex<Vec<ContractCall>>,
    reverting: AtomicBool,
}

impl RecordingContract {
    /// New contract with no calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call revert (or stop reverting).
    pub fn set_reverting(&self, reverting: bool) {
        self.reverting.store(reverting, Ordering::Relaxed);
    }

    /// Calls accepted so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ContractCall) -> Result<TxHash, AdapterError> {
        let mut calls = self.calls.lock();
        let hash = TxHash(format!(
            "0x{}",
            hex::encode(abi::keccak256(format!("{}:{call:?}", calls.len()).as_bytes()))
        ));
        if self.reverting.load(Ordering::Relaxed) {
            return Err(AdapterError::Reverted(hash.0));
        }
        debug!(tx = %hash, ?call, "Local contract call");
        calls.push(call);
        Ok(hash)
    }
}

#[async_trait]
impl ContractBridge for RecordingContract {
    async fn create_battle(
        &self,
        battle_id: &BattleId,
        meme_names: &[String],
        duration_secs: u64,
        stake: Wei,
    ) -> Result<TxHash, AdapterError> {
        self.record(ContractCall::CreateBattle {
            battle_id: *battle_id,
            meme_names: meme_names.to_vec(),
            duration_secs,
            stake,
        })
    }

    async fn declare_winner(&self, battle_id: &BattleId, meme_id: u64) -> Result<TxHash, AdapterError> {
        self.record(ContractCall::DeclareWinner {
            battle_id: *battle_id,
            meme_id,
        })
    }

    async fn place_bet(
        &self,
        bettor: &WalletAddress,
        battle_id: &BattleId,
        meme_id: u64,
        amount: Wei,
    ) -> Result<TxHash, AdapterError> {
        self.record(ContractCall::PlaceBet {
            bettor: bettor.clone(),
            battle_id: *battle_id,
            meme_id,
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Attestations
// ---------------------------------------------------------------------------

/// Issues sequential attestation ids and keeps every request.
#[derive(Debug, Default)]
pub struct LocalAttestations {
    issued: Mutex<Vec<BetAttestation>>,
    rejecting: AtomicBool,
}

impl LocalAttestations {
    /// New service with nothing issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent request (or stop rejecting).
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::Relaxed);
    }

    /// Attestations issued so far.
    #[must_use]
    pub fn issued(&self) -> Vec<BetAttestation> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl AttestationService for LocalAttestations {
    async fn attest_bet(&self, attestation: &BetAttestation) -> Result<AttestationReceipt, AdapterError> {
        if self.rejecting.load(Ordering::Relaxed) {
            return Err(AdapterError::Http("attestation rejected".into()));
        }
        let mut issued = self.issued.lock();
        issued.push(attestation.clone());
        Ok(AttestationReceipt {
            attestation_id: format!("{:#x}", issued.len()),
            tx_hash: None,
        })
    }
}
