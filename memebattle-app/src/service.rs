//! The battle service: every user-facing operation.
//!
//! Store access is synchronous and always happens under a short-lived lock
//! that is never held across an `.await`. External calls go through the
//! trait objects in [`Adapters`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use memebattle_core::config::MemeBattleConfig;
use memebattle_core::countdown::{time_left, BattlePhase, TimeLeft};
use memebattle_core::error::MemeBattleError;
use memebattle_core::metrics::{BattleCounters, CounterSnapshot};
use memebattle_core::persistence::BattleStore;
use memebattle_core::types::{
    Battle, BattleId, BetId, ChatMessage, Meme, MemeMetric, MessageId, UserBet, WalletAddress, Wei,
};
use memebattle_core::validation::{self, BattleDraft, SenderRateLimits};
use memebattle_core::winner::pick_winner;
use memebattle_llm::{LlmClient, MemeScore, MemeScorer};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::attestation::{BetAttestation, HttpAttestationService};
use crate::bridge::{AttestationService, ContractBridge, HashtagMetrics, MemeScoring, TxHash};
use crate::clock::{Clock, SystemClock};
use crate::contract::RpcContractBridge;
use crate::error::{AdapterError, Result, ServiceError};
use crate::events::{BattleEvent, EventBus};
use crate::hashtag::RapidApiHashtagMetrics;
use crate::local::{LocalAttestations, RecordingContract, StaticHashtagMetrics};

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// The external collaborators of a [`BattleService`].
#[derive(Clone)]
pub struct Adapters {
    /// Hashtag popularity source.
    pub hashtags: Arc<dyn HashtagMetrics>,
    /// Battle contract.
    pub contract: Arc<dyn ContractBridge>,
    /// Bet attestation protocol.
    pub attestations: Arc<dyn AttestationService>,
    /// Meme scorer.
    pub scorer: Arc<dyn MemeScoring>,
}

impl Adapters {
    /// Build the adapters the configuration asks for: network clients
    /// normally, in-process stand-ins when `general.offline` is set.
    ///
    /// # Errors
    /// Returns an error when a network adapter is missing required settings
    /// or the LLM provider is unknown.
    pub fn from_config(config: &MemeBattleConfig) -> Result<Self> {
        let llm = LlmClient::from_config(&config.llm).map_err(|e| ServiceError::Setup(AdapterError::Llm(e)))?;
        let scorer = Arc::new(MemeScorer::new(llm, config.llm.request_timeout_ms));

        if config.general.offline {
            warn!("Offline mode: hashtag counts, contract and attestations are simulated in-process");
            return Ok(Self {
                hashtags: Arc::new(StaticHashtagMetrics::new()),
                contract: Arc::new(RecordingContract::new()),
                attestations: Arc::new(LocalAttestations::new()),
                scorer,
            });
        }

        if config.hashtag.api_key.is_empty() {
            warn!("hashtag.api_key is empty; hashtag lookups will likely be rejected");
        }
        Ok(Self {
            hashtags: Arc::new(RapidApiHashtagMetrics::from_config(&config.hashtag).map_err(ServiceError::Setup)?),
            contract: Arc::new(RpcContractBridge::from_config(&config.contract).map_err(ServiceError::Setup)?),
            attestations: Arc::new(HttpAttestationService::from_config(&config.attestation).map_err(ServiceError::Setup)?),
            scorer,
        })
    }
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A battle as shown in the list and detail pages.
#[derive(Debug, Clone, Serialize)]
pub struct BattleView {
    /// The stored battle.
    #[serde(flatten)]
    pub battle: Battle,
    /// Lifecycle phase at the time of the request.
    pub phase: BattlePhase,
    /// Status string: `open`, `ended` or `decided`.
    pub status: &'static str,
    /// Remaining time, structured.
    pub countdown: TimeLeft,
    /// Remaining time, rendered.
    pub time_left: String,
    /// Winning meme once decided.
    pub winner: Option<Meme>,
}

impl BattleView {
    /// Project `battle` at `now`.
    #[must_use]
    pub fn at(battle: Battle, now: DateTime<Utc>) -> Self {
        let phase = BattlePhase::of(&battle, now);
        let countdown = time_left(battle.end_time, now);
        let winner = battle.winner().cloned();
        Self {
            battle,
            phase,
            status: phase.status_str(),
            countdown,
            time_left: countdown.to_string(),
            winner,
        }
    }
}

/// One meme of a battle, as shown on its chatroom page.
#[derive(Debug, Clone, Serialize)]
pub struct MemeView {
    /// Battle id.
    pub battle_id: BattleId,
    /// Battle title.
    pub battle_name: String,
    /// Index of the meme.
    pub meme_index: usize,
    /// The meme.
    pub meme: Meme,
    /// Battle phase.
    pub phase: BattlePhase,
    /// Remaining time, rendered.
    pub time_left: String,
    /// Whether this meme won.
    pub is_winner: bool,
}

/// Answer of the battle-status query.
#[derive(Debug, Clone, Serialize)]
pub struct BattleStatus {
    /// Battle id.
    pub battle_id: BattleId,
    /// `open`, `ended` or `decided`.
    pub status: &'static str,
    /// Whether bets are accepted.
    pub accepts_bets: bool,
    /// Whether the winner may be declared.
    pub can_declare_winner: bool,
}

/// A stored battle plus its `createBattle` transaction.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBattle {
    /// The new battle.
    pub battle: BattleView,
    /// On-chain creation.
    pub tx_hash: TxHash,
}

/// Result of a winner declaration.
#[derive(Debug, Clone, Serialize)]
pub struct DeclareOutcome {
    /// Decided battle.
    pub battle_id: BattleId,
    /// Index of the winning meme.
    pub winning_meme: usize,
    /// The winning meme.
    pub winner: Meme,
    /// Media counts that decided it.
    pub metrics: Vec<MemeMetric>,
    /// `declareWinner` transaction.
    pub tx_hash: TxHash,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Removes a battle from the in-flight declaration set when dropped.
struct DeclarationGuard<'a> {
    in_flight: &'a Mutex<HashSet<BattleId>>,
    battle: BattleId,
}

impl Drop for DeclarationGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.battle);
    }
}

/// Runs every battle operation.
pub struct BattleService {
    config: MemeBattleConfig,
    store: Mutex<BattleStore>,
    adapters: Adapters,
    clock: Arc<dyn Clock>,
    counters: BattleCounters,
    rate_limits: Mutex<SenderRateLimits>,
    declaring: Mutex<HashSet<BattleId>>,
    events: EventBus,
}

impl std::fmt::Debug for BattleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleService")
            .field("store", &*self.store.lock())
            .field("counters", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl BattleService {
    /// Create a service on the system clock.
    #[must_use]
    pub fn new(config: MemeBattleConfig, store: BattleStore, adapters: Adapters) -> Self {
        Self::with_clock(config, store, adapters, Arc::new(SystemClock))
    }

    /// Create a service on an explicit clock.
    #[must_use]
    pub fn with_clock(config: MemeBattleConfig, store: BattleStore, adapters: Adapters, clock: Arc<dyn Clock>) -> Self {
        let rate_limits = SenderRateLimits::new(&config.chat);
        let events = EventBus::new(config.chat.live_channel_capacity);
        Self {
            config,
            store: Mutex::new(store),
            adapters,
            clock,
            counters: BattleCounters::new(),
            rate_limits: Mutex::new(rate_limits),
            declaring: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &MemeBattleConfig {
        &self.config
    }

    /// Current time according to the service clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn load(&self, id: &BattleId) -> Result<Battle> {
        Ok(self.store.lock().require_battle(id)?)
    }

    // ------------------------------------------------------------------
    // Battles
    // ------------------------------------------------------------------

    /// Validate and store a battle, then register it on-chain.
    ///
    /// The record stays stored when the contract call fails; that case is
    /// reported as [`ServiceError::CreateOnChainFailed`].
    ///
    /// # Errors
    /// Validation errors, storage errors, or the contract failure.
    pub async fn create_battle(&self, creator: Option<WalletAddress>, draft: &BattleDraft) -> Result<CreatedBattle> {
        let valid = validation::validate_battle(draft, &self.config.battle)?;
        let stake = Wei::parse_ether(&self.config.battle.creation_stake_ether)
            .map_err(|e| MemeBattleError::Config(format!("battle.creation_stake_ether: {e}")))?;
        let duration = i64::try_from(valid.duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| MemeBattleError::Config(format!("battle duration {}s is out of range", valid.duration_secs)))?;

        let now = self.now();
        let mut battle = Battle::new(valid.name, valid.description, valid.memes, now, duration);
        battle.creator = creator;
        self.store.lock().insert_battle(&battle)?;
        BattleCounters::incr(&self.counters.battles_created);
        info!(battle = %battle.id, memes = battle.memes.len(), duration_secs = valid.duration_secs, "Battle created");
        self.events.publish(BattleEvent::BattleCreated { battle_id: battle.id });

        let meme_names: Vec<String> = battle.memes.iter().map(|m| m.name.clone()).collect();
        let tx_hash = self
            .adapters
            .contract
            .create_battle(&battle.id, &meme_names, valid.duration_secs, stake)
            .await
            .map_err(|source| {
                BattleCounters::incr(&self.counters.contract_failures);
                error!(battle = %battle.id, error = %source, "createBattle failed; battle stays stored");
                ServiceError::CreateOnChainFailed {
                    battle: battle.id,
                    source,
                }
            })?;

        Ok(CreatedBattle {
            battle: BattleView::at(battle, now),
            tx_hash,
        })
    }

    /// Every battle, newest first.
    ///
    /// # Errors
    /// Storage errors.
    pub fn list_battles(&self) -> Result<Vec<BattleView>> {
        let now = self.now();
        let battles = self.store.lock().list_battles()?;
        Ok(battles.into_iter().map(|b| BattleView::at(b, now)).collect())
    }

    /// One battle with its countdown.
    ///
    /// # Errors
    /// [`MemeBattleError::BattleNotFound`] or storage errors.
    pub fn battle_detail(&self, id: &BattleId) -> Result<BattleView> {
        Ok(BattleView::at(self.load(id)?, self.now()))
    }

    /// One meme of a battle.
    ///
    /// # Errors
    /// Not found, index out of range, or storage errors.
    pub fn meme_detail(&self, id: &BattleId, meme_index: usize) -> Result<MemeView> {
        let battle = self.load(id)?;
        let now = self.now();
        let meme = battle.meme(meme_index)?.clone();
        Ok(MemeView {
            battle_id: battle.id,
            battle_name: battle.name.clone(),
            meme_index,
            meme,
            phase: BattlePhase::of(&battle, now),
            time_left: time_left(battle.end_time, now).to_string(),
            is_winner: battle.winning_meme == Some(meme_index),
        })
    }

    /// Status of a battle: `open`, `ended` or `decided`.
    ///
    /// # Errors
    /// Not found or storage errors.
    pub fn battle_status(&self, id: &BattleId) -> Result<BattleStatus> {
        let battle = self.load(id)?;
        let phase = BattlePhase::of(&battle, self.now());
        Ok(BattleStatus {
            battle_id: battle.id,
            status: phase.status_str(),
            accepts_bets: phase.accepts_bets(),
            can_declare_winner: phase.can_declare_winner(),
        })
    }

    // ------------------------------------------------------------------
    // Winner declaration
    // ------------------------------------------------------------------

    /// Decide a finished battle from hashtag popularity.
    ///
    /// The contract is called first; the database is only written once the
    /// transaction is mined.
    ///
    /// # Errors
    /// - not found, [`MemeBattleError::WinnerAlreadyDeclared`],
    ///   [`MemeBattleError::BattleStillRunning`]
    /// - [`ServiceError::DeclarationInProgress`] for concurrent requests
    /// - [`MemeBattleError::WinnerUndetermined`] when no meme matches
    /// - [`ServiceError::Contract`] when `declareWinner` fails
    /// - [`ServiceError::WinnerNotPersisted`] when the final write fails
    pub async fn declare_winner(&self, id: &BattleId) -> Result<DeclareOutcome> {
        self.load_awaiting_winner(id)?;

        let _guard = {
            let mut in_flight = self.declaring.lock();
            if !in_flight.insert(*id) {
                return Err(ServiceError::DeclarationInProgress(*id));
            }
            DeclarationGuard {
                in_flight: &self.declaring,
                battle: *id,
            }
        };
        // A declaration may have finished between the first check and the
        // guard.
        let battle = self.load_awaiting_winner(id)?;

        let metrics = self.fetch_metrics(&battle).await;
        let winning_meme = pick_winner(&battle.memes, &metrics).ok_or(MemeBattleError::WinnerUndetermined(*id))?;
        let winner = battle.meme(winning_meme)?.clone();
        info!(battle = %id, winning_meme, winner = %winner.name, "Winner selected");

        let meme_id = winning_meme as u64 + 1;
        let tx_hash = self.adapters.contract.declare_winner(id, meme_id).await.map_err(|e| {
            BattleCounters::incr(&self.counters.contract_failures);
            error!(battle = %id, error = %e, "declareWinner failed; nothing written");
            ServiceError::Contract(e)
        })?;

        let stored = self.store.lock().set_winner(id, winning_meme);
        if let Err(source) = stored {
            error!(
                battle = %id,
                tx = %tx_hash,
                error = %source,
                "Winner declared on-chain but not saved"
            );
            return Err(ServiceError::WinnerNotPersisted {
                battle: *id,
                tx_hash,
                source,
            });
        }

        BattleCounters::incr(&self.counters.winners_declared);
        self.events.publish(BattleEvent::WinnerDeclared {
            battle_id: *id,
            winning_meme,
            tx_hash: tx_hash.clone(),
        });
        info!(battle = %id, winning_meme, tx = %tx_hash, "Winner declared");

        Ok(DeclareOutcome {
            battle_id: *id,
            winning_meme,
            winner,
            metrics,
            tx_hash,
        })
    }

    fn load_awaiting_winner(&self, id: &BattleId) -> Result<Battle> {
        let battle = self.load(id)?;
        match BattlePhase::of(&battle, self.now()) {
            BattlePhase::Decided => Err(MemeBattleError::WinnerAlreadyDeclared(*id).into()),
            BattlePhase::Open => Err(MemeBattleError::BattleStillRunning(*id).into()),
            BattlePhase::AwaitingWinner => Ok(battle),
        }
    }

    /// Media counts for every meme, fetched concurrently. Failures count as
    /// zero.
    async fn fetch_metrics(&self, battle: &Battle) -> Vec<MemeMetric> {
        let lookups = battle.memes.iter().enumerate().map(|(meme_index, meme)| async move {
            let hashtag = meme.hashtag.clone();
            let media_count = if hashtag.is_empty() {
                0
            } else {
                match self.adapters.hashtags.media_count(&hashtag).await {
                    Ok(count) => count,
                    Err(e) => {
                        BattleCounters::incr(&self.counters.metric_fetch_failures);
                        warn!(battle = %battle.id, hashtag = %hashtag, error = %e, "Hashtag lookup failed; counting 0");
                        0
                    }
                }
            };
            MemeMetric {
                meme_index,
                hashtag,
                media_count,
            }
        });
        join_all(lookups).await
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Post a message to a meme's chatroom.
    ///
    /// # Errors
    /// [`MemeBattleError::WalletNotConnected`], not found, bad index,
    /// validation, rate limiting, or storage errors.
    pub fn post_chat(
        &self,
        sender: Option<WalletAddress>,
        id: &BattleId,
        meme_index: usize,
        content: &str,
    ) -> Result<ChatMessage> {
        let sender = sender.ok_or(MemeBattleError::WalletNotConnected)?;
        let content = validation::validate_chat_message(content, &self.config.chat)?;
        let battle = self.load(id)?;
        battle.meme(meme_index)?;

        let now = self.now();
        let now_secs = u64::try_from(now.timestamp()).unwrap_or(0);
        let mut limits = self.rate_limits.lock();
        limits.check(&sender, now_secs)?;

        let message = ChatMessage {
            id: MessageId::new(),
            battle_id: *id,
            meme_index,
            content,
            sender,
            timestamp: now,
        };
        self.store.lock().append_chat(&message)?;
        limits.record(&message.sender, now_secs);
        drop(limits);
        BattleCounters::incr(&self.counters.chat_messages);
        self.events.publish(BattleEvent::ChatPosted(message.clone()));
        Ok(message)
    }

    /// Messages of a meme's chatroom, oldest first.
    ///
    /// # Errors
    /// Not found, bad index, or storage errors.
    pub fn list_chat(&self, id: &BattleId, meme_index: usize) -> Result<Vec<ChatMessage>> {
        let store = self.store.lock();
        let battle = store.require_battle(id)?;
        battle.meme(meme_index)?;
        Ok(store.list_chat(id, meme_index)?)
    }

    /// Messages of a meme's chatroom posted after the message `after`,
    /// oldest first. With no cursor, or one not in the room, the whole room
    /// is returned.
    ///
    /// # Errors
    /// Not found, bad index, or storage errors.
    pub fn chat_since(&self, id: &BattleId, meme_index: usize, after: Option<&MessageId>) -> Result<Vec<ChatMessage>> {
        let mut messages = self.list_chat(id, meme_index)?;
        let start = after
            .and_then(|cursor| messages.iter().position(|m| m.id == *cursor))
            .map_or(0, |p| p + 1);
        Ok(messages.split_off(start))
    }

    /// Subscribe to live battle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BattleEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Bets
    // ------------------------------------------------------------------

    /// Check the caller, battle phase and amount for a bet.
    fn prepare_bet(
        &self,
        user: Option<WalletAddress>,
        id: &BattleId,
        meme_index: usize,
        amount_ether: &str,
    ) -> Result<(WalletAddress, Battle, Wei)> {
        let user = user.ok_or(MemeBattleError::WalletNotConnected)?;
        let battle = self.load(id)?;
        battle.meme(meme_index)?;
        if !BattlePhase::of(&battle, self.now()).accepts_bets() {
            return Err(MemeBattleError::BettingClosed(*id).into());
        }
        let amount = validation::validate_bet_amount(amount_ether)?;
        Ok((user, battle, amount))
    }

    fn record_bet(
        &self,
        user: WalletAddress,
        battle: &Battle,
        meme_index: usize,
        amount: Wei,
        attestation_id: String,
    ) -> Result<UserBet> {
        let bet = UserBet {
            id: BetId::new(),
            user,
            battle_id: battle.id,
            meme_index,
            amount,
            meme: battle.meme(meme_index)?.clone(),
            attestation_id,
            placed_at: self.now(),
        };
        self.store.lock().add_bet(&bet)?;
        BattleCounters::incr(&self.counters.bets_placed);
        self.events.publish(BattleEvent::BetPlaced {
            battle_id: bet.battle_id,
            meme_index,
            user: bet.user.clone(),
            amount,
        });
        info!(
            battle = %bet.battle_id,
            meme_index,
            user = %bet.user,
            amount_ether = %amount.format_ether(),
            "Bet recorded"
        );
        Ok(bet)
    }

    /// Bet on a meme through an attestation, then record it.
    ///
    /// # Errors
    /// Wallet, lookup, phase or amount errors, or
    /// [`ServiceError::Attestation`].
    pub async fn place_bet(
        &self,
        user: Option<WalletAddress>,
        id: &BattleId,
        meme_index: usize,
        amount_ether: &str,
    ) -> Result<UserBet> {
        let (user, battle, amount) = self.prepare_bet(user, id, meme_index, amount_ether)?;
        let attestation = BetAttestation::for_bet(&self.config.attestation, &user, id, meme_index, amount, self.now());

        let receipt = self
            .adapters
            .attestations
            .attest_bet(&attestation)
            .await
            .map_err(|e| {
                self.bet_failed(id, &user, &e);
                ServiceError::Attestation(e)
            })?;

        self.record_bet(user, &battle, meme_index, amount, receipt.attestation_id)
    }

    /// Bet on a meme directly through the contract's `placeBet`.
    ///
    /// # Errors
    /// Wallet, lookup, phase or amount errors, or [`ServiceError::Contract`].
    pub async fn place_bet_on_contract(
        &self,
        user: Option<WalletAddress>,
        id: &BattleId,
        meme_index: usize,
        amount_ether: &str,
    ) -> Result<UserBet> {
        let (user, battle, amount) = self.prepare_bet(user, id, meme_index, amount_ether)?;
        let tx_hash = self
            .adapters
            .contract
            .place_bet(&user, id, meme_index as u64 + 1, amount)
            .await
            .map_err(|e| {
                BattleCounters::incr(&self.counters.contract_failures);
                self.bet_failed(id, &user, &e);
                ServiceError::Contract(e)
            })?;

        self.record_bet(user, &battle, meme_index, amount, tx_hash.0)
    }

    fn bet_failed(&self, id: &BattleId, user: &WalletAddress, e: &AdapterError) {
        BattleCounters::incr(&self.counters.bets_failed);
        warn!(battle = %id, user = %user, error = %e, "Bet failed");
    }

    /// Every bet of an account, newest first.
    ///
    /// # Errors
    /// Storage errors.
    pub fn user_bets(&self, user: &WalletAddress) -> Result<Vec<UserBet>> {
        Ok(self.store.lock().bets_for_user(user)?)
    }

    /// Every bet on a battle, oldest first.
    ///
    /// # Errors
    /// Not found or storage errors.
    pub fn battle_bets(&self, id: &BattleId) -> Result<Vec<UserBet>> {
        let store = self.store.lock();
        store.require_battle(id)?;
        Ok(store.bets_for_battle(id)?)
    }

    // ------------------------------------------------------------------
    // Scoring, metrics, maintenance
    // ------------------------------------------------------------------

    /// Ask the LLM to rate a meme.
    ///
    /// # Errors
    /// Lookup errors or [`ServiceError::Scoring`].
    pub async fn score_meme(&self, id: &BattleId, meme_index: usize) -> Result<MemeScore> {
        let battle = self.load(id)?;
        let meme = battle.meme(meme_index)?.clone();
        let score = self.adapters.scorer.score(&battle, &meme).await?;
        BattleCounters::incr(&self.counters.meme_scores);
        Ok(score)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn metrics(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Write a rotating database backup.
    ///
    /// # Errors
    /// Storage or I/O errors.
    pub fn backup(&self) -> Result<()> {
        Ok(self.store.lock().create_rotating_backup()?)
    }

    /// Whether the database passes an integrity check.
    ///
    /// # Errors
    /// Storage errors.
    pub fn healthy(&self) -> Result<bool> {
        Ok(self.store.lock().integrity_check()?)
    }
}
