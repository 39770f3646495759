//! Battle events published to live subscribers.

use memebattle_core::types::{BattleId, ChatMessage, WalletAddress, Wei};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::bridge::TxHash;

/// Something that happened to a battle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    /// A battle was stored.
    BattleCreated {
        /// The new battle.
        battle_id: BattleId,
    },
    /// A chat message was posted.
    ChatPosted(ChatMessage),
    /// A bet was recorded.
    BetPlaced {
        /// Battle bet on.
        battle_id: BattleId,
        /// Meme backed.
        meme_index: usize,
        /// Bettor.
        user: WalletAddress,
        /// Stake.
        amount: Wei,
    },
    /// A winner was recorded.
    WinnerDeclared {
        /// Decided battle.
        battle_id: BattleId,
        /// Winning meme index.
        winning_meme: usize,
        /// Contract transaction.
        tx_hash: TxHash,
    },
}

impl BattleEvent {
    /// Battle the event concerns.
    #[must_use]
    pub fn battle_id(&self) -> BattleId {
        match self {
            Self::BattleCreated { battle_id }
            | Self::BetPlaced { battle_id, .. }
            | Self::WinnerDeclared { battle_id, .. } => *battle_id,
            Self::ChatPosted(m) => m.battle_id,
        }
    }

    /// Whether the event is a chat message in room `(battle, meme_index)`.
    #[must_use]
    pub fn is_chat_in(&self, battle: &BattleId, meme_index: usize) -> bool {
        matches!(self, Self::ChatPosted(m) if m.battle_id == *battle && m.meme_index == meme_index)
    }
}

/// Fan-out of [`BattleEvent`]s to any number of subscribers.
///
/// Publishing never blocks; a subscriber that falls more than the channel
/// capacity behind skips the missed events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BattleEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: BattleEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BattleEvent> {
        self.tx.subscribe()
    }
}
