//! Runtime counters for the meme battle service.
//!
//! Lock-free `AtomicU64` counters, incremented on the request path and read
//! when the `/metrics` endpoint is scraped.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for service events.
#[derive(Debug, Default)]
pub struct BattleCounters {
    /// Battles written to the store.
    pub battles_created: AtomicU64,
    /// Bets recorded after a successful attestation.
    pub bets_placed: AtomicU64,
    /// Bets whose attestation failed.
    pub bets_failed: AtomicU64,
    /// Chat messages stored.
    pub chat_messages: AtomicU64,
    /// Winners recorded in the store.
    pub winners_declared: AtomicU64,
    /// Hashtag lookups that failed and counted as zero.
    pub metric_fetch_failures: AtomicU64,
    /// Contract calls that failed.
    pub contract_failures: AtomicU64,
    /// Meme score requests answered by the LLM.
    pub meme_scores: AtomicU64,
}

impl BattleCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            battles_created: AtomicU64::new(0),
            bets_placed: AtomicU64::new(0),
            bets_failed: AtomicU64::new(0),
            chat_messages: AtomicU64::new(0),
            winners_declared: AtomicU64::new(0),
            metric_fetch_failures: AtomicU64::new(0),
            contract_failures: AtomicU64::new(0),
            meme_scores: AtomicU64::new(0),
        }
    }

    /// Bump a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            battles_created: self.battles_created.load(Ordering::Relaxed),
            bets_placed: self.bets_placed.load(Ordering::Relaxed),
            bets_failed: self.bets_failed.load(Ordering::Relaxed),
            chat_messages: self.chat_messages.load(Ordering::Relaxed),
            winners_declared: self.winners_declared.load(Ordering::Relaxed),
            metric_fetch_failures: self.metric_fetch_failures.load(Ordering::Relaxed),
            contract_failures: self.contract_failures.load(Ordering::Relaxed),
            meme_scores: self.meme_scores.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BattleCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Battles written to the store.
    pub battles_created: u64,
    /// Bets recorded.
    pub bets_placed: u64,
    /// Bets whose attestation failed.
    pub bets_failed: u64,
    /// Chat messages stored.
    pub chat_messages: u64,
    /// Winners recorded.
    pub winners_declared: u64,
    /// Hashtag lookups that failed.
    pub metric_fetch_failures: u64,
    /// Contract calls that failed.
    pub contract_failures: u64,
    /// Meme scores produced.
    pub meme_scores: u64,
}
