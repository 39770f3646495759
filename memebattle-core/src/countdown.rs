//! Battle clock and the state transitions it drives.
//!
//! A battle is `Open` until its end time passes, then waits for a winner,
//! then is `Decided`. Betting is only accepted while open; winner
//! declaration only while awaiting.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Battle;

/// Time remaining on a battle clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimeLeft {
    /// Clock still running.
    Running {
        /// Whole hours (unbounded).
        hours: i64,
        /// Minutes within the hour.
        minutes: i64,
        /// Seconds within the minute.
        seconds: i64,
    },
    /// End time has passed.
    Ended,
}

impl TimeLeft {
    /// Whether the clock has run out.
    #[must_use]
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running {
                hours,
                minutes,
                seconds,
            } => write!(f, "{hours}h {minutes}m {seconds}s"),
            Self::Ended => f.write_str("Battle Ended"),
        }
    }
}

const MS_PER_HOUR: i64 = 1000 * 60 * 60;
const MS_PER_MINUTE: i64 = 1000 * 60;

/// Compute the time left until `end_time`.
///
/// A distance of exactly zero still counts as running.
#[must_use]
pub fn time_left(end_time: DateTime<Utc>, now: DateTime<Utc>) -> TimeLeft {
    let distance_ms = (end_time - now).num_milliseconds();
    if distance_ms < 0 {
        return TimeLeft::Ended;
    }
    TimeLeft::Running {
        hours: distance_ms / MS_PER_HOUR,
        minutes: (distance_ms % MS_PER_HOUR) / MS_PER_MINUTE,
        seconds: (distance_ms % MS_PER_MINUTE) / 1000,
    }
}

/// Lifecycle phase of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    /// Clock running; bets accepted.
    Open,
    /// Clock ended; winner not yet declared.
    AwaitingWinner,
    /// Winner recorded.
    Decided,
}

impl BattlePhase {
    /// Derive the phase of `battle` at `now`.
    #[must_use]
    pub fn of(battle: &Battle, now: DateTime<Utc>) -> Self {
        if battle.winning_meme.is_some() {
            Self::Decided
        } else if time_left(battle.end_time, now).is_ended() {
            Self::AwaitingWinner
        } else {
            Self::Open
        }
    }

    /// Whether bets may be placed.
    #[must_use]
    pub fn accepts_bets(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether the declare-winner action is available.
    #[must_use]
    pub fn can_declare_winner(self) -> bool {
        matches!(self, Self::AwaitingWinner)
    }

    /// Status string reported by the battle-status query.
    #[must_use]
    pub fn status_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::AwaitingWinner => "ended",
            Self::Decided => "decided",
        }
    }
}

impl fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_str())
    }
}
