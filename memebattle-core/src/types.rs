//! Core type definitions for meme battles.
//!
//! All types are serializable; they are stored as JSON in SQLite and sent
//! as-is over the HTTP API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemeBattleError;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Document id of a battle. The same string keys the battle on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleId(pub Uuid);

impl BattleId {
    /// Create a new random battle ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BattleId {
    type Err = MemeBattleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| MemeBattleError::BattleNotFound(s.to_string()))
    }
}

/// Unique identifier for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Create a new random message ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a stored bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BetId(pub Uuid);

impl BetId {
    /// Create a new random bet ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// An EVM account address, always lowercase `0x` + 40 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalise an address.
    ///
    /// # Errors
    /// Returns [`MemeBattleError::InvalidAddress`] unless the input is `0x`
    /// followed by exactly 40 hex digits (any case).
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let trimmed = raw.trim();
        let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Err(MemeBattleError::InvalidAddress(raw.to_string()));
        };
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MemeBattleError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// The normalised address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = MemeBattleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Number of wei in one ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// An amount of wei. Serialised as a decimal string so JSON consumers never
/// lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Wei(pub u128);

impl Wei {
    /// Zero wei.
    pub const ZERO: Self = Self(0);

    /// Parse a decimal ether amount (`"0.00001"`, `"2"`, `".5"`) into wei.
    ///
    /// An empty string parses as zero. At most 18 fractional digits are
    /// accepted.
    ///
    /// # Errors
    /// Returns [`MemeBattleError::InvalidAmount`] on malformed input or
    /// overflow.
    pub fn parse_ether(raw: &str) -> crate::error::Result<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Ok(Self::ZERO);
        }
        let invalid = || MemeBattleError::InvalidAmount(raw.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 18 {
            return Err(invalid());
        }

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(WEI_PER_ETHER))
                .ok_or_else(invalid)?
        };
        let frac_wei = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<18}");
            padded.parse::<u128>().map_err(|_| invalid())?
        };

        whole_wei.checked_add(frac_wei).map(Self).ok_or_else(invalid)
    }

    /// Render as a decimal ether string with trailing zeros trimmed.
    #[must_use]
    pub fn format_ether(self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{frac:018}");
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Wei {
    type Error = MemeBattleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse::<u128>()
            .map(Self)
            .map_err(|_| MemeBattleError::InvalidAmount(value))
    }
}

impl From<Wei> for String {
    fn from(value: Wei) -> Self {
        value.0.to_string()
    }
}

// ---------------------------------------------------------------------------
// Battles
// ---------------------------------------------------------------------------

/// One competitor in a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meme {
    /// Display name.
    pub name: String,
    /// Image URL.
    pub image: String,
    /// Social-media hashtag used for popularity scoring, without the `#`.
    pub hashtag: String,
}

impl Meme {
    /// Create a meme, stripping a leading `#` from the hashtag.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<String>, hashtag: impl Into<String>) -> Self {
        let hashtag: String = hashtag.into();
        Self {
            name: name.into(),
            image: image.into(),
            hashtag: hashtag.trim().trim_start_matches('#').to_string(),
        }
    }
}

/// A named contest between several memes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    /// Document id.
    pub id: BattleId,
    /// Battle title.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Competitors, addressed by index everywhere else.
    pub memes: Vec<Meme>,
    /// When the battle was created.
    pub created_at: DateTime<Utc>,
    /// When betting closes and the winner may be declared.
    pub end_time: DateTime<Utc>,
    /// Index into `memes` once a winner has been declared.
    #[serde(default)]
    pub winning_meme: Option<usize>,
    /// Account that created the battle, if known.
    #[serde(default)]
    pub creator: Option<WalletAddress>,
}

impl Battle {
    /// Create a battle that runs for `duration` from `created_at`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        memes: Vec<Meme>,
        created_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: BattleId::new(),
            name: name.into(),
            description: description.into(),
            memes,
            created_at,
            end_time: created_at + duration,
            winning_meme: None,
            creator: None,
        }
    }

    /// Look up a meme by index.
    ///
    /// # Errors
    /// Returns [`MemeBattleError::MemeIndexOutOfRange`] for a bad index.
    pub fn meme(&self, index: usize) -> crate::error::Result<&Meme> {
        self.memes.get(index).ok_or(MemeBattleError::MemeIndexOutOfRange {
            battle: self.id,
            index,
            len: self.memes.len(),
        })
    }

    /// The declared winner, if any.
    #[must_use]
    pub fn winner(&self) -> Option<&Meme> {
        self.winning_meme.and_then(|i| self.memes.get(i))
    }

    /// Battle length in whole seconds, as sent to the contract.
    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        u64::try_from((self.end_time - self.created_at).num_seconds()).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A message posted in a meme's chatroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id.
    pub id: MessageId,
    /// Battle the room belongs to.
    pub battle_id: BattleId,
    /// Meme the room belongs to.
    pub meme_index: usize,
    /// Trimmed message text.
    pub content: String,
    /// Posting account.
    pub sender: WalletAddress,
    /// Server-side timestamp.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// A bet as recorded after its attestation succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBet {
    /// Bet id.
    pub id: BetId,
    /// Betting account.
    pub user: WalletAddress,
    /// Battle bet on.
    pub battle_id: BattleId,
    /// Meme backed.
    pub meme_index: usize,
    /// Stake in wei.
    pub amount: Wei,
    /// Snapshot of the meme at bet time.
    pub meme: Meme,
    /// Attestation record backing the bet.
    pub attestation_id: String,
    /// When the bet was placed.
    pub placed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Popularity metrics
// ---------------------------------------------------------------------------

/// Hashtag media count for one meme, as fetched at declaration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeMetric {
    /// Index of the meme in its battle.
    pub meme_index: usize,
    /// Hashtag that was queried (empty when the meme had none).
    pub hashtag: String,
    /// Number of posts carrying the hashtag; 0 on any fetch failure.
    pub media_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_normalised() {
        let a = WalletAddress::parse("0xABCDEFabcdef0123456789abcdef0123456789AB").expect("valid");
        assert_eq!(a.as_str(), "0xabcdefabcdef0123456789abcdef0123456789ab");
    }

    #[test]
    fn address_rejects_garbage() {
        assert!(WalletAddress::parse("abc").is_err());
        assert!(WalletAddress::parse("0x1234").is_err());
        assert!(WalletAddress::parse("0xZZCDEFabcdef0123456789abcdef0123456789AB").is_err());
    }

    #[test]
    fn parse_ether_known_values() {
        assert_eq!(Wei::parse_ether("1").expect("ok"), Wei(WEI_PER_ETHER));
        assert_eq!(Wei::parse_ether("0.00001").expect("ok"), Wei(10_000_000_000_000));
        assert_eq!(Wei::parse_ether(".5").expect("ok"), Wei(WEI_PER_ETHER / 2));
        assert_eq!(Wei::parse_ether("").expect("ok"), Wei::ZERO);
        assert!(Wei::parse_ether("1.2.3").is_err());
        assert!(Wei::parse_ether("-1").is_err());
        assert!(Wei::parse_ether("0.0000000000000000001").is_err());
        assert!(Wei::parse_ether(".").is_err());
    }

    #[test]
    fn format_ether_trims() {
        assert_eq!(Wei(WEI_PER_ETHER).format_ether(), "1");
        assert_eq!(Wei(10_000_000_000_000).format_ether(), "0.00001");
        assert_eq!(Wei(1_500_000_000_000_000_000).format_ether(), "1.5");
    }

    #[test]
    fn wei_serialises_as_string() {
        let json = serde_json::to_string(&Wei(42)).expect("ser");
        assert_eq!(json, "\"42\"");
        let back: Wei = serde_json::from_str(&json).expect("de");
        assert_eq!(back, Wei(42));
    }

    #[test]
    fn meme_strips_hash() {
        let m = Meme::new("Doge", "https://img/doge.png", "#dogecoin");
        assert_eq!(m.hashtag, "dogecoin");
    }

    #[test]
    fn battle_meme_lookup() {
        let b = Battle::new(
            "b",
            "d",
            vec![Meme::new("a", "i", "x")],
            Utc::now(),
            Duration::seconds(600),
        );
        assert!(b.meme(0).is_ok());
        assert!(matches!(
            b.meme(3),
            Err(MemeBattleError::MemeIndexOutOfRange { index: 3, len: 1, .. })
        ));
        assert_eq!(b.duration_secs(), 600);
    }
}
