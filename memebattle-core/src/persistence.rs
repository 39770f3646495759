//! SQLite persistence for battles, chat messages and bets.
//!
//! Battles are stored as JSON blobs so new fields never require a schema
//! migration; the winner index is duplicated into its own column so it can
//! be set with a conditional update.
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS battles (
//!     battle_id    TEXT PRIMARY KEY,
//!     data         BLOB NOT NULL,
//!     created_at   TEXT NOT NULL,
//!     winning_meme INTEGER,
//!     updated_at   TEXT NOT NULL,
//!     checksum     TEXT
//! );
//! ```
//!
//! Chat messages and bets are plain rows with an autoincrement `seq` column
//! that breaks timestamp ties in insertion order.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::error::{MemeBattleError, Result};
use crate::types::{Battle, BattleId, BetId, ChatMessage, Meme, MessageId, UserBet, WalletAddress, Wei};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS battles (
        battle_id    TEXT PRIMARY KEY,
        data         BLOB NOT NULL,
        created_at   TEXT NOT NULL,
        winning_meme INTEGER,
        updated_at   TEXT NOT NULL,
        checksum     TEXT
    );
    CREATE TABLE IF NOT EXISTS chat_messages (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL UNIQUE,
        battle_id  TEXT NOT NULL,
        meme_index INTEGER NOT NULL,
        content    TEXT NOT NULL,
        sender     TEXT NOT NULL,
        timestamp  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chat_room
        ON chat_messages (battle_id, meme_index, timestamp, seq);
    CREATE TABLE IF NOT EXISTS user_bets (
        seq            INTEGER PRIMARY KEY AUTOINCREMENT,
        bet_id         TEXT NOT NULL UNIQUE,
        user           TEXT NOT NULL,
        battle_id      TEXT NOT NULL,
        meme_index     INTEGER NOT NULL,
        amount_wei     TEXT NOT NULL,
        meme           BLOB NOT NULL,
        attestation_id TEXT NOT NULL,
        placed_at      TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_bets_user ON user_bets (user, placed_at);
    CREATE INDEX IF NOT EXISTS idx_bets_battle ON user_bets (battle_id);
";

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    let crc = crc32_compute(data);
    format!("{crc:08x}")
}

/// Basic CRC-32 (ISO 3309 / ITU-T V.42) computation.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// Timestamps are stored with a fixed precision so they sort lexically.
fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MemeBattleError::Serialization(format!("bad timestamp '{raw}': {e}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| MemeBattleError::Serialization(format!("bad id '{raw}': {e}")))
}

fn index_to_sql(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

fn index_from_sql(raw: i64) -> Result<usize> {
    usize::try_from(raw).map_err(|_| MemeBattleError::Serialization(format!("bad meme index {raw}")))
}

// ---------------------------------------------------------------------------
// BattleStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database holding all battle data.
///
/// # Usage
///
/// ```no_run
/// # use memebattle_core::persistence::BattleStore;
/// # use memebattle_core::config::PersistenceConfig;
/// # use memebattle_core::types::{Battle, Meme};
/// let store = BattleStore::open("battles.db", &PersistenceConfig::default())?;
/// let battle = Battle::new(
///     "Dog vs Cat",
///     "settle it",
///     vec![Meme::new("Doge", "https://i/doge.png", "doge")],
///     chrono::Utc::now(),
///     chrono::Duration::seconds(600),
/// );
/// store.insert_battle(&battle)?;
/// let loaded = store.load_battle(&battle.id)?;
/// # Ok::<(), memebattle_core::error::MemeBattleError>(())
/// ```
pub struct BattleStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for BattleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BattleStore {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Battle store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Open the database named by `config.path`, in memory for `:memory:`.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn from_config(config: &PersistenceConfig) -> Result<Self> {
        if config.path == ":memory:" {
            Self::open_in_memory(config)
        } else {
            Self::open(&config.path, config)
        }
    }

    // ------------------------------------------------------------------
    // Battles
    // ------------------------------------------------------------------

    /// Insert a new battle. Fails if the id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Serialization`] if JSON encoding fails, or
    /// [`MemeBattleError::Database`] on SQLite failures (including a
    /// duplicate id).
    pub fn insert_battle(&self, battle: &Battle) -> Result<()> {
        let start = Instant::now();
        let json = serde_json::to_vec(battle).map_err(|e| MemeBattleError::Serialization(e.to_string()))?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));

        self.conn.execute(
            "INSERT INTO battles (battle_id, data, created_at, winning_meme, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                battle.id.to_string(),
                json,
                ts(&battle.created_at),
                battle.winning_meme.map(index_to_sql),
                ts(&Utc::now()),
                checksum
            ],
        )?;

        debug!(
            battle = %battle.id,
            memes = battle.memes.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Inserted battle"
        );
        Ok(())
    }

    /// Load a battle by id. Returns `None` if no row exists.
    ///
    /// If checksums are enabled and the stored checksum doesn't match, a
    /// warning is logged but the data is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Serialization`] if JSON decoding fails, or
    /// [`MemeBattleError::Database`] on SQLite failures.
    pub fn load_battle(&self, id: &BattleId) -> Result<Option<Battle>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM battles WHERE battle_id = ?1")?;

        let result: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![id.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = result else {
            return Ok(None);
        };
        self.decode_battle(&data, stored_checksum.as_deref()).map(Some)
    }

    /// Load a battle or fail with [`MemeBattleError::BattleNotFound`].
    ///
    /// # Errors
    ///
    /// See [`Self::load_battle`].
    pub fn require_battle(&self, id: &BattleId) -> Result<Battle> {
        self.load_battle(id)?
            .ok_or_else(|| MemeBattleError::BattleNotFound(id.to_string()))
    }

    /// List every battle, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn list_battles(&self) -> Result<Vec<Battle>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM battles ORDER BY created_at DESC, battle_id")?;
        let rows = stmt.query_map([], |row| {
            let data: Vec<u8> = row.get(0)?;
            let checksum: Option<String> = row.get(1)?;
            Ok((data, checksum))
        })?;

        let mut battles = Vec::new();
        for row in rows {
            let (data, checksum) = row?;
            match self.decode_battle(&data, checksum.as_deref()) {
                Ok(b) => battles.push(b),
                Err(e) => warn!(error = %e, "Skipping undecodable battle row"),
            }
        }
        Ok(battles)
    }

    /// Record the winner of a battle, only if none is recorded yet.
    ///
    /// Returns the updated battle.
    ///
    /// # Errors
    ///
    /// - [`MemeBattleError::BattleNotFound`] for an unknown id
    /// - [`MemeBattleError::MemeIndexOutOfRange`] for a bad index
    /// - [`MemeBattleError::WinnerAlreadyDeclared`] if a winner exists
    pub fn set_winner(&self, id: &BattleId, winning_meme: usize) -> Result<Battle> {
        let mut battle = self.require_battle(id)?;
        battle.meme(winning_meme)?;
        if battle.winning_meme.is_some() {
            return Err(MemeBattleError::WinnerAlreadyDeclared(*id));
        }
        battle.winning_meme = Some(winning_meme);

        let json = serde_json::to_vec(&battle).map_err(|e| MemeBattleError::Serialization(e.to_string()))?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));

        let updated = self.conn.execute(
            "UPDATE battles
             SET data = ?2, winning_meme = ?3, updated_at = ?4, checksum = ?5
             WHERE battle_id = ?1 AND winning_meme IS NULL",
            params![
                id.to_string(),
                json,
                index_to_sql(winning_meme),
                ts(&Utc::now()),
                checksum
            ],
        )?;
        if updated == 0 {
            return Err(MemeBattleError::WinnerAlreadyDeclared(*id));
        }

        info!(battle = %id, winning_meme, "Winner recorded");
        Ok(battle)
    }

    /// Number of stored battles.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn battle_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM battles", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn decode_battle(&self, data: &[u8], stored_checksum: Option<&str>) -> Result<Battle> {
        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(data);
                if expected != actual {
                    warn!(
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch on battle record"
                    );
                }
            }
        }
        serde_json::from_slice(data).map_err(|e| MemeBattleError::Serialization(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Append a chat message.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn append_chat(&self, message: &ChatMessage) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chat_messages (message_id, battle_id, meme_index, content, sender, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.battle_id.to_string(),
                index_to_sql(message.meme_index),
                message.content,
                message.sender.as_str(),
                ts(&message.timestamp)
            ],
        )?;
        Ok(())
    }

    /// Messages of one meme's room, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures or
    /// [`MemeBattleError::Serialization`] for corrupt rows.
    pub fn list_chat(&self, battle_id: &BattleId, meme_index: usize) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT message_id, battle_id, meme_index, content, sender, timestamp
             FROM chat_messages
             WHERE battle_id = ?1 AND meme_index = ?2
             ORDER BY timestamp ASC, seq ASC",
        )?;
        let rows = stmt.query_map(params![battle_id.to_string(), index_to_sql(meme_index)], raw_chat_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?.decode()?);
        }
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Bets
    // ------------------------------------------------------------------

    /// Record a bet.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn add_bet(&self, bet: &UserBet) -> Result<()> {
        let meme = serde_json::to_vec(&bet.meme).map_err(|e| MemeBattleError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO user_bets
                (bet_id, user, battle_id, meme_index, amount_wei, meme, attestation_id, placed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                bet.id.to_string(),
                bet.user.as_str(),
                bet.battle_id.to_string(),
                index_to_sql(bet.meme_index),
                bet.amount.0.to_string(),
                meme,
                bet.attestation_id,
                ts(&bet.placed_at)
            ],
        )?;
        debug!(bet = %bet.id, user = %bet.user, battle = %bet.battle_id, "Stored bet");
        Ok(())
    }

    /// All bets by one account, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn bets_for_user(&self, user: &WalletAddress) -> Result<Vec<UserBet>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT bet_id, user, battle_id, meme_index, amount_wei, meme, attestation_id, placed_at
             FROM user_bets WHERE user = ?1
             ORDER BY placed_at DESC, seq DESC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], raw_bet_row)?;
        let mut bets = Vec::new();
        for row in rows {
            bets.push(row?.decode()?);
        }
        Ok(bets)
    }

    /// All bets on one battle, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn bets_for_battle(&self, battle_id: &BattleId) -> Result<Vec<UserBet>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT bet_id, user, battle_id, meme_index, amount_wei, meme, attestation_id, placed_at
             FROM user_bets WHERE battle_id = ?1
             ORDER BY placed_at ASC, seq ASC",
        )?;
        let rows = stmt.query_map(params![battle_id.to_string()], raw_bet_row)?;
        let mut bets = Vec::new();
        for row in rows {
            bets.push(row?.decode()?);
        }
        Ok(bets)
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Back up the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;

        // Step through 256 pages at a time, sleeping 50ms between steps.
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup next to the database file, keeping at most
    /// `config.backup_count` of them.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] or [`MemeBattleError::Io`].
    pub fn create_rotating_backup(&self) -> Result<()> {
        if self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }

        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }

        for i in (1..max).rev() {
            let src = self.backup_path(i);
            let dst = self.backup_path(i + 1);
            if src.exists() {
                std::fs::rename(&src, &dst)?;
            }
        }

        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        self.backup(self.backup_path(1))?;
        info!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    /// Path to a numbered backup file (e.g. `battles.db.bak.1`).
    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `PRAGMA integrity_check`; `Ok(true)` means the database is sound.
    ///
    /// # Errors
    ///
    /// Returns [`MemeBattleError::Database`] if the query itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

struct RawChat {
    id: String,
    battle_id: String,
    meme_index: i64,
    content: String,
    sender: String,
    timestamp: String,
}

fn raw_chat_row(row: &Row<'_>) -> rusqlite::Result<RawChat> {
    Ok(RawChat {
        id: row.get(0)?,
        battle_id: row.get(1)?,
        meme_index: row.get(2)?,
        content: row.get(3)?,
        sender: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

impl RawChat {
    fn decode(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: MessageId(parse_uuid(&self.id)?),
            battle_id: BattleId(parse_uuid(&self.battle_id)?),
            meme_index: index_from_sql(self.meme_index)?,
            content: self.content,
            sender: WalletAddress::parse(&self.sender)?,
            timestamp: parse_ts(&self.timestamp)?,
        })
    }
}

struct RawBet {
    id: String,
    user: String,
    battle_id: String,
    meme_index: i64,
    amount_wei: String,
    meme: Vec<u8>,
    attestation_id: String,
    placed_at: String,
}

fn raw_bet_row(row: &Row<'_>) -> rusqlite::Result<RawBet> {
    Ok(RawBet {
        id: row.get(0)?,
        user: row.get(1)?,
        battle_id: row.get(2)?,
        meme_index: row.get(3)?,
        amount_wei: row.get(4)?,
        meme: row.get(5)?,
        attestation_id: row.get(6)?,
        placed_at: row.get(7)?,
    })
}

impl RawBet {
    fn decode(self) -> Result<UserBet> {
        let meme: Meme =
            serde_json::from_slice(&self.meme).map_err(|e| MemeBattleError::Serialization(e.to_string()))?;
        Ok(UserBet {
            id: BetId(parse_uuid(&self.id)?),
            user: WalletAddress::parse(&self.user)?,
            battle_id: BattleId(parse_uuid(&self.battle_id)?),
            meme_index: index_from_sql(self.meme_index)?,
            amount: Wei::try_from(self.amount_wei)?,
            meme,
            attestation_id: self.attestation_id,
            placed_at: parse_ts(&self.placed_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_config() -> PersistenceConfig {
        PersistenceConfig {
            checksum_enabled: true,
            ..PersistenceConfig::default()
        }
    }

    fn sample_battle() -> Battle {
        Battle::new(
            "Doge vs Pepe",
            "The eternal rivalry",
            vec![
                Meme::new("Doge", "https://i/doge.png", "doge"),
                Meme::new("Pepe", "https://i/pepe.png", "pepe"),
            ],
            Utc::now(),
            Duration::seconds(600),
        )
    }

    fn addr(n: u8) -> WalletAddress {
        WalletAddress::parse(&format!("0x{}", format!("{n:02x}").repeat(20))).expect("addr")
    }

    fn chat(battle: &Battle, meme_index: usize, content: &str, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(),
            battle_id: battle.id,
            meme_index,
            content: content.to_string(),
            sender: addr(1),
            timestamp: at,
        }
    }

    fn bet(battle: &Battle, user: WalletAddress, at: DateTime<Utc>) -> UserBet {
        UserBet {
            id: BetId::new(),
            user,
            battle_id: battle.id,
            meme_index: 1,
            amount: Wei(5_000),
            meme: battle.memes[1].clone(),
            attestation_id: "0xatt".to_string(),
            placed_at: at,
        }
    }

    #[test]
    fn round_trip_battle() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");
        let loaded = store.load_battle(&battle.id).expect("load").expect("Some");
        assert_eq!(loaded.name, battle.name);
        assert_eq!(loaded.memes, battle.memes);
        assert_eq!(loaded.winning_meme, None);
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        assert!(store.load_battle(&BattleId::new()).expect("load").is_none());
        assert!(matches!(
            store.require_battle(&BattleId::new()),
            Err(MemeBattleError::BattleNotFound(_))
        ));
    }

    #[test]
    fn duplicate_insert_fails() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");
        assert!(matches!(store.insert_battle(&battle), Err(MemeBattleError::Database(_))));
    }

    #[test]
    fn list_is_newest_first() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let mut old = sample_battle();
        old.created_at -= Duration::hours(1);
        let new = sample_battle();
        store.insert_battle(&old).expect("insert");
        store.insert_battle(&new).expect("insert");

        let listed = store.list_battles().expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, new.id);
        assert_eq!(store.battle_count().expect("count"), 2);
    }

    #[test]
    fn winner_is_set_once() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");

        let updated = store.set_winner(&battle.id, 1).expect("set");
        assert_eq!(updated.winning_meme, Some(1));
        assert_eq!(
            store.load_battle(&battle.id).expect("load").expect("Some").winning_meme,
            Some(1)
        );
        assert!(matches!(
            store.set_winner(&battle.id, 0),
            Err(MemeBattleError::WinnerAlreadyDeclared(_))
        ));
    }

    #[test]
    fn winner_index_must_exist() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");
        assert!(matches!(
            store.set_winner(&battle.id, 7),
            Err(MemeBattleError::MemeIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn chat_is_scoped_and_ordered() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");
        let t0 = Utc::now();

        store.append_chat(&chat(&battle, 0, "second", t0 + Duration::seconds(1))).expect("chat");
        store.append_chat(&chat(&battle, 0, "first", t0)).expect("chat");
        store.append_chat(&chat(&battle, 0, "tie-a", t0 + Duration::seconds(2))).expect("chat");
        store.append_chat(&chat(&battle, 0, "tie-b", t0 + Duration::seconds(2))).expect("chat");
        store.append_chat(&chat(&battle, 1, "other room", t0)).expect("chat");

        let room: Vec<String> = store
            .list_chat(&battle.id, 0)
            .expect("list")
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(room, vec!["first", "second", "tie-a", "tie-b"]);
        assert_eq!(store.list_chat(&battle.id, 1).expect("list").len(), 1);
        assert!(store.list_chat(&battle.id, 2).expect("list").is_empty());
    }

    #[test]
    fn bets_by_user_and_battle() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");
        let t0 = Utc::now();

        let first = bet(&battle, addr(1), t0);
        let second = bet(&battle, addr(1), t0 + Duration::seconds(5));
        store.add_bet(&first).expect("bet");
        store.add_bet(&second).expect("bet");
        store.add_bet(&bet(&battle, addr(2), t0)).expect("bet");

        let mine = store.bets_for_user(&addr(1)).expect("mine");
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id, "newest first");
        assert_eq!(mine[0].amount, Wei(5_000));
        assert_eq!(mine[0].meme.name, "Pepe");

        assert_eq!(store.bets_for_battle(&battle.id).expect("battle").len(), 3);
    }

    #[test]
    fn checksum_mismatch_still_loads() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");
        store
            .conn
            .execute(
                "UPDATE battles SET checksum = 'deadbeef' WHERE battle_id = ?1",
                params![battle.id.to_string()],
            )
            .expect("corrupt checksum");
        assert!(store.load_battle(&battle.id).expect("load").is_some());
    }

    #[test]
    fn integrity_check_passes() {
        let store = BattleStore::open_in_memory(&test_config()).expect("open");
        assert!(store.integrity_check().expect("check"));
    }

    #[test]
    fn file_based_open_and_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("battles.db");
        let config = test_config();

        let store = BattleStore::open(&db_path, &config).expect("open");
        let battle = sample_battle();
        store.insert_battle(&battle).expect("insert");

        let backup_path = dir.path().join("battles_backup.db");
        store.backup(&backup_path).expect("backup");

        let restored = BattleStore::open(&backup_path, &config).expect("open backup");
        assert!(restored.load_battle(&battle.id).expect("load").is_some());
    }

    #[test]
    fn rotating_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("battles.db");
        let mut config = test_config();
        config.backup_count = 2;

        let store = BattleStore::open(&db_path, &config).expect("open");
        store.insert_battle(&sample_battle()).expect("insert");

        store.create_rotating_backup().expect("backup 1");
        store.create_rotating_backup().expect("backup 2");
        store.create_rotating_backup().expect("backup 3");

        assert!(dir.path().join("battles.db.bak.1").exists());
        assert!(dir.path().join("battles.db.bak.2").exists());
        assert!(!dir.path().join("battles.db.bak.3").exists());
    }

    #[test]
    fn crc32_basic() {
        // Known test vector: CRC-32 of "123456789" = 0xCBF43926
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }
}
