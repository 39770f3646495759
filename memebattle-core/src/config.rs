//! Configuration for the meme battle service.
//!
//! Maps directly to `memebattle.toml`. Every section and field has a default,
//! so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemeBattleConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Battle creation rules.
    #[serde(default)]
    pub battle: BattleConfig,
    /// Chatroom limits.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Hashtag metrics API.
    #[serde(default)]
    pub hashtag: HashtagConfig,
    /// Wallet RPC and contract.
    #[serde(default)]
    pub contract: ContractConfig,
    /// Attestation service.
    #[serde(default)]
    pub attestation: AttestationConfig,
    /// LLM integration settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,
}

impl MemeBattleConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MemeBattleError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::MemeBattleError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Overlay secrets and endpoints from environment variables.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RAPIDAPI_KEY") {
            self.hashtag.api_key = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = lookup("WALLET_RPC_URL") {
            self.contract.rpc_url = v;
        }
        if let Some(v) = lookup("CONTRACT_ADDRESS") {
            self.contract.contract_address = v;
        }
        if let Some(v) = lookup("OPERATOR_ADDRESS") {
            self.contract.operator_address = v;
        }
        if let Some(v) = lookup("DATABASE_PATH") {
            self.persistence.path = v;
        }
        if let Some(v) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
    /// Replace every external service with in-process stand-ins.
    #[serde(default)]
    pub offline: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            offline: false,
        }
    }
}

/// Battle creation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Duration used when the form leaves it out (seconds).
    #[serde(default = "default_600")]
    pub default_duration_secs: u64,
    /// Shortest allowed battle (seconds).
    #[serde(default = "default_60")]
    pub min_duration_secs: u64,
    /// Longest allowed battle (seconds).
    #[serde(default = "default_1800")]
    pub max_duration_secs: u64,
    /// Stake attached to `createBattle`, in ether.
    #[serde(default = "default_min_stake")]
    pub creation_stake_ether: String,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 600,
            min_duration_secs: 60,
            max_duration_secs: 1800,
            creation_stake_ether: "0.00001".to_string(),
        }
    }
}

/// Chatroom limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Max characters per message after trimming.
    #[serde(default = "default_500")]
    pub max_message_chars: usize,
    /// Max messages per sender per window.
    #[serde(default = "default_10")]
    pub rate_limit_messages: u32,
    /// Rate limit window in seconds.
    #[serde(default = "default_60")]
    pub rate_limit_window_secs: u64,
    /// Capacity of the live broadcast channel.
    #[serde(default = "default_256")]
    pub live_channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 500,
            rate_limit_messages: 10,
            rate_limit_window_secs: 60,
            live_channel_capacity: 256,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file path. `:memory:` keeps everything in RAM.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Number of save backups to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
    /// Detect corruption of battle records via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: "memebattle.db".to_string(),
            wal_mode: true,
            backup_count: 3,
            checksum_enabled: true,
        }
    }
}

/// Hashtag metrics API (RapidAPI Instagram scraper by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagConfig {
    /// Base URL; the hashtag is appended as `/searchtag/{tag}`.
    #[serde(default = "default_hashtag_url")]
    pub base_url: String,
    /// Value of the `x-rapidapi-host` header.
    #[serde(default = "default_hashtag_host")]
    pub api_host: String,
    /// Value of the `x-rapidapi-key` header.
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            base_url: default_hashtag_url(),
            api_host: default_hashtag_host(),
            api_key: String::new(),
            request_timeout_ms: 5000,
        }
    }
}

/// Wallet RPC and contract settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// JSON-RPC endpoint of the wallet / node that signs transactions.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Deployed battle contract.
    #[serde(default)]
    pub contract_address: String,
    /// Account used for operator actions (create battle, declare winner).
    #[serde(default)]
    pub operator_address: String,
    /// Chain id expected by the wallet (Arbitrum Sepolia = 421614).
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// How often to poll for a transaction receipt (ms).
    #[serde(default = "default_1000")]
    pub receipt_poll_interval_ms: u64,
    /// Give up waiting for a receipt after this many polls.
    #[serde(default = "default_60_u32")]
    pub receipt_max_polls: u32,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: String::new(),
            operator_address: String::new(),
            chain_id: 421_614,
            receipt_poll_interval_ms: 1000,
            receipt_max_polls: 60,
        }
    }
}

/// Attestation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationConfig {
    /// Base URL of the attestation relayer.
    #[serde(default = "default_attestation_url")]
    pub base_url: String,
    /// Schema id for bet attestations.
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    /// Chain name the attestation is anchored on.
    #[serde(default = "default_attestation_chain")]
    pub chain: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_10000")]
    pub request_timeout_ms: u64,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            base_url: default_attestation_url(),
            schema_id: "0xe9".to_string(),
            chain: "arbitrumSepolia".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// LLM integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// API key for OpenAI-compatible providers.
    #[serde(default)]
    pub api_key: String,
    /// Model used for meme scoring.
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard timeout for any LLM call in milliseconds.
    #[serde(default = "default_10000")]
    pub request_timeout_ms: u64,
    /// Max retries before giving up.
    #[serde(default = "default_2")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: String::new(),
            model: "qwen2.5:1.5b".to_string(),
            request_timeout_ms: 10_000,
            max_retries: 2,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow cross-origin requests from any origin.
    #[serde(default = "default_true")]
    pub cors_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_any_origin: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_min_stake() -> String { "0.00001".to_string() }
fn default_db_path() -> String { "memebattle.db".to_string() }
fn default_hashtag_url() -> String { "https://instagram-scraper-20231.p.rapidapi.com".to_string() }
fn default_hashtag_host() -> String { "instagram-scraper-20231.p.rapidapi.com".to_string() }
fn default_rpc_url() -> String { "http://localhost:8545".to_string() }
fn default_attestation_url() -> String { "http://localhost:8787".to_string() }
fn default_schema_id() -> String { "0xe9".to_string() }
fn default_attestation_chain() -> String { "arbitrumSepolia".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "qwen2.5:1.5b".to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_chain_id() -> u64 { 421_614 }
fn default_2() -> u32 { 2 }
fn default_3() -> u32 { 3 }
fn default_10() -> u32 { 10 }
fn default_60() -> u64 { 60 }
fn default_60_u32() -> u32 { 60 }
fn default_256() -> usize { 256 }
fn default_500() -> usize { 500 }
fn default_600() -> u64 { 600 }
fn default_1000() -> u64 { 1000 }
fn default_1800() -> u64 { 1800 }
fn default_5000() -> u64 { 5000 }
fn default_10000() -> u64 { 10_000 }
