//! Bet attestations through an HTTP relayer.
//!
//! The relayer wraps the attestation protocol's SDK: it receives the schema
//! id, the bet payload and the resolver fee, creates the attestation on
//! chain, and answers with the attestation id.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memebattle_core::config::AttestationConfig;
use memebattle_core::types::{BattleId, WalletAddress, Wei};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::AttestationService;
use crate::error::AdapterError;

/// Action tag carried by every bet attestation.
pub const USER_BET_ACTION: &str = "USER_BET";

/// Attested fields of a bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetAttestationData {
    /// Betting account.
    pub user: WalletAddress,
    /// Battle document id.
    #[serde(rename = "battleId")]
    pub battle_id: String,
    /// 1-based meme id as the contract numbers memes.
    pub meme_id: u64,
    /// Stake in wei.
    pub bet_amount: Wei,
    /// Unix seconds.
    pub bet_timestamp: i64,
    /// Always zero when the bet is placed.
    pub win_amount: Wei,
    /// Always [`USER_BET_ACTION`].
    pub action: String,
}

/// A complete attestation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetAttestation {
    /// Schema the data conforms to.
    pub schema_id: String,
    /// Chain the attestation is anchored on.
    pub chain: String,
    /// The bet itself.
    pub data: BetAttestationData,
    /// Lookup key: the lowercased bettor address.
    pub indexing_value: String,
    /// Fee paid to the schema resolver; the bet stake.
    pub resolver_fees_wei: Wei,
}

impl BetAttestation {
    /// Build the attestation for a bet of `amount` on meme `meme_index`.
    #[must_use]
    pub fn for_bet(
        config: &AttestationConfig,
        user: &WalletAddress,
        battle_id: &BattleId,
        meme_index: usize,
        amount: Wei,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_id: config.schema_id.clone(),
            chain: config.chain.clone(),
            data: BetAttestationData {
                user: user.clone(),
                battle_id: battle_id.to_string(),
                meme_id: meme_index as u64 + 1,
                bet_amount: amount,
                bet_timestamp: at.timestamp(),
                win_amount: Wei::ZERO,
                action: USER_BET_ACTION.to_string(),
            },
            indexing_value: user.as_str().to_ascii_lowercase(),
            resolver_fees_wei: amount,
        }
    }
}

/// What the relayer returns for a created attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReceipt {
    /// Attestation id assigned by the protocol.
    pub attestation_id: String,
    /// Transaction that created it, when the relayer reports one.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// [`AttestationService`] posting to `{base_url}/attestations`.
#[derive(Debug, Clone)]
pub struct HttpAttestationService {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAttestationService {
    /// Build from the `[attestation]` config section.
    ///
    /// # Errors
    /// Returns [`AdapterError::NotConfigured`] when the base URL is empty.
    pub fn from_config(config: &AttestationConfig) -> Result<Self, AdapterError> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(AdapterError::NotConfigured("attestation.base_url"));
        }
        Ok(Self {
            http: Client::new(),
            endpoint: format!("{base}/attestations"),
            timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }
}

#[async_trait]
impl AttestationService for HttpAttestationService {
    async fn attest_bet(&self, attestation: &BetAttestation) -> Result<AttestationReceipt, AdapterError> {
        debug!(
            schema = %attestation.schema_id,
            battle = %attestation.data.battle_id,
            meme_id = attestation.data.meme_id,
            "Requesting bet attestation"
        );
        let resp = self
            .http
            .post(&self.endpoint)
            .json(attestation)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Http(format!("attestation relayer returned HTTP {status}: {body}")));
        }
        let receipt: AttestationReceipt = resp.json().await?;
        if receipt.attestation_id.trim().is_empty() {
            return Err(AdapterError::Decode("empty attestation id".into()));
        }
        info!(attestation = %receipt.attestation_id, user = %attestation.data.user, "Bet attested");
        Ok(receipt)
    }
}
