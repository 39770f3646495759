//! Battle contract access over a wallet JSON-RPC endpoint.
//!
//! Transactions are submitted with `eth_sendTransaction`, so the node behind
//! `rpc_url` must hold the sending account (a dev node, a signer proxy or a
//! custodial wallet). Each call then polls `eth_getTransactionReceipt` until
//! the transaction is mined.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use memebattle_core::config::ContractConfig;
use memebattle_core::types::{BattleId, WalletAddress, Wei};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::abi::{self, Token};
use crate::bridge::{ContractBridge, TxHash};
use crate::error::AdapterError;

/// `createBattle(string battleId, string[] memeNames, uint256 duration)`
pub const CREATE_BATTLE: &str = "createBattle(string,string[],uint256)";
/// `declareWinner(string battleId, uint256 memeId)`
pub const DECLARE_WINNER: &str = "declareWinner(string,uint256)";
/// `placeBet(string battleId, uint256 memeId)`
pub const PLACE_BET: &str = "placeBet(string,uint256)";

/// [`ContractBridge`] speaking JSON-RPC to a wallet node.
#[derive(Debug)]
pub struct RpcContractBridge {
    http: Client,
    rpc_url: String,
    contract_address: String,
    operator: String,
    chain_id: u64,
    poll_interval: Duration,
    max_polls: u32,
    next_id: AtomicU64,
}

impl RpcContractBridge {
    /// Build from the `[contract]` config section.
    ///
    /// # Errors
    /// Returns [`AdapterError::NotConfigured`] when the contract or operator
    /// address is missing or malformed.
    pub fn from_config(config: &ContractConfig) -> Result<Self, AdapterError> {
        let contract = WalletAddress::parse(&config.contract_address)
            .map_err(|_| AdapterError::NotConfigured("contract.contract_address"))?;
        let operator = WalletAddress::parse(&config.operator_address)
            .map_err(|_| AdapterError::NotConfigured("contract.operator_address"))?;
        if config.rpc_url.trim().is_empty() {
            return Err(AdapterError::NotConfigured("contract.rpc_url"));
        }
        Ok(Self {
            http: Client::new(),
            rpc_url: config.rpc_url.clone(),
            contract_address: contract.to_string(),
            operator: operator.to_string(),
            chain_id: config.chain_id,
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            max_polls: config.receipt_max_polls,
            next_id: AtomicU64::new(1),
        })
    }

    /// One JSON-RPC round trip; returns the `result` member.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": id});
        let resp = self.http.post(&self.rpc_url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Http(format!("{method} returned HTTP {status}")));
        }
        let body: Value = resp.json().await?;
        rpc_result(body)
    }

    /// Submit a transaction to the contract and wait for a successful receipt.
    async fn transact(&self, from: &str, data: String, value: Wei) -> Result<TxHash, AdapterError> {
        let tx = json!({
            "from": from,
            "to": self.contract_address,
            "data": data,
            "value": abi::quantity_hex(value.0),
            "chainId": abi::quantity_hex(u128::from(self.chain_id)),
        });
        let hash = self.rpc("eth_sendTransaction", json!([tx])).await?;
        let hash = hash
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Decode(format!("eth_sendTransaction result: {hash}")))?;
        debug!(tx = %hash, "Transaction submitted");
        self.wait_for_receipt(TxHash(hash)).await
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxHash, AdapterError> {
        for _ in 0..self.max_polls {
            let receipt = self.rpc("eth_getTransactionReceipt", json!([hash.0])).await?;
            match receipt_status(&receipt) {
                ReceiptStatus::Pending => tokio::time::sleep(self.poll_interval).await,
                ReceiptStatus::Success => return Ok(hash),
                ReceiptStatus::Reverted => {
                    warn!(tx = %hash, "Transaction reverted");
                    return Err(AdapterError::Reverted(hash.0));
                }
            }
        }
        Err(AdapterError::Timeout(format!(
            "no receipt for {hash} after {} polls",
            self.max_polls
        )))
    }
}

#[async_trait]
impl ContractBridge for RpcContractBridge {
    async fn create_battle(
        &self,
        battle_id: &BattleId,
        meme_names: &[String],
        duration_secs: u64,
        stake: Wei,
    ) -> Result<TxHash, AdapterError> {
        let data = abi::encode_call_hex(
            CREATE_BATTLE,
            &[
                Token::String(battle_id.to_string()),
                Token::StringArray(meme_names.to_vec()),
                Token::Uint(u128::from(duration_secs)),
            ],
        );
        let tx = self.transact(&self.operator, data, stake).await?;
        info!(battle = %battle_id, tx = %tx, "createBattle mined");
        Ok(tx)
    }

    async fn declare_winner(&self, battle_id: &BattleId, meme_id: u64) -> Result<TxHash, AdapterError> {
        let data = abi::encode_call_hex(
            DECLARE_WINNER,
            &[Token::String(battle_id.to_string()), Token::Uint(u128::from(meme_id))],
        );
        let tx = self.transact(&self.operator, data, Wei::ZERO).await?;
        info!(battle = %battle_id, meme_id, tx = %tx, "declareWinner mined");
        Ok(tx)
    }

    async fn place_bet(
        &self,
        bettor: &WalletAddress,
        battle_id: &BattleId,
        meme_id: u64,
        amount: Wei,
    ) -> Result<TxHash, AdapterError> {
        let data = abi::encode_call_hex(
            PLACE_BET,
            &[Token::String(battle_id.to_string()), Token::Uint(u128::from(meme_id))],
        );
        let tx = self.transact(bettor.as_str(), data, amount).await?;
        info!(battle = %battle_id, meme_id, bettor = %bettor, tx = %tx, "placeBet mined");
        Ok(tx)
    }
}

/// Split a JSON-RPC response into its result or error.
///
/// # Errors
/// Returns [`AdapterError::Rpc`] for an error member and
/// [`AdapterError::Decode`] when neither member is present.
pub fn rpc_result(mut body: Value) -> Result<Value, AdapterError> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        return Err(AdapterError::Rpc {
            code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    if body.get("result").is_none() {
        return Err(AdapterError::Decode(format!("JSON-RPC body without result: {body}")));
    }
    Ok(body["result"].take())
}

/// Outcome encoded in a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Not mined yet (`null` receipt).
    Pending,
    /// `status == 0x1`.
    Success,
    /// `status == 0x0`.
    Reverted,
}

/// Read the status of an `eth_getTransactionReceipt` result.
#[must_use]
pub fn receipt_status(receipt: &Value) -> ReceiptStatus {
    if receipt.is_null() {
        return ReceiptStatus::Pending;
    }
    match receipt.get("status").and_then(Value::as_str).and_then(abi::parse_quantity) {
        Some(0) => ReceiptStatus::Reverted,
        // Pre-Byzantium receipts have no status; being mined is all we know.
        _ => ReceiptStatus::Success,
    }
}
