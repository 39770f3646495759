//! Minimal Solidity ABI encoding for the battle contract's calls.
//!
//! Only the argument types the contract uses are supported: `uint256`,
//! `string` and `string[]`.

use sha3::{Digest, Keccak256};

/// Size of one ABI word.
const WORD: usize = 32;

/// A single call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `uint256` (values beyond `u128` are never needed).
    Uint(u128),
    /// `string`
    String(String),
    /// `string[]`
    StringArray(Vec<String>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Uint(_))
    }
}

/// Keccak-256 of `input`.
#[must_use]
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// Four-byte function selector for a canonical signature such as
/// `declareWinner(string,uint256)`.
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by the encoded arguments.
#[must_use]
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend_from_slice(&encode_tokens(args));
    out
}

/// Calldata as a `0x`-prefixed hex string.
#[must_use]
pub fn encode_call_hex(signature: &str, args: &[Token]) -> String {
    format!("0x{}", hex::encode(encode_call(signature, args)))
}

/// Head/tail encoding of a tuple of tokens.
fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let head_len = WORD * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            tail.extend_from_slice(&encode_dynamic(token));
        } else if let Token::Uint(v) = token {
            head.extend_from_slice(&uint_word(*v));
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn encode_dynamic(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(v) => uint_word(*v).to_vec(),
        Token::String(s) => encode_bytes(s.as_bytes()),
        Token::StringArray(items) => {
            let mut out = uint_word(items.len() as u128).to_vec();
            let inner: Vec<Token> = items.iter().cloned().map(Token::String).collect();
            out.extend_from_slice(&encode_tokens(&inner));
            out
        }
    }
}

/// Length word followed by the bytes right-padded to a word boundary.
fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&uint_word(bytes.len() as u128));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&v.to_be_bytes());
    word
}

/// `0x`-prefixed minimal hex quantity, as JSON-RPC expects for `value`.
#[must_use]
pub fn quantity_hex(v: u128) -> String {
    format!("{v:#x}")
}

/// Parse a JSON-RPC hex quantity.
#[must_use]
pub fn parse_quantity(raw: &str) -> Option<u128> {
    let digits = raw.strip_prefix("0x")?;
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}
