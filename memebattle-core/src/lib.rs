//! # Meme Battle Core Library
//!
//! Domain layer for meme battles: users back one of several competing memes,
//! chat in per-meme rooms, and a winner is declared from external hashtag
//! popularity once the battle clock runs out.
//!
//! - **Battles**: named contests over a set of [`Meme`]s with an end time
//! - **Countdown**: the clock that gates betting and winner declaration
//! - **Winner selection**: highest hashtag media count wins
//! - **Chat**: per-meme message rooms
//! - **Bets**: wei-denominated stakes backed by an attestation
//!
//! Everything that talks to the outside world (hashtag API, wallet RPC,
//! attestation service, LLM) lives in `memebattle-app` and `memebattle-llm`.
//! This crate is synchronous and I/O-free apart from the SQLite store.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod countdown;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod types;
pub mod validation;
pub mod winner;

pub use config::MemeBattleConfig;
pub use error::MemeBattleError;
pub use types::*;
