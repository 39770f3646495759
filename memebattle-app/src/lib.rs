//! # memebattle-app
//!
//! Application layer of the meme battle service. [`service::BattleService`]
//! runs every user-facing operation against the SQLite store and four
//! external collaborators, each behind a trait in [`bridge`]:
//!
//! | Collaborator        | Trait                         | Production adapter                         |
//! |---------------------|-------------------------------|--------------------------------------------|
//! | Hashtag popularity  | [`bridge::HashtagMetrics`]    | [`hashtag::RapidApiHashtagMetrics`]        |
//! | Battle contract     | [`bridge::ContractBridge`]    | [`contract::RpcContractBridge`]            |
//! | Bet attestations    | [`bridge::AttestationService`]| [`attestation::HttpAttestationService`]    |
//! | Meme scoring        | [`bridge::MemeScoring`]       | `memebattle_llm::MemeScorer`               |
//!
//! [`local`] holds in-process stand-ins used for offline runs and tests.

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod abi;
pub mod attestation;
pub mod bridge;
pub mod clock;
pub mod contract;
pub mod error;
pub mod events;
pub mod hashtag;
pub mod local;
pub mod service;

pub use bridge::{AttestationService, ContractBridge, HashtagMetrics, MemeScoring, TxHash};
pub use error::{AdapterError, ServiceError};
pub use events::{BattleEvent, EventBus};
pub use service::{Adapters, BattleService};
