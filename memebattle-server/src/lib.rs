//! # memebattle-server
//!
//! warp front end for [`memebattle_app::BattleService`]: JSON endpoints for
//! battles, chat, bets, scoring and profiles, plus a WebSocket per chatroom.
//! Every response uses the [`types::ApiResponse`] envelope.

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc, clippy::unused_async)]

pub mod errors;
pub mod routes;
pub mod types;

pub use routes::{app, routes};
