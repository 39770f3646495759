//! HTTP and WebSocket routes.
//!
//! | Method | Path                                         | Operation                  |
//! |--------|----------------------------------------------|----------------------------|
//! | GET    | `/battles`                                   | list battles               |
//! | POST   | `/battles`                                   | create battle              |
//! | GET    | `/battles/{id}`                              | battle detail + countdown  |
//! | GET    | `/battles/{id}/status`                       | `open` / `ended` / `decided` |
//! | POST   | `/battles/{id}/declare-winner`               | declare winner             |
//! | GET    | `/battles/{id}/bets`                         | bets on a battle           |
//! | GET    | `/battles/{id}/memes/{idx}`                  | meme detail                |
//! | GET    | `/battles/{id}/memes/{idx}/chat`             | chat history               |
//! | POST   | `/battles/{id}/memes/{idx}/chat`             | post chat message          |
//! | WS     | `/battles/{id}/memes/{idx}/chat/live`        | live chat                  |
//! | POST   | `/battles/{id}/memes/{idx}/bets`             | bet through an attestation |
//! | POST   | `/battles/{id}/memes/{idx}/bets/contract`    | bet through `placeBet`     |
//! | POST   | `/battles/{id}/memes/{idx}/score`            | LLM meme score             |
//! | GET    | `/profile/{address}/bets`                    | a wallet's bets            |
//! | GET    | `/health`, `/metrics`                        | liveness, counters         |
//!
//! The caller's wallet comes from the optional `x-address` header.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use memebattle_app::{BattleEvent, BattleService};
use memebattle_core::config::ServerConfig;
use memebattle_core::validation::BattleDraft;
use memebattle_core::{BattleId, ChatMessage, MessageId, WalletAddress};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

use crate::errors::{handle_rejection, reply, ServerError};
use crate::types::{HealthResponse, PlaceBetRequest, PostChatRequest};

type Response = warp::reply::Response;

const MAX_BODY_BYTES: u64 = 64 * 1024;

pub fn with_service(service: Arc<BattleService>) -> impl Filter<Extract = (Arc<BattleService>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&service))
}

/// The caller's wallet from `x-address`; absent or blank means not connected.
pub fn wallet() -> impl Filter<Extract = (Option<WalletAddress>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-address").and_then(parse_wallet)
}

async fn parse_wallet(raw: Option<String>) -> Result<Option<WalletAddress>, Rejection> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => WalletAddress::parse(value)
            .map(Some)
            .map_err(|_| warp::reject::custom(ServerError::InvalidWallet(value.to_string()))),
    }
}

fn json_body<T: serde::de::DeserializeOwned + Send + 'static>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_battles(service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.list_battles(), StatusCode::OK))
}

async fn create_battle(
    creator: Option<WalletAddress>,
    draft: BattleDraft,
    service: Arc<BattleService>,
) -> Result<Response, Rejection> {
    Ok(reply(service.create_battle(creator, &draft).await, StatusCode::CREATED))
}

async fn battle_detail(id: BattleId, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.battle_detail(&id), StatusCode::OK))
}

async fn battle_status(id: BattleId, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.battle_status(&id), StatusCode::OK))
}

async fn declare_winner(id: BattleId, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.declare_winner(&id).await, StatusCode::OK))
}

async fn battle_bets(id: BattleId, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.battle_bets(&id), StatusCode::OK))
}

async fn meme_detail(id: BattleId, meme_index: usize, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.meme_detail(&id, meme_index), StatusCode::OK))
}

async fn list_chat(id: BattleId, meme_index: usize, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.list_chat(&id, meme_index), StatusCode::OK))
}

async fn post_chat(
    id: BattleId,
    meme_index: usize,
    sender: Option<WalletAddress>,
    body: PostChatRequest,
    service: Arc<BattleService>,
) -> Result<Response, Rejection> {
    Ok(reply(
        service.post_chat(sender, &id, meme_index, &body.content),
        StatusCode::CREATED,
    ))
}

async fn place_bet(
    id: BattleId,
    meme_index: usize,
    user: Option<WalletAddress>,
    body: PlaceBetRequest,
    service: Arc<BattleService>,
) -> Result<Response, Rejection> {
    Ok(reply(
        service.place_bet(user, &id, meme_index, &body.amount).await,
        StatusCode::CREATED,
    ))
}

async fn place_bet_on_contract(
    id: BattleId,
    meme_index: usize,
    user: Option<WalletAddress>,
    body: PlaceBetRequest,
    service: Arc<BattleService>,
) -> Result<Response, Rejection> {
    Ok(reply(
        service.place_bet_on_contract(user, &id, meme_index, &body.amount).await,
        StatusCode::CREATED,
    ))
}

async fn score_meme(id: BattleId, meme_index: usize, service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(service.score_meme(&id, meme_index).await, StatusCode::OK))
}

async fn user_bets(address: String, service: Arc<BattleService>) -> Result<Response, Rejection> {
    let user = WalletAddress::parse(&address).map_err(|_| warp::reject::custom(ServerError::InvalidAddress(address)))?;
    Ok(reply(service.user_bets(&user), StatusCode::OK))
}

async fn health(service: Arc<BattleService>) -> Result<Response, Rejection> {
    let offline = service.config().general.offline;
    let result = service.healthy().map(|ok| HealthResponse {
        status: if ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        offline,
    });
    let code = match &result {
        Ok(h) if h.status == "degraded" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    Ok(reply(result, code))
}

async fn metrics(service: Arc<BattleService>) -> Result<Response, Rejection> {
    Ok(reply(Ok(service.metrics()), StatusCode::OK))
}

async fn chat_live(
    id: BattleId,
    meme_index: usize,
    ws: Ws,
    service: Arc<BattleService>,
) -> Result<Response, Rejection> {
    let events = service.subscribe();
    let cursor = match service.chat_since(&id, meme_index, None) {
        Ok(history) => history.last().map(|m| m.id),
        Err(e) => return Ok(reply::<()>(Err(e), StatusCode::OK)),
    };
    let room = Room {
        battle: id,
        meme_index,
        cursor,
    };
    Ok(ws
        .on_upgrade(move |socket| stream_chat(socket, service, events, room))
        .into_response())
}

/// A watched chatroom and the last message the subscriber has seen.
struct Room {
    battle: BattleId,
    meme_index: usize,
    cursor: Option<MessageId>,
}

/// Forward new messages of one chatroom to a socket until either side goes
/// away. A subscriber that falls behind the event bus is caught up from the
/// store.
async fn stream_chat(socket: WebSocket, service: Arc<BattleService>, mut events: Receiver<BattleEvent>, mut room: Room) {
    let (mut tx, mut rx) = socket.split();
    let (battle, meme_index) = (room.battle, room.meme_index);
    // Sent during catch-up; the bus may still replay them.
    let mut caught_up: HashSet<MessageId> = HashSet::new();
    debug!(%battle, meme_index, "Live chat subscriber connected");

    loop {
        tokio::select! {
            incoming = rx.next() => match incoming {
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%battle, meme_index, error = %e, "Live chat socket error");
                    break;
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if !event.is_chat_in(&battle, meme_index) {
                        continue;
                    }
                    let BattleEvent::ChatPosted(message) = event else {
                        continue;
                    };
                    if caught_up.remove(&message.id) {
                        continue;
                    }
                    if !send_chat(&mut tx, &message).await {
                        break;
                    }
                    room.cursor = Some(message.id);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%battle, meme_index, skipped, "Live chat subscriber lagged; catching up from the store");
                    let missed = match service.chat_since(&battle, meme_index, room.cursor.as_ref()) {
                        Ok(missed) => missed,
                        Err(e) => {
                            warn!(%battle, meme_index, error = %e, "Live chat catch-up failed");
                            break;
                        }
                    };
                    let mut open = true;
                    for message in missed {
                        if !send_chat(&mut tx, &message).await {
                            open = false;
                            break;
                        }
                        room.cursor = Some(message.id);
                        caught_up.insert(message.id);
                    }
                    if !open {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(%battle, meme_index, "Live chat subscriber disconnected");
}

/// Send one message as JSON; false once the socket is gone.
async fn send_chat(tx: &mut SplitSink<WebSocket, Message>, message: &ChatMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => tx.send(Message::text(json)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Could not encode chat message");
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Every route, without rejection handling or CORS.
pub fn routes(service: Arc<BattleService>) -> BoxedFilter<(impl Reply,)> {
    let s = || with_service(Arc::clone(&service));

    let list = warp::path!("battles").and(warp::get()).and(s()).and_then(list_battles).boxed();
    let create = warp::path!("battles")
        .and(warp::post())
        .and(wallet())
        .and(json_body::<BattleDraft>())
        .and(s())
        .and_then(create_battle)
        .boxed();
    let detail = warp::path!("battles" / BattleId)
        .and(warp::get())
        .and(s())
        .and_then(battle_detail)
        .boxed();
    let status = warp::path!("battles" / BattleId / "status")
        .and(warp::get())
        .and(s())
        .and_then(battle_status)
        .boxed();
    let declare = warp::path!("battles" / BattleId / "declare-winner")
        .and(warp::post())
        .and(s())
        .and_then(declare_winner)
        .boxed();
    let bets = warp::path!("battles" / BattleId / "bets")
        .and(warp::get())
        .and(s())
        .and_then(battle_bets)
        .boxed();

    let meme = warp::path!("battles" / BattleId / "memes" / usize)
        .and(warp::get())
        .and(s())
        .and_then(meme_detail)
        .boxed();
    let chat_list = warp::path!("battles" / BattleId / "memes" / usize / "chat")
        .and(warp::get())
        .and(s())
        .and_then(list_chat)
        .boxed();
    let chat_post = warp::path!("battles" / BattleId / "memes" / usize / "chat")
        .and(warp::post())
        .and(wallet())
        .and(json_body::<PostChatRequest>())
        .and(s())
        .and_then(post_chat)
        .boxed();
    let chat_ws = warp::path!("battles" / BattleId / "memes" / usize / "chat" / "live")
        .and(warp::ws())
        .and(s())
        .and_then(chat_live)
        .boxed();
    let bet = warp::path!("battles" / BattleId / "memes" / usize / "bets")
        .and(warp::post())
        .and(wallet())
        .and(json_body::<PlaceBetRequest>())
        .and(s())
        .and_then(place_bet)
        .boxed();
    let bet_contract = warp::path!("battles" / BattleId / "memes" / usize / "bets" / "contract")
        .and(warp::post())
        .and(wallet())
        .and(json_body::<PlaceBetRequest>())
        .and(s())
        .and_then(place_bet_on_contract)
        .boxed();
    let score = warp::path!("battles" / BattleId / "memes" / usize / "score")
        .and(warp::post())
        .and(s())
        .and_then(score_meme)
        .boxed();

    let profile = warp::path!("profile" / String / "bets")
        .and(warp::get())
        .and(s())
        .and_then(user_bets)
        .boxed();
    let health_route = warp::path!("health").and(warp::get()).and(s()).and_then(health).boxed();
    let metrics_route = warp::path!("metrics").and(warp::get()).and(s()).and_then(metrics).boxed();

    let battles = list.or(create).or(detail).or(status).or(declare).or(bets).boxed();
    let memes = meme
        .or(chat_list)
        .or(chat_post)
        .or(chat_ws)
        .or(bet)
        .or(bet_contract)
        .or(score)
        .boxed();
    let ops = profile.or(health_route).or(metrics_route).boxed();

    battles.or(memes).or(ops).boxed()
}

/// The full application: routes, rejection handling, CORS and request
/// tracing.
pub fn app(service: Arc<BattleService>, config: &ServerConfig) -> BoxedFilter<(impl Reply + use<>,)> {
    let cors = if config.cors_any_origin {
        warp::cors()
            .allow_any_origin()
            .allow_methods(["GET", "POST", "OPTIONS"])
            .allow_headers(["content-type", "x-address"])
    } else {
        warp::cors()
    };

    routes(service)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::trace::request())
        .boxed()
}
