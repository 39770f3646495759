//! HTTP API tests driven through `warp::test` with in-process adapters.

use std::sync::Arc;

use chrono::{DateTime, Duration};
use memebattle_app::clock::ManualClock;
use memebattle_app::local::{LocalAttestations, RecordingContract, StaticHashtagMetrics};
use memebattle_app::{Adapters, BattleService};
use memebattle_core::config::{MemeBattleConfig, ServerConfig};
use memebattle_core::persistence::BattleStore;
use memebattle_llm::{LlmClient, MemeScorer};
use serde_json::{json, Value};
use warp::http::StatusCode;

const ALICE: &str = "0x1111111111111111111111111111111111111111";

struct TestApp {
    service: Arc<BattleService>,
    hashtags: Arc<StaticHashtagMetrics>,
    clock: Arc<ManualClock>,
}

fn test_app() -> TestApp {
    test_app_with(MemeBattleConfig::default())
}

fn test_app_with(config: MemeBattleConfig) -> TestApp {
    let store = BattleStore::open_in_memory(&config.persistence).expect("store");
    let hashtags = Arc::new(StaticHashtagMetrics::new());
    let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).expect("ts")));
    let adapters = Adapters {
        hashtags: hashtags.clone(),
        contract: Arc::new(RecordingContract::new()),
        attestations: Arc::new(LocalAttestations::new()),
        scorer: Arc::new(MemeScorer::new(LlmClient::none(), 1_000)),
    };
    let service = Arc::new(BattleService::with_clock(config, store, adapters, clock.clone()));
    TestApp {
        service,
        hashtags,
        clock,
    }
}

fn body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(res.body()).expect("json body")
}

fn battle_form() -> Value {
    json!({
        "name": "Doge vs Pepe",
        "description": "Only one survives",
        "memes": [
            {"name": "Doge", "image": "https://img.example/doge.png", "hashtag": "#doge"},
            {"name": "Pepe", "image": "https://img.example/pepe.png", "hashtag": "pepe"}
        ],
        "duration_secs": 600
    })
}

async fn create_battle(app: &TestApp) -> String {
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    let res = warp::test::request()
        .method("POST")
        .path("/battles")
        .header("x-address", ALICE)
        .json(&battle_form())
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let json = body(&res);
    assert_eq!(json["success"], true);
    json["data"]["battle"]["id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn create_list_and_detail() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());

    let res = warp::test::request().path("/battles").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    let list = body(&res);
    assert_eq!(list["data"].as_array().expect("array").len(), 1);
    assert_eq!(list["data"][0]["status"], "open");
    assert_eq!(list["data"][0]["memes"][0]["hashtag"], "doge");

    let res = warp::test::request().path(&format!("/battles/{id}")).reply(&filter).await;
    let detail = body(&res);
    assert_eq!(detail["data"]["time_left"], "0h 10m 0s");
    assert_eq!(detail["data"]["creator"], ALICE);
    assert!(detail["data"]["winner"].is_null());
}

#[tokio::test]
async fn invalid_form_is_bad_request() {
    let app = test_app();
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    let res = warp::test::request()
        .method("POST")
        .path("/battles")
        .json(&json!({"name": "", "description": "x", "memes": []}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json = body(&res);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().expect("message").contains("Enter this field"));
}

#[tokio::test]
async fn unknown_battle_is_not_found() {
    let app = test_app();
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    let missing = memebattle_core::BattleId::new();
    let res = warp::test::request().path(&format!("/battles/{missing}")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = warp::test::request().path("/nowhere").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn declare_winner_over_http() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    app.hashtags.set("doge", 40);
    app.hashtags.set("pepe", 10);

    let early = warp::test::request()
        .method("POST")
        .path(&format!("/battles/{id}/declare-winner"))
        .reply(&filter)
        .await;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    app.clock.advance(Duration::minutes(10) + Duration::seconds(1));
    let res = warp::test::request()
        .method("POST")
        .path(&format!("/battles/{id}/declare-winner"))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let json = body(&res);
    assert_eq!(json["data"]["winning_meme"], 0);
    assert_eq!(json["data"]["winner"]["name"], "Doge");

    let status = body(&warp::test::request().path(&format!("/battles/{id}/status")).reply(&filter).await);
    assert_eq!(status["data"]["status"], "decided");
}

#[tokio::test]
async fn chat_needs_a_wallet() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    let path = format!("/battles/{id}/memes/1/chat");

    let anonymous = warp::test::request()
        .method("POST")
        .path(&path)
        .json(&json!({"content": "hello"}))
        .reply(&filter)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let malformed = warp::test::request()
        .method("POST")
        .path(&path)
        .header("x-address", "vitalik")
        .json(&json!({"content": "hello"}))
        .reply(&filter)
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let posted = warp::test::request()
        .method("POST")
        .path(&path)
        .header("x-address", ALICE)
        .json(&json!({"content": "  pepe wins  "}))
        .reply(&filter)
        .await;
    assert_eq!(posted.status(), StatusCode::CREATED);

    let history = body(&warp::test::request().path(&path).reply(&filter).await);
    assert_eq!(history["data"][0]["content"], "pepe wins");
    assert_eq!(history["data"][0]["sender"], ALICE);
}

#[tokio::test]
async fn bet_shows_up_on_profile() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/battles/{id}/memes/0/bets"))
        .header("x-address", ALICE)
        .json(&json!({"amount": "0.01"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(body(&res)["data"]["amount"], "10000000000000000");

    let zero = warp::test::request()
        .method("POST")
        .path(&format!("/battles/{id}/memes/0/bets"))
        .header("x-address", ALICE)
        .json(&json!({"amount": "0"}))
        .reply(&filter)
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let profile = body(&warp::test::request().path(&format!("/profile/{ALICE}/bets")).reply(&filter).await);
    let bets = profile["data"].as_array().expect("array");
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0]["meme"]["name"], "Doge");

    let bad = warp::test::request().path("/profile/nobody/bets").reply(&filter).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn score_without_llm_is_unavailable() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    let res = warp::test::request()
        .method("POST")
        .path(&format!("/battles/{id}/memes/0/score"))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_and_metrics() {
    let app = test_app();
    create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());

    let health = body(&warp::test::request().path("/health").reply(&filter).await);
    assert_eq!(health["data"]["status"], "healthy");

    let metrics = body(&warp::test::request().path("/metrics").reply(&filter).await);
    assert_eq!(metrics["data"]["battles_created"], 1);
}

#[tokio::test]
async fn live_chat_streams_new_messages() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());

    let mut client = warp::test::ws()
        .path(&format!("/battles/{id}/memes/1/chat/live"))
        .handshake(filter.clone())
        .await
        .expect("handshake");

    let battle = id.parse().expect("battle id");
    let sender = memebattle_core::WalletAddress::parse(ALICE).expect("addr");
    app.service.post_chat(Some(sender.clone()), &battle, 0, "other room").expect("post");
    app.service.post_chat(Some(sender), &battle, 1, "gm pepe").expect("post");

    let msg = client.recv().await.expect("message");
    let json: Value = serde_json::from_str(msg.to_str().expect("text")).expect("json");
    assert_eq!(json["content"], "gm pepe");
    assert_eq!(json["meme_index"], 1);
}

#[tokio::test]
async fn live_chat_catches_up_after_a_busy_bus() {
    let mut config = MemeBattleConfig::default();
    config.chat.live_channel_capacity = 4;
    config.chat.rate_limit_messages = 1_000;
    let app = test_app_with(config);
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());

    let mut client = warp::test::ws()
        .path(&format!("/battles/{id}/memes/1/chat/live"))
        .handshake(filter.clone())
        .await
        .expect("handshake");

    let battle = id.parse().expect("battle id");
    let sender = memebattle_core::WalletAddress::parse(ALICE).expect("addr");
    app.service.post_chat(Some(sender.clone()), &battle, 1, "first in my room").expect("post");
    for i in 0..20 {
        app.service.post_chat(Some(sender.clone()), &battle, 0, &format!("busy {i}")).expect("post");
    }
    app.service.post_chat(Some(sender.clone()), &battle, 1, "second in my room").expect("post");

    let mut received = Vec::new();
    for _ in 0..2 {
        let msg = client.recv().await.expect("message");
        let json: Value = serde_json::from_str(msg.to_str().expect("text")).expect("json");
        received.push(json["content"].as_str().expect("content").to_string());
    }
    assert_eq!(received, vec!["first in my room", "second in my room"]);

    app.service.post_chat(Some(sender), &battle, 1, "third in my room").expect("post");
    let msg = client.recv().await.expect("message");
    let json: Value = serde_json::from_str(msg.to_str().expect("text")).expect("json");
    assert_eq!(json["content"], "third in my room", "caught-up messages are not repeated");
}

#[tokio::test]
async fn live_chat_for_unknown_meme_is_not_found() {
    let app = test_app();
    let id = create_battle(&app).await;
    let filter = memebattle_server::app(app.service.clone(), &ServerConfig::default());
    let handshake = warp::test::ws()
        .path(&format!("/battles/{id}/memes/9/chat/live"))
        .handshake(filter)
        .await;
    assert!(handshake.is_err());
}

#[tokio::test]
async fn app_outlives_its_config() {
    let app = test_app();
    let filter = {
        let config = ServerConfig::default();
        memebattle_server::app(app.service.clone(), &config)
    };
    let served = tokio::spawn(async move { filter }).await.expect("join");
    let res = warp::test::request().path("/health").reply(&served).await;
    assert_eq!(res.status(), StatusCode::OK);
}
