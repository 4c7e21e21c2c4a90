//! End-to-end tests over a real listener: the server runs in-process on
//! an ephemeral port and a plain HTTP client drives the long-poll flow.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use comet_chat::{
    broker::{Broker, BrokerConfig, PollReply},
    domain::MessageStore,
    infrastructure::FileMessageSink,
    server::{AppState, build_router},
};

/// A running in-process server plus the tempdir backing its message log.
struct TestServer {
    addr: SocketAddr,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start(poll_timeout: Duration) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let sink = Arc::new(FileMessageSink::new(dir.path().join("messages.log")));
        let config = BrokerConfig {
            poll_timeout,
            ..BrokerConfig::default()
        };
        let broker = Arc::new(Broker::new(sink, config, MessageStore::new()));
        let app = build_router(Arc::new(AppState { broker }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer { addr, _dir: dir }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_new_clients_get_distinct_increasing_ids() {
    let server = TestServer::start(Duration::from_secs(50)).await;
    let client = reqwest::Client::new();

    let first: serde_json::Value = client
        .get(server.url("/chat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = client
        .get(server.url("/chat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(first["id"], 0);
    assert_eq!(second["id"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pending_poll_is_answered_by_a_post_within_milliseconds() {
    let server = TestServer::start(Duration::from_secs(50)).await;
    let client = reqwest::Client::new();

    // Client A starts a long poll with no data available.
    let poll_url = server.url("/chat/0");
    let poller = tokio::spawn(async move {
        let client = reqwest::Client::new();
        let started = Instant::now();
        let reply: PollReply = client
            .get(poll_url)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        (reply, started.elapsed())
    });

    // Give the poll time to register and be held.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Client B posts a message.
    let response = client
        .post(server.url("/chat/1"))
        .json(&serde_json::json!({"username": "bob", "message": "hi"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // Client A's pending poll completes right away, not after the 50s
    // renewal timeout.
    let (reply, elapsed) = tokio::time::timeout(Duration::from_secs(2), poller)
        .await
        .expect("pending poll should complete promptly")
        .unwrap();
    assert_eq!(reply.messages.len(), 1);
    assert_eq!(reply.messages[0].username, "bob");
    assert_eq!(reply.messages[0].message, "hi");
    assert_eq!(reply.messages[0].id, Some(1));
    assert!(reply.messages[0].time > 0);
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_poll_with_buffered_history_returns_immediately() {
    let server = TestServer::start(Duration::from_secs(50)).await;
    let client = reqwest::Client::new();

    client
        .post(server.url("/chat/1"))
        .json(&serde_json::json!({"username": "bob", "message": "first"}))
        .send()
        .await
        .unwrap();
    client
        .post(server.url("/chat/1"))
        .json(&serde_json::json!({"username": "bob", "message": "second"}))
        .send()
        .await
        .unwrap();

    // A new client polls and is seeded with recent history, answered
    // immediately.
    let started = Instant::now();
    let reply: PollReply = client
        .get(server.url("/chat/5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(reply.messages.len(), 2);
    assert_eq!(reply.messages[0].message, "first");
    assert_eq!(reply.messages[1].message, "second");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_idle_poll_is_renewed_with_empty_reply() {
    let server = TestServer::start(Duration::from_millis(300)).await;
    let client = reqwest::Client::new();

    let started = Instant::now();
    let reply: PollReply = client
        .get(server.url("/chat/0"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(reply.messages.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_posted_markup_is_sanitized_before_fan_out() {
    let server = TestServer::start(Duration::from_secs(50)).await;
    let client = reqwest::Client::new();

    client
        .post(server.url("/chat/1"))
        .json(&serde_json::json!({"username": "  ", "message": "<b>bold</b>"}))
        .send()
        .await
        .unwrap();

    let reply: PollReply = client
        .get(server.url("/chat/2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(reply.messages[0].username, "Anonymous");
    assert_eq!(reply.messages[0].message, "&lt;b&gt;bold&lt;/b&gt;");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_check() {
    let server = TestServer::start(Duration::from_secs(50)).await;

    let body: serde_json::Value = reqwest::get(server.url("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
}
