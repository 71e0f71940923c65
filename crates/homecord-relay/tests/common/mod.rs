//! Shared test servers for the relay integration tests
//!
//! Provides an in-process stand-in for the chat bot (HTTP notify endpoint
//! plus a streaming socket) and one for the host platform's snapshot
//! proxy, both with captured requests for assertions.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

/// A few bytes that look like the start of a PNG
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 1];

/// Tunable misbehavior for the fake bot
#[derive(Debug, Clone, Copy, Default)]
pub struct BotBehavior {
    /// Close the first streaming connection after this many frames
    pub close_first_after: Option<usize>,
    /// Refuse streaming upgrades beyond this many accepted connections
    pub max_connections: Option<usize>,
}

struct BotState {
    /// Bodies received on the notify endpoint
    posts: Mutex<Vec<Value>>,
    /// Text frames received over streaming connections
    frames: Mutex<Vec<Value>>,
    /// Number of streaming connections accepted so far
    connections: AtomicUsize,
    behavior: BotBehavior,
}

/// In-process fake of the chat bot
pub struct BotServer {
    addr: SocketAddr,
    state: Arc<BotState>,
}

impl BotServer {
    /// Spawn a well-behaved bot on an ephemeral port
    pub async fn spawn() -> Self {
        Self::spawn_with(BotBehavior::default()).await
    }

    /// Spawn a bot with the given misbehavior
    pub async fn spawn_with(behavior: BotBehavior) -> Self {
        let state = Arc::new(BotState {
            posts: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            behavior,
        });

        let router = Router::new()
            .route("/hacs/notify", post(notify))
            .route("/ws", get(ws_upgrade))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    /// Base URL of the notify endpoint's server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the streaming endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Bodies POSTed to the notify endpoint so far
    pub fn posts(&self) -> Vec<Value> {
        self.state.posts.lock().unwrap().clone()
    }

    /// Text frames received over streaming so far
    pub fn frames(&self) -> Vec<Value> {
        self.state.frames.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.state.posts.lock().unwrap().len()
    }

    pub fn frame_count(&self) -> usize {
        self.state.frames.lock().unwrap().len()
    }

    /// Streaming connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

async fn notify(State(state): State<Arc<BotState>>, Json(body): Json<Value>) -> StatusCode {
    state.posts.lock().unwrap().push(body);
    StatusCode::OK
}

async fn ws_upgrade(State(state): State<Arc<BotState>>, ws: WebSocketUpgrade) -> Response {
    if let Some(max) = state.behavior.max_connections {
        if state.connections.load(Ordering::SeqCst) >= max {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }
    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<BotState>, connection: usize) {
    let mut received = 0usize;
    while let Some(Ok(message)) = socket.recv().await {
        if let WsMessage::Text(text) = message {
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                state.frames.lock().unwrap().push(value);
            }
            received += 1;
            if connection == 1 && state.behavior.close_first_after == Some(received) {
                let _ = socket.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }
}

struct SnapshotState {
    /// Image bytes served per entity ID; anything else gets a 404
    images: HashMap<String, Vec<u8>>,
    hits: AtomicUsize,
    /// Authorization header of the most recent request
    authorization: Mutex<Option<String>>,
    /// Artificial response delay
    delay: Option<Duration>,
}

/// In-process fake of the host platform's snapshot proxy endpoints
pub struct SnapshotServer {
    addr: SocketAddr,
    state: Arc<SnapshotState>,
}

impl SnapshotServer {
    pub async fn spawn(images: HashMap<String, Vec<u8>>) -> Self {
        Self::spawn_with(images, None).await
    }

    pub async fn spawn_with(images: HashMap<String, Vec<u8>>, delay: Option<Duration>) -> Self {
        let state = Arc::new(SnapshotState {
            images,
            hits: AtomicUsize::new(0),
            authorization: Mutex::new(None),
            delay,
        });

        let router = Router::new()
            .route("/api/camera_proxy/:entity_id", get(proxy))
            .route("/api/image_proxy/:entity_id", get(proxy))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hit_count(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Authorization header seen on the most recent proxy request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.authorization.lock().unwrap().clone()
    }
}

async fn proxy(
    State(state): State<Arc<SnapshotState>>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.authorization.lock().unwrap() = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    match state.images.get(&entity_id) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A streaming URL nothing is listening on
pub async fn refused_ws_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
