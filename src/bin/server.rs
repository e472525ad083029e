use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use orb_arena_server::constants::TICK_MS;
use orb_arena_server::engine::{ArenaEngine, ArenaEngineOptions};
use orb_arena_server::server_protocol::{parse_client_message, ParsedClientMessage};
use orb_arena_server::server_utils::{
    normalize_bot_count, parse_leaderboard_limit, sanitize_name,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    player_id: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    arena: ArenaEngine,
    arena_options: ArenaEngineOptions,
}

impl ServerState {
    fn new(arena: ArenaEngine, arena_options: ArenaEngineOptions) -> Self {
        Self {
            clients: HashMap::new(),
            arena,
            arena_options,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<String>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let seed = std::env::var("SEED")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_else(|| rand::rng().random::<u32>());
    let options = build_arena_options(
        std::env::var("BOT_COUNT")
            .ok()
            .and_then(|value| value.parse::<i64>().ok()),
        std::env::var("TIME_LIMIT_MINUTES")
            .ok()
            .and_then(|value| value.parse::<i64>().ok()),
        std::env::var("PELLET_POOL")
            .ok()
            .and_then(|value| value.parse::<usize>().ok()),
    );
    let expected_players = std::env::var("EXPECTED_PLAYERS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(4);

    println!("[server] arena seed: {seed}");
    let arena = ArenaEngine::new(expected_players, seed, options.clone());
    let state = Arc::new(Mutex::new(ServerState::new(arena, options)));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found. run the client build to generate dist/client.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn build_arena_options(
    bot_count: Option<i64>,
    time_limit_minutes: Option<i64>,
    pellet_pool: Option<usize>,
) -> ArenaEngineOptions {
    ArenaEngineOptions {
        time_limit_ms: time_limit_minutes.map(|minutes| minutes.clamp(1, 60) as u64 * 60_000),
        bot_count: normalize_bot_count(bot_count),
        pellet_pool,
    }
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [
        PathBuf::from("dist/client"),
        PathBuf::from("../../dist/client"),
    ];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn leaderboard_handler(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let limit = parse_leaderboard_limit(query.limit.as_deref());
    let guard = state.lock().await;
    let mut entries = guard.arena.leaderboard();
    entries.truncate(limit);
    Json(json!({ "leaderboard": entries }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                player_id: None,
            },
        );
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "invalid message").await;
        return;
    };

    match message {
        ParsedClientMessage::Join { name } => {
            handle_join(state, client_id, name).await;
        }
        ParsedClientMessage::Input { dir, split } => {
            let player_id = {
                let guard = state.lock().await;
                guard
                    .clients
                    .get(client_id)
                    .and_then(|ctx| ctx.player_id.clone())
            };
            let Some(player_id) = player_id else {
                send_error_to_client(&state, client_id, "send join first").await;
                return;
            };
            let mut guard = state.lock().await;
            guard.arena.receive_input(&player_id, dir, split);
        }
        ParsedClientMessage::Ping { t } => {
            let mut guard = state.lock().await;
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }
}

async fn handle_join(state: SharedState, client_id: &str, requested_name: String) {
    let mut guard = state.lock().await;
    let already_joined = guard
        .clients
        .get(client_id)
        .map(|ctx| ctx.player_id.is_some())
        .unwrap_or(false);
    if already_joined {
        send_to_client(
            &mut guard,
            client_id,
            &json!({
                "type": "error",
                "message": "already joined",
            }),
            QueuePolicy::DisconnectOnFull,
        );
        return;
    }

    let name = sanitize_name(&requested_name);
    let player_id = make_id("player");
    guard.arena.add_player(&player_id, &name);
    if let Some(ctx) = guard.clients.get_mut(client_id) {
        ctx.player_id = Some(player_id.clone());
    }
    println!("[server] player joined: {player_id} ({name})");

    let (config, started_at_ms, seed, arena_init, snapshot) = {
        let arena = &mut guard.arena;
        (
            arena.config.clone(),
            arena.started_at_ms,
            arena.seed(),
            arena.get_arena_init(),
            arena.build_snapshot(false),
        )
    };

    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "welcome",
            "playerId": player_id,
            "config": config,
            "startedAtMs": started_at_ms,
            "seed": seed,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "arena_init",
            "arena": arena_init,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DisconnectOnFull,
    );

    broadcast_except(
        &mut guard,
        client_id,
        &json!({
            "type": "player_joined",
            "playerId": player_id,
            "name": name,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

async fn handle_disconnect(state: SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    disconnect_client_internal(&mut guard, client_id);
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    let Some(player_id) = context.player_id else {
        return;
    };

    state.arena.remove_player(&player_id);
    println!("[server] player left: {player_id}");
    broadcast(
        state,
        &json!({
            "type": "player_left",
            "playerId": player_id,
        }),
        QueuePolicy::DropOnFull,
    );
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_arena(&mut guard);
        }
    });
}

fn tick_arena(state: &mut ServerState) {
    state.arena.step(TICK_MS);
    let snapshot = state.arena.build_snapshot(true);

    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    for notice in state.arena.drain_death_notices() {
        let client_id = state
            .clients
            .iter()
            .find(|(_, ctx)| ctx.player_id.as_deref() == Some(notice.player_id.as_str()))
            .map(|(id, _)| id.clone());
        if let Some(client_id) = client_id {
            send_to_client(
                state,
                &client_id,
                &json!({
                    "type": "you_were_eaten",
                    "killerName": notice.killer_name,
                    "survivalTimeSeconds": notice.survival_time_seconds,
                    "finalMass": notice.final_mass,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }

    if state.arena.is_ended() {
        let summary = state.arena.build_summary();
        broadcast(
            state,
            &json!({
                "type": "game_over",
                "summary": summary,
            }),
            QueuePolicy::DisconnectOnFull,
        );

        // Fresh arena, fresh seed; clients reconnect and rejoin explicitly.
        let seed = rand::rng().random::<u32>();
        println!("[server] arena rotated, new seed: {seed}");
        state.arena = ArenaEngine::new(4, seed, state.arena_options.clone());
        for ctx in state.clients.values() {
            let _ = ctx.tx.try_send(OutboundMessage::Close {
                code: 1012,
                reason: "arena restarted".to_string(),
            });
        }
        state.clients.clear();
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &serde_json::Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_client_internal(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &serde_json::Value, policy: QueuePolicy) {
    broadcast_internal(state, None, message, policy);
}

fn broadcast_except(
    state: &mut ServerState,
    skipped_client_id: &str,
    message: &serde_json::Value,
    policy: QueuePolicy,
) {
    broadcast_internal(state, Some(skipped_client_id), message, policy);
}

fn broadcast_internal(
    state: &mut ServerState,
    skipped_client_id: Option<&str>,
    message: &serde_json::Value,
    policy: QueuePolicy,
) {
    let payload = message.to_string();
    let client_ids: Vec<String> = state.clients.keys().cloned().collect();
    let mut failed_clients = Vec::new();
    for client_id in client_ids {
        if skipped_client_id == Some(client_id.as_str()) {
            continue;
        }
        let Some(client) = state.clients.get(&client_id) else {
            continue;
        };
        // Snapshots only flow to clients that joined the arena.
        if client.player_id.is_none() {
            continue;
        }
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id);
        }
    }
    if policy == QueuePolicy::DisconnectOnFull {
        for client_id in failed_clients {
            disconnect_client_internal(state, &client_id);
        }
    }
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_options_clamp_time_limit_and_bot_count() {
        let options = build_arena_options(Some(-3), Some(0), Some(500));
        assert_eq!(options.bot_count, Some(0));
        assert_eq!(options.time_limit_ms, Some(60_000));
        assert_eq!(options.pellet_pool, Some(500));

        let options = build_arena_options(Some(12), Some(5), None);
        assert_eq!(options.bot_count, Some(12));
        assert_eq!(options.time_limit_ms, Some(5 * 60_000));
        assert_eq!(options.pellet_pool, None);
    }

    #[test]
    fn arena_options_default_to_open_ended_session() {
        let options = build_arena_options(None, None, None);
        assert_eq!(options.time_limit_ms, None);
        assert_eq!(options.bot_count, None);
    }

    #[test]
    fn make_id_produces_unique_prefixed_ids() {
        let a = make_id("client");
        let b = make_id("client");
        assert!(a.starts_with("client_"));
        assert_ne!(a, b);
    }
}
