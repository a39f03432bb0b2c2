//! Authoritative match server.
//!
//! Hosts rooms over a websocket endpoint, with a minimal HTTP surface for
//! room creation and health checks. All game semantics live in
//! `ludovault-execution`; all per-room sequencing lives in [`session`]. This
//! binary only wires sockets, HTTP, and the periodic sweeps together.

mod config;
mod oracle;
mod registry;
mod session;
mod timer;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, warn};

use ludovault_types::{ClientMessage, CreateRoomRequest, CreateRoomResponse, ServerMessage};

use crate::config::ServerConfig;
use crate::oracle::{PayoutAuthority, StakeOracle};
use crate::registry::RoomRegistry;
use crate::session::{Effects, RoomSession, SessionError};
use crate::timer::{apply_schedules, now_ms, publish, ServerContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // The static path tables are build-time data; fail fast if they are
    // ever inconsistent.
    ludovault_execution::verify_board();

    let config = ServerConfig::from_env();
    let ctx = ServerContext {
        registry: Arc::new(RoomRegistry::new(config.max_skips)),
        config: Arc::new(config.clone()),
        stake_oracle: Arc::new(StakeOracle::new(config.stake_oracle_url.clone())),
        payout_authority: Arc::new(PayoutAuthority::new(
            config.payout_authority_url.clone(),
            config.payout_deadline_ms,
        )),
    };

    // Periodic sweep: absence timeouts plus room garbage collection.
    let sweep_ctx = ctx.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(sweep_ctx.config.gc_interval_ms));
        loop {
            interval.tick().await;
            run_sweep(&sweep_ctx);
        }
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", post(create_room))
        .route("/rooms/:room_id", axum::routing::delete(cancel_room))
        .route("/healthz", get(healthz))
        .with_state(ctx);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "match server listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_room(
    AxumState(ctx): AxumState<ServerContext>,
    Json(request): Json<CreateRoomRequest>,
) -> impl IntoResponse {
    match ctx.registry.create(&request, now_ms()) {
        Ok(room_id) => (StatusCode::CREATED, Json(CreateRoomResponse { room_id })).into_response(),
        Err(message) => (StatusCode::BAD_REQUEST, message).into_response(),
    }
}

async fn cancel_room(
    AxumState(ctx): AxumState<ServerContext>,
    axum::extract::Path(room_id): axum::extract::Path<String>,
) -> StatusCode {
    if ctx.registry.cancel(&room_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(ctx): AxumState<ServerContext>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: ServerContext) {
    let (mut sender, mut receiver) = socket.split();
    // Per-connection outbound queue so one slow client cannot stall the
    // room's event processing.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // The room/address this socket has joined, if any.
    let mut membership: Option<(String, String)> = None;
    let mut forward_task: Option<JoinHandle<()>> = None;

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(inbound) => {
                    handle_inbound(inbound, &ctx, &tx, &mut membership, &mut forward_task).await
                }
                Err(err) => {
                    warn!(?err, "invalid inbound message");
                    send_error(&tx, "malformed message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Socket gone. Detach the seat only; all state stays for re-entry.
    if let Some((room_id, address)) = membership {
        if let Some(handle) = ctx.registry.get(&room_id) {
            let effects = {
                let mut session = handle.session.lock().expect("room session poisoned");
                let mut effects = session.handle_disconnect(&address, now_ms());
                let _ = publish(&handle, &mut effects);
                effects
            };
            apply_schedules(&ctx, &room_id, effects);
        }
    }
    if let Some(task) = forward_task {
        task.abort();
    }
    write_task.abort();
}

async fn handle_inbound(
    inbound: ClientMessage,
    ctx: &ServerContext,
    tx: &mpsc::UnboundedSender<Message>,
    membership: &mut Option<(String, String)>,
    forward_task: &mut Option<JoinHandle<()>>,
) {
    match inbound {
        ClientMessage::JoinMatch {
            room_id,
            player_address,
            tx_ref,
        } => {
            if let Some((joined, _)) = membership {
                if *joined != room_id {
                    send_error(tx, "connection already joined another room");
                    return;
                }
            }
            let Some(handle) = ctx.registry.get(&room_id) else {
                send_error(tx, "room not found");
                return;
            };

            // Stake gate: a join is only accepted for a funded seat. The
            // oracle being unreachable is retryable, never fatal.
            match ctx
                .stake_oracle
                .verify_funding(&room_id, &player_address, tx_ref.as_deref())
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    send_error(tx, "stake not verified for this room");
                    return;
                }
                Err(err) => {
                    warn!(%room_id, ?err, "stake oracle unavailable");
                    send_error(tx, "stake verification unavailable, retry shortly");
                    return;
                }
            }

            // Subscribe before the join is processed so this client cannot
            // miss the broadcasts its own join produces (`game_started`).
            let subscription = if membership.is_none() {
                Some(handle.events.subscribe())
            } else {
                None
            };
            let result = {
                let mut session = handle.session.lock().expect("room session poisoned");
                session.handle_join(&player_address, now_ms()).map(|mut effects| {
                    let direct = publish(&handle, &mut effects);
                    (direct, effects)
                })
            };
            match result {
                Ok((direct, effects)) => {
                    if let Some(events) = subscription {
                        *forward_task = Some(spawn_room_forwarder(events, tx.clone()));
                    }
                    *membership = Some((room_id.clone(), player_address));
                    apply_schedules(ctx, &room_id, effects);
                    deliver(tx, direct);
                }
                Err(err) => send_error(tx, &err.to_string()),
            }
        }
        ClientMessage::RollDice {
            room_id,
            player_address,
        } => dispatch(ctx, tx, &room_id, |session| {
            session.handle_roll(&player_address, now_ms())
        }),
        ClientMessage::MoveToken {
            room_id,
            player_address,
            token_index,
        } => dispatch(ctx, tx, &room_id, |session| {
            session.handle_move(&player_address, token_index, now_ms())
        }),
        ClientMessage::ClaimPayout {
            room_id,
            player_address,
        } => dispatch(ctx, tx, &room_id, |session| {
            session.handle_claim_payout(&player_address)
        }),
    }
}

/// Forward room broadcasts onto one connection's outbound queue.
fn spawn_room_forwarder(
    mut events: broadcast::Receiver<ServerMessage>,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if tx.send(Message::Text(payload)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "client lagging on room broadcasts");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Run one session handler under the room lock, then apply its effects.
/// Rejections only ever reach the offending client.
fn dispatch(
    ctx: &ServerContext,
    tx: &mpsc::UnboundedSender<Message>,
    room_id: &str,
    action: impl FnOnce(&mut RoomSession) -> Result<Effects, SessionError>,
) {
    let Some(handle) = ctx.registry.get(room_id) else {
        send_error(tx, "room not found");
        return;
    };
    let result = {
        let mut session = handle.session.lock().expect("room session poisoned");
        action(&mut session).map(|mut effects| {
            let direct = publish(&handle, &mut effects);
            (direct, effects)
        })
    };
    match result {
        Ok((direct, effects)) => {
            apply_schedules(ctx, room_id, effects);
            deliver(tx, direct);
        }
        Err(err) => {
            info!(%room_id, %err, "rejected client action");
            send_error(tx, &err.to_string());
        }
    }
}

fn deliver(tx: &mpsc::UnboundedSender<Message>, messages: Vec<ServerMessage>) {
    for message in messages {
        if let Ok(payload) = serde_json::to_string(&message) {
            let _ = tx.send(Message::Text(payload));
        }
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    deliver(
        tx,
        vec![ServerMessage::GameError {
            message: message.to_string(),
        }],
    );
}

/// Absence timeouts plus room garbage collection, on one cadence.
fn run_sweep(ctx: &ServerContext) {
    let now = now_ms();
    for room_id in ctx.registry.room_ids() {
        let Some(handle) = ctx.registry.get(&room_id) else {
            continue;
        };
        let effects = {
            let mut session = handle.session.lock().expect("room session poisoned");
            if session.absence_timeout_due(now, ctx.config.absence_timeout_ms) {
                info!(room = %room_id, "active player absent past threshold, forcing timeout");
                let mut effects = session.handle_timeout(now);
                let _ = publish(&handle, &mut effects);
                Some(effects)
            } else {
                None
            }
        };
        if let Some(effects) = effects {
            apply_schedules(ctx, &room_id, effects);
        }
    }

    let removed = ctx.registry.sweep(
        now,
        ctx.config.waiting_max_age_ms,
        ctx.config.abandoned_active_ms,
    );
    if !removed.is_empty() {
        info!(count = removed.len(), "garbage-collected rooms");
    }
}
