//! Cancellable scheduling around room sessions.
//!
//! Session handlers return [`Effects`] as data; this module is the single
//! place that turns them into side effects: room broadcasts, turn timers,
//! delayed AI steps, and payout authorization. Every scheduled task carries
//! the room's generation counter and re-checks it under the session lock
//! before acting, so re-arming or tearing a room down makes in-flight tasks
//! harmless no-ops.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time;
use tracing::{info, warn};

use ludovault_types::ServerMessage;

use crate::config::ServerConfig;
use crate::oracle::{PayoutAuthority, StakeOracle};
use crate::registry::{RoomHandle, RoomRegistry};
use crate::session::{Effects, Outgoing, PayoutDue, TimerAction};

/// Everything the async layers need, cloned into tasks.
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<RoomRegistry>,
    pub config: Arc<ServerConfig>,
    pub stake_oracle: Arc<StakeOracle>,
    pub payout_authority: Arc<PayoutAuthority>,
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Send a handler's room broadcasts and collect its direct messages.
///
/// Must be called while the caller still holds the room's session lock:
/// that is what makes the broadcast order identical to the order in which
/// the authoritative transitions occurred, so a client that sees snapshot
/// N+1 has necessarily been sent N.
pub fn publish(handle: &RoomHandle, effects: &mut Effects) -> Vec<ServerMessage> {
    let mut direct = Vec::new();
    for outgoing in effects.outgoing.drain(..) {
        match outgoing {
            Outgoing::Broadcast(message) => {
                let _ = handle.events.send(message);
            }
            Outgoing::Direct(message) => direct.push(message),
        }
    }
    direct
}

/// Execute a handler's scheduling directives: re-plan the turn timer,
/// schedule an AI step, kick off payout authorization.
///
/// Must be called after the session lock is released; the arming paths
/// take the lock themselves.
pub fn apply_schedules(ctx: &ServerContext, room_id: &str, effects: Effects) {
    let Some(handle) = ctx.registry.get(room_id) else {
        // Room torn down mid-flight; nothing left to schedule.
        return;
    };

    match effects.timer {
        TimerAction::Keep => {}
        TimerAction::Cancel => cancel_schedules(&handle),
        TimerAction::Arm => arm_turn_timer(ctx, room_id, &handle),
    }
    if effects.schedule_ai {
        schedule_ai_step(ctx, room_id, &handle);
    }
    if let Some(due) = effects.payout_due {
        spawn_payout_task(ctx.clone(), room_id.to_string(), due);
    }
}

/// Invalidate and abort everything scheduled for the room.
fn cancel_schedules(handle: &RoomHandle) {
    let mut session = handle.session.lock().expect("room session poisoned");
    session.teardown();
}

/// Arm the turn timer for the active (human) player. Any previously armed
/// timer is aborted first; arming is idempotent.
fn arm_turn_timer(ctx: &ServerContext, room_id: &str, handle: &RoomHandle) {
    let timeout_ms = ctx.config.turn_timeout_ms;
    let mut session = handle.session.lock().expect("room session poisoned");
    session.sched_gen = session.sched_gen.wrapping_add(1);
    let generation = session.sched_gen;
    if let Some(previous) = session.timer_handle.take() {
        previous.abort();
    }

    let _ = handle.events.send(ServerMessage::TurnTimerStart { timeout_ms });

    let events = handle.events.clone();
    let task_ctx = ctx.clone();
    let room = room_id.to_string();
    session.timer_handle = Some(tokio::spawn(async move {
        let started = time::Instant::now();
        let mut ticker = time::interval(Duration::from_secs(1));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let elapsed = started.elapsed().as_millis() as u64;
            if elapsed >= timeout_ms {
                break;
            }
            let remaining_seconds = (timeout_ms - elapsed).div_ceil(1_000);
            let _ = events.send(ServerMessage::TurnTimerUpdate { remaining_seconds });
        }

        let Some(handle) = task_ctx.registry.get(&room) else {
            return;
        };
        let effects = {
            let mut session = handle.session.lock().expect("room session poisoned");
            if session.sched_gen != generation {
                return;
            }
            info!(room = %room, "turn timer expired, forcing action");
            let mut effects = session.handle_timeout(now_ms());
            let _ = publish(&handle, &mut effects);
            effects
        };
        apply_schedules(&task_ctx, &room, effects);
    }));
}

/// Schedule one AI action after the configured pacing delay.
fn schedule_ai_step(ctx: &ServerContext, room_id: &str, handle: &RoomHandle) {
    let delay_ms = ctx.config.ai_move_delay_ms;
    let mut session = handle.session.lock().expect("room session poisoned");
    session.sched_gen = session.sched_gen.wrapping_add(1);
    let generation = session.sched_gen;
    if let Some(previous) = session.ai_handle.take() {
        previous.abort();
    }

    let task_ctx = ctx.clone();
    let room = room_id.to_string();
    session.ai_handle = Some(tokio::spawn(async move {
        time::sleep(Duration::from_millis(delay_ms)).await;
        let Some(handle) = task_ctx.registry.get(&room) else {
            return;
        };
        let effects = {
            let mut session = handle.session.lock().expect("room session poisoned");
            if session.sched_gen != generation {
                return;
            }
            let mut effects = session.handle_ai_step(now_ms());
            let _ = publish(&handle, &mut effects);
            effects
        };
        apply_schedules(&task_ctx, &room, effects);
    }));
}

/// Authorize the winner's payout and announce the ticket. Oracle failure is
/// retryable (`claim_payout`) and never blocks or corrupts game state.
fn spawn_payout_task(ctx: ServerContext, room_id: String, due: PayoutDue) {
    tokio::spawn(async move {
        let result = ctx
            .payout_authority
            .authorize(&room_id, &due.winner_address, due.amount, now_ms())
            .await;
        let Some(handle) = ctx.registry.get(&room_id) else {
            return;
        };
        match result {
            Ok(ticket) => {
                info!(room = %room_id, winner = %due.winner_address, amount = due.amount, "payout authorized");
                let mut session = handle.session.lock().expect("room session poisoned");
                let mut effects = session.store_payout_ticket(ticket);
                let _ = publish(&handle, &mut effects);
            }
            Err(err) => {
                warn!(room = %room_id, ?err, "payout authorization failed");
                let _ = handle.events.send(ServerMessage::GameError {
                    message: "payout authorization unavailable, retry with claim_payout"
                        .to_string(),
                });
            }
        }
    });
}
