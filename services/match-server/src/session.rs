//! Per-room session orchestrator.
//!
//! A [`RoomSession`] owns one room's authoritative [`GameState`] and all of
//! its bookkeeping: roster, skip counters, forfeitures, and scheduling
//! generations. It is the only component that replaces the state, and it
//! does so exclusively through the pure transition functions in
//! `ludovault-execution`.
//!
//! Handlers are synchronous and return [`Effects`]: the outgoing messages
//! plus timer/AI/payout directives as data. The websocket and timer layers
//! perform the actual sends and task spawns, which keeps everything here
//! testable without a network or a runtime. Each room is serialized by the
//! mutex around its session; rooms share no mutable state with each other.

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use ludovault_execution::{
    complete_move, create_initial_state, forfeit_turn, move_token, roll_dice, select_move,
    DiceRng, GameError,
};
use ludovault_types::{
    GamePhase, GameState, MoveCandidate, PayoutTicket, PlayerSeat, RoomRecord, RoomStatus,
    ServerMessage,
};
use std::collections::HashMap;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("address does not hold a seat in this room")]
    UnknownMember,
    #[error("room is not accepting new players")]
    NotJoinable,
    #[error("room is full")]
    RoomFull,
    #[error("match has not started")]
    MatchNotStarted,
    #[error("not your turn")]
    NotYourTurn,
    #[error("match is not finished")]
    MatchNotFinished,
    #[error("only the winner can claim the payout")]
    NotTheWinner,
    #[error("token {0} has no legal move")]
    InvalidToken(u8),
    #[error(transparent)]
    Engine(#[from] GameError),
}

/// Where a message goes: the whole room, or just the requesting client.
#[derive(Clone, Debug, PartialEq)]
pub enum Outgoing {
    Broadcast(ServerMessage),
    Direct(ServerMessage),
}

/// What the async layer should do with the turn timer after a handler ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimerAction {
    /// Leave whatever is armed in place.
    #[default]
    Keep,
    /// Cancel any pending timer and arm a fresh one for the active player.
    Arm,
    Cancel,
}

/// Payout authorization request emitted once per completed match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutDue {
    pub winner_address: String,
    pub amount: u64,
}

/// Handler output: broadcasts go out through `timer::publish` while the
/// session lock is still held, scheduling runs via `timer::apply_schedules`
/// afterwards.
#[derive(Debug, Default)]
pub struct Effects {
    pub outgoing: Vec<Outgoing>,
    pub timer: TimerAction,
    /// Schedule a (delayed) AI step for the active seat.
    pub schedule_ai: bool,
    pub payout_due: Option<PayoutDue>,
}

impl Effects {
    fn broadcast(&mut self, message: ServerMessage) {
        self.outgoing.push(Outgoing::Broadcast(message));
    }

    fn direct(&mut self, message: ServerMessage) {
        self.outgoing.push(Outgoing::Direct(message));
    }
}

pub struct RoomSession {
    pub record: RoomRecord,
    /// Authoritative state; `None` until the roster fills.
    pub state: Option<GameState>,
    rng: DiceRng,
    max_skips: u8,
    pub last_activity_ms: u64,
    /// Set while zero humans are connected; drives abandoned-room cleanup.
    pub all_disconnected_since_ms: Option<u64>,
    /// Per-slot disconnect timestamps for the absence sweep.
    disconnected_since_ms: HashMap<u8, u64>,
    /// Invalidates in-flight timer/AI tasks; bumped on every (re)arm.
    pub sched_gen: u64,
    pub timer_handle: Option<JoinHandle<()>>,
    pub ai_handle: Option<JoinHandle<()>>,
    pub payout_ticket: Option<PayoutTicket>,
    payout_requested: bool,
}

impl RoomSession {
    pub fn new(record: RoomRecord, rng: DiceRng, max_skips: u8, now_ms: u64) -> Self {
        Self {
            record,
            state: None,
            rng,
            max_skips,
            last_activity_ms: now_ms,
            all_disconnected_since_ms: None,
            disconnected_since_ms: HashMap::new(),
            sched_gen: 0,
            timer_handle: None,
            ai_handle: None,
            payout_ticket: None,
            payout_requested: false,
        }
    }

    fn seat_name(&self, slot: u8) -> String {
        self.record
            .seat_by_slot(slot)
            .map(|seat| seat.name.clone())
            .unwrap_or_else(|| format!("player {slot}"))
    }

    fn state_update(&self, msg: impl Into<String>) -> ServerMessage {
        // Clients always get a value snapshot, never a live reference.
        ServerMessage::StateUpdate {
            state: self.state.clone().unwrap_or_else(|| {
                // Only reachable for rooms that have started.
                unreachable!("state_update before match start")
            }),
            msg: msg.into(),
        }
    }

    /// Attach or reattach `address` to a seat. New addresses claim the next
    /// free slot while the room is waiting; known addresses reattach at any
    /// time and receive the current snapshot, as if never interrupted.
    pub fn handle_join(&mut self, address: &str, now_ms: u64) -> Result<Effects, SessionError> {
        let mut effects = Effects::default();
        self.last_activity_ms = now_ms;

        if let Some(seat) = self.record.seat_by_address_mut(address) {
            let slot = seat.slot;
            seat.connected = true;
            self.all_disconnected_since_ms = None;
            self.disconnected_since_ms.remove(&slot);
            if self.state.is_some() {
                info!(room = %self.record.id, address, "player reattached");
                effects.direct(self.state_update(format!("{} reconnected", self.seat_name(slot))));
            }
        } else {
            if self.record.status != RoomStatus::Waiting {
                return Err(SessionError::NotJoinable);
            }
            if self.record.is_full() {
                return Err(SessionError::RoomFull);
            }
            let slot = (0..self.record.max_players)
                .find(|candidate| self.record.seat_by_slot(*candidate).is_none())
                .ok_or(SessionError::RoomFull)?;
            let mut seat = PlayerSeat::human(address, short_name(address), slot);
            seat.connected = true;
            self.record.seats.push(seat);
            info!(room = %self.record.id, address, slot, "player joined");
        }

        // The final required player connecting is what starts the match;
        // AI seats count as always present.
        if self.record.status == RoomStatus::Waiting && self.roster_ready() {
            self.start_match(&mut effects)?;
        }
        Ok(effects)
    }

    fn roster_ready(&self) -> bool {
        self.record.is_full()
            && self
                .record
                .seats
                .iter()
                .all(|seat| seat.is_ai || seat.connected)
    }

    fn start_match(&mut self, effects: &mut Effects) -> Result<(), SessionError> {
        let colors: Vec<u8> = self.record.seats.iter().map(|seat| seat.slot).collect();
        let state = create_initial_state(&colors)?;
        self.record.status = RoomStatus::Active;
        self.state = Some(state.clone());
        info!(room = %self.record.id, players = colors.len(), "match started");
        effects.broadcast(ServerMessage::GameStarted {
            room: self.record.clone(),
            state,
        });
        self.post_transition(effects);
        Ok(())
    }

    /// Sender identity and phase checks shared by roll/move handlers.
    fn active_slot_of(&self, address: &str) -> Result<u8, SessionError> {
        let seat = self
            .record
            .seat_by_address(address)
            .ok_or(SessionError::UnknownMember)?;
        let state = self.state.as_ref().ok_or(SessionError::MatchNotStarted)?;
        if seat.slot != state.active_player {
            return Err(SessionError::NotYourTurn);
        }
        Ok(seat.slot)
    }

    pub fn handle_roll(&mut self, address: &str, now_ms: u64) -> Result<Effects, SessionError> {
        let slot = self.active_slot_of(address)?;
        let state = self.state.as_ref().ok_or(SessionError::MatchNotStarted)?;
        if state.game_phase != GamePhase::RollDice {
            return Err(SessionError::Engine(GameError::WrongPhase(state.game_phase)));
        }

        let was_two_sixes = state.consecutive_sixes == 2;
        let next = roll_dice(state, &mut self.rng)?;
        self.last_activity_ms = now_ms;
        if let Some(seat) = self.record.seat_by_slot_mut(slot) {
            seat.skip_count = 0;
        }

        let mut effects = Effects::default();
        self.finish_roll(slot, was_two_sixes, next, &mut effects);
        Ok(effects)
    }

    /// Shared tail of every roll (player, forced, or AI): emit `dice_rolled`
    /// before the snapshot, then re-plan timers.
    fn finish_roll(&mut self, slot: u8, was_two_sixes: bool, next: GameState, effects: &mut Effects) {
        let value = next.dice_value;
        let name = self.seat_name(slot);
        effects.broadcast(ServerMessage::DiceRolled {
            value,
            player_index: slot,
        });

        let msg = if value == 6 && was_two_sixes {
            format!("{name} rolled a third 6, turn forfeited")
        } else if next.valid_moves.is_empty() && next.active_player != slot {
            format!("{name} rolled a {value}: no legal moves, turn passes")
        } else {
            format!("{name} rolled a {value}")
        };

        self.state = Some(next);
        effects.broadcast(self.state_update(msg));
        self.post_transition(effects);
    }

    pub fn handle_move(
        &mut self,
        address: &str,
        token_index: u8,
        now_ms: u64,
    ) -> Result<Effects, SessionError> {
        let slot = self.active_slot_of(address)?;
        let state = self.state.as_ref().ok_or(SessionError::MatchNotStarted)?;
        if !state.game_phase.accepts_move() {
            return Err(SessionError::Engine(GameError::WrongPhase(state.game_phase)));
        }
        // The current valid-move set is the sole source of truth.
        let candidate = state
            .valid_moves
            .iter()
            .find(|candidate| candidate.token_index == token_index)
            .cloned()
            .ok_or(SessionError::InvalidToken(token_index))?;

        self.last_activity_ms = now_ms;
        if let Some(seat) = self.record.seat_by_slot_mut(slot) {
            seat.skip_count = 0;
        }
        let mut effects = Effects::default();
        self.apply_move(slot, &candidate, &mut effects)?;
        Ok(effects)
    }

    fn apply_move(
        &mut self,
        slot: u8,
        candidate: &MoveCandidate,
        effects: &mut Effects,
    ) -> Result<(), SessionError> {
        let state = self.state.as_ref().ok_or(SessionError::MatchNotStarted)?;
        let moved = move_token(state, candidate)?;
        let settled = complete_move(&moved);

        let name = self.seat_name(slot);
        let mut parts = if candidate.is_spawn {
            vec![format!("{name} brought a token out of the yard")]
        } else {
            vec![format!("{name} moved a token")]
        };
        for capture in &candidate.captures {
            parts.push(format!("captured {}'s token", self.seat_name(capture.player)));
        }
        if candidate.is_home {
            parts.push("token reached home".to_string());
        }
        if settled.game_phase == GamePhase::BonusMove {
            parts.push(format!("bonus move of {}", settled.dice_value));
        }
        if settled.winner == Some(slot) {
            parts.push(format!("{name} wins the match"));
        }

        self.state = Some(settled);
        effects.broadcast(self.state_update(parts.join(", ")));
        self.post_transition(effects);
        Ok(())
    }

    /// Turn-timer expiry (or absence past the threshold): synthesize the
    /// action the player failed to take, advancing state exactly as if the
    /// player had acted, and count the skip.
    pub fn handle_timeout(&mut self, now_ms: u64) -> Effects {
        let mut effects = Effects::default();
        let Some(state) = self.state.clone() else {
            effects.timer = TimerAction::Cancel;
            return effects;
        };
        if state.game_phase == GamePhase::Win {
            effects.timer = TimerAction::Cancel;
            return effects;
        }

        let slot = state.active_player;
        self.last_activity_ms = now_ms;
        let name = self.seat_name(slot);
        effects.broadcast(ServerMessage::TurnTimeout { player_name: name.clone() });

        let mut newly_forfeited = false;
        if let Some(seat) = self.record.seat_by_slot_mut(slot) {
            seat.skip_count = seat.skip_count.saturating_add(1);
            if seat.skip_count >= self.max_skips && !seat.forfeited {
                seat.forfeited = true;
                newly_forfeited = true;
            }
        }
        if newly_forfeited {
            info!(room = %self.record.id, slot, "seat forfeited after repeated timeouts");
        }

        match state.game_phase {
            GamePhase::RollDice => {
                let was_two_sixes = state.consecutive_sixes == 2;
                match roll_dice(&state, &mut self.rng) {
                    Ok(next) => self.finish_roll(slot, was_two_sixes, next, &mut effects),
                    // Unreachable given the phase check; forfeit the turn
                    // exactly as a manual timeout would.
                    Err(_) => self.skip_turn(slot, &mut effects),
                }
            }
            GamePhase::SelectToken | GamePhase::BonusMove => {
                let picked = state.valid_moves[self.rng.pick_index(state.valid_moves.len())].clone();
                if self.apply_move(slot, &picked, &mut effects).is_err() {
                    self.skip_turn(slot, &mut effects);
                }
            }
            GamePhase::Win => {}
        }
        effects
    }

    fn skip_turn(&mut self, slot: u8, effects: &mut Effects) {
        if let Some(state) = self.state.as_ref() {
            let next = forfeit_turn(state);
            self.state = Some(next);
            effects.broadcast(
                self.state_update(format!("{}'s turn was skipped", self.seat_name(slot))),
            );
            self.post_transition(effects);
        }
    }

    /// One scheduled AI action: a roll, or a heuristic selection.
    pub fn handle_ai_step(&mut self, now_ms: u64) -> Effects {
        let mut effects = Effects::default();
        let Some(state) = self.state.clone() else {
            return effects;
        };
        let slot = state.active_player;
        let is_ai = self
            .record
            .seat_by_slot(slot)
            .is_some_and(|seat| seat.is_ai);
        if !is_ai || state.game_phase == GamePhase::Win {
            return effects;
        }
        self.last_activity_ms = now_ms;

        match state.game_phase {
            GamePhase::RollDice => {
                let was_two_sixes = state.consecutive_sixes == 2;
                match roll_dice(&state, &mut self.rng) {
                    Ok(next) => self.finish_roll(slot, was_two_sixes, next, &mut effects),
                    Err(_) => self.skip_turn(slot, &mut effects),
                }
            }
            GamePhase::SelectToken | GamePhase::BonusMove => {
                match select_move(&state, &mut self.rng) {
                    Some(picked) => {
                        if self.apply_move(slot, &picked, &mut effects).is_err() {
                            self.skip_turn(slot, &mut effects);
                        }
                    }
                    // A move phase always has candidates; defensively treat
                    // the impossible case as a skipped turn.
                    None => self.skip_turn(slot, &mut effects),
                }
            }
            GamePhase::Win => {}
        }
        effects
    }

    /// Connection dropped. Never forfeits by itself: state is retained and a
    /// later join with the same address reattaches seamlessly.
    pub fn handle_disconnect(&mut self, address: &str, now_ms: u64) -> Effects {
        if let Some(seat) = self.record.seat_by_address_mut(address) {
            let slot = seat.slot;
            seat.connected = false;
            self.disconnected_since_ms.insert(slot, now_ms);
            info!(room = %self.record.id, address, "player disconnected");
        }
        if self.record.connected_humans() == 0 && self.all_disconnected_since_ms.is_none() {
            self.all_disconnected_since_ms = Some(now_ms);
        }
        Effects::default()
    }

    pub fn handle_claim_payout(&mut self, address: &str) -> Result<Effects, SessionError> {
        if self.record.status != RoomStatus::Finished {
            return Err(SessionError::MatchNotFinished);
        }
        let winner = self
            .state
            .as_ref()
            .and_then(|state| state.winner)
            .ok_or(SessionError::MatchNotFinished)?;
        let seat = self
            .record
            .seat_by_address(address)
            .ok_or(SessionError::UnknownMember)?;
        if seat.slot != winner {
            return Err(SessionError::NotTheWinner);
        }

        let mut effects = Effects::default();
        if let Some(ticket) = &self.payout_ticket {
            effects.direct(ServerMessage::PayoutReady {
                ticket: ticket.clone(),
            });
        } else {
            effects.payout_due = Some(PayoutDue {
                winner_address: seat.address.clone(),
                amount: self.record.pot(),
            });
        }
        Ok(effects)
    }

    /// Cache the authorized ticket and announce it to the room.
    pub fn store_payout_ticket(&mut self, ticket: PayoutTicket) -> Effects {
        self.payout_ticket = Some(ticket.clone());
        let mut effects = Effects::default();
        effects.broadcast(ServerMessage::PayoutReady { ticket });
        effects
    }

    /// Post-transition planning: auto-skip forfeited seats, then decide
    /// between win teardown, an AI step, or a fresh human turn timer.
    fn post_transition(&mut self, effects: &mut Effects) {
        // A forfeited seat's turns are passed without play. Bounded by the
        // roster size so an all-forfeited room cannot spin.
        for _ in 0..self.record.seats.len() {
            let Some(state) = self.state.as_ref() else { break };
            if state.game_phase == GamePhase::Win {
                break;
            }
            let slot = state.active_player;
            let forfeited = self
                .record
                .seat_by_slot(slot)
                .is_some_and(|seat| seat.forfeited);
            if !forfeited {
                break;
            }
            let next = forfeit_turn(state);
            self.state = Some(next);
            effects.broadcast(
                self.state_update(format!("{} forfeited, turn passes", self.seat_name(slot))),
            );
        }

        let Some(state) = self.state.as_ref() else {
            effects.timer = TimerAction::Cancel;
            return;
        };
        if state.game_phase == GamePhase::Win {
            self.record.status = RoomStatus::Finished;
            effects.timer = TimerAction::Cancel;
            effects.schedule_ai = false;
            if !self.payout_requested {
                self.payout_requested = true;
                if let Some(winner_seat) = state.winner.and_then(|slot| self.record.seat_by_slot(slot))
                {
                    effects.payout_due = Some(PayoutDue {
                        winner_address: winner_seat.address.clone(),
                        amount: self.record.pot(),
                    });
                }
            }
            return;
        }

        let active_is_ai = self
            .record
            .seat_by_slot(state.active_player)
            .is_some_and(|seat| seat.is_ai);
        if active_is_ai {
            effects.timer = TimerAction::Cancel;
            effects.schedule_ai = true;
        } else {
            effects.timer = TimerAction::Arm;
            effects.schedule_ai = false;
        }
    }

    /// Absence sweep: a disconnected human holding the turn past the
    /// threshold is treated exactly like a timer expiry.
    pub fn absence_timeout_due(&self, now_ms: u64, absence_timeout_ms: u64) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        if state.game_phase == GamePhase::Win {
            return false;
        }
        let slot = state.active_player;
        let is_human = self
            .record
            .seat_by_slot(slot)
            .is_some_and(|seat| !seat.is_ai && !seat.connected);
        if !is_human {
            return false;
        }
        self.disconnected_since_ms
            .get(&slot)
            .is_some_and(|since| now_ms.saturating_sub(*since) >= absence_timeout_ms)
    }

    /// Lifecycle predicate consumed by the registry's periodic sweep.
    pub fn should_cleanup(
        &self,
        now_ms: u64,
        waiting_max_age_ms: u64,
        abandoned_active_ms: u64,
    ) -> bool {
        match self.record.status {
            RoomStatus::Cancelled => true,
            RoomStatus::Waiting => {
                now_ms.saturating_sub(self.record.created_at_ms) >= waiting_max_age_ms
            }
            RoomStatus::Finished => self.record.connected_humans() == 0,
            RoomStatus::Active => self
                .all_disconnected_since_ms
                .is_some_and(|since| now_ms.saturating_sub(since) >= abandoned_active_ms),
        }
    }

    /// Abort every scheduled task. Called on room destruction; also bumps
    /// the generation so already-fired tasks become no-ops.
    pub fn teardown(&mut self) {
        self.sched_gen = self.sched_gen.wrapping_add(1);
        if let Some(handle) = self.timer_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.ai_handle.take() {
            handle.abort();
        }
    }
}

fn short_name(address: &str) -> String {
    let trimmed = address.trim_start_matches("0x");
    let cut = trimmed
        .char_indices()
        .nth(6)
        .map(|(index, _)| index)
        .unwrap_or(trimmed.len());
    trimmed[..cut].to_string()
}
