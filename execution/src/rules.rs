//! Rules/turn engine.
//!
//! A pure state machine over [`GamePhase`]:
//! `ROLL_DICE -> {SELECT_TOKEN | BONUS_MOVE} -> ROLL_DICE (same or next
//! player) -> ... -> WIN`. Every transition takes the current state by
//! reference and returns a fresh state; the caller decides what to do with
//! it. Dice values enter either from a [`DiceRng`] or, for tests and replay,
//! as forced values via [`roll_dice_with`].

use ludovault_types::{
    GamePhase, GameState, LastCapture, MoveCandidate, TokenPosition, CAPTURE_BONUS, HOME_BONUS,
    MAX_CONSECUTIVE_SIXES, MAX_PLAYERS, TOKENS_PER_PLAYER,
};
use thiserror::Error;

use crate::movement::valid_moves_for;
use crate::rng::{DiceRng, DIE_FACES};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("action is not legal in phase {}", .0.as_str())]
    WrongPhase(GamePhase),
    #[error("match already has a winner")]
    GameAlreadyComplete,
    #[error("dice value {0} out of range")]
    InvalidRoll(u8),
    #[error("selected move is not in the current valid set")]
    InvalidMove,
    #[error("invalid match configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Fresh state for a match between the given colors, in turn order.
pub fn create_initial_state(colors: &[u8]) -> Result<GameState, GameError> {
    if !(2..=MAX_PLAYERS).contains(&colors.len()) {
        return Err(GameError::InvalidConfig("a match takes 2-4 players"));
    }
    for (index, color) in colors.iter().enumerate() {
        if *color as usize >= MAX_PLAYERS {
            return Err(GameError::InvalidConfig("player slot out of range"));
        }
        if colors[..index].contains(color) {
            return Err(GameError::InvalidConfig("duplicate player slot"));
        }
    }
    Ok(GameState {
        tokens: [[TokenPosition::InYard; TOKENS_PER_PLAYER]; MAX_PLAYERS],
        active_player: colors[0],
        active_colors: colors.to_vec(),
        game_phase: GamePhase::RollDice,
        dice_value: 0,
        valid_moves: Vec::new(),
        consecutive_sixes: 0,
        bonus_moves: 0,
        winner: None,
        last_capture: None,
    })
}

/// Hand the turn to the next active color.
fn advance_turn(state: &mut GameState) {
    state.active_player = state.next_active_color(state.active_player);
    state.consecutive_sixes = 0;
    state.bonus_moves = 0;
    state.game_phase = GamePhase::RollDice;
    state.valid_moves.clear();
}

/// Roll using the room's dice stream.
pub fn roll_dice(state: &GameState, rng: &mut DiceRng) -> Result<GameState, GameError> {
    let value = rng.roll_die();
    roll_dice_with(state, value)
}

/// Apply a known dice value. The test/replay hook behind [`roll_dice`].
pub fn roll_dice_with(state: &GameState, value: u8) -> Result<GameState, GameError> {
    if state.winner.is_some() {
        return Err(GameError::GameAlreadyComplete);
    }
    if state.game_phase != GamePhase::RollDice {
        return Err(GameError::WrongPhase(state.game_phase));
    }
    if !(1..=DIE_FACES).contains(&value) {
        return Err(GameError::InvalidRoll(value));
    }

    let mut next = state.clone();
    next.dice_value = value;
    if value == DIE_FACES {
        next.consecutive_sixes += 1;
    } else {
        next.consecutive_sixes = 0;
    }

    // Triple-six penalty: the turn is forfeited before any move phase,
    // regardless of whether a move would have been available.
    if next.consecutive_sixes >= MAX_CONSECUTIVE_SIXES {
        advance_turn(&mut next);
        return Ok(next);
    }

    next.valid_moves = valid_moves_for(&next, next.active_player, value);
    if next.valid_moves.is_empty() {
        advance_turn(&mut next);
    } else {
        next.game_phase = GamePhase::SelectToken;
    }
    Ok(next)
}

/// Apply a selected move. The candidate must come from the state's current
/// `valid_moves`; anything else is rejected without mutation. Turn handoff
/// is left to [`complete_move`].
pub fn move_token(state: &GameState, candidate: &MoveCandidate) -> Result<GameState, GameError> {
    if state.winner.is_some() {
        return Err(GameError::GameAlreadyComplete);
    }
    if !state.game_phase.accepts_move() {
        return Err(GameError::WrongPhase(state.game_phase));
    }
    if !state.valid_moves.contains(candidate) {
        return Err(GameError::InvalidMove);
    }

    let mut next = state.clone();
    let mover = next.active_player;
    next.tokens[mover as usize][candidate.token_index as usize] = candidate.to_position;

    for capture in &candidate.captures {
        next.tokens[capture.player as usize][capture.token_index as usize] = TokenPosition::InYard;
        next.bonus_moves += CAPTURE_BONUS;
    }
    if let Some(first) = candidate.captures.first() {
        next.last_capture = Some(LastCapture {
            by: mover,
            player: first.player,
            token_index: first.token_index,
        });
    }
    if candidate.is_home {
        next.bonus_moves += HOME_BONUS;
    }

    next.valid_moves.clear();
    Ok(next)
}

/// Resolve the phase after a move: win detection, bonus consumption, six
/// re-roll, or turn handoff. Kept separate from [`move_token`] so clients
/// can finish their move animation first; the server calls it synchronously.
pub fn complete_move(state: &GameState) -> GameState {
    let mut next = state.clone();
    if next.game_phase == GamePhase::Win {
        return next;
    }

    let mover = next.active_player;
    if next.all_tokens_home(mover) {
        next.winner = Some(mover);
        next.game_phase = GamePhase::Win;
        next.valid_moves.clear();
        return next;
    }

    if next.bonus_moves > 0 {
        // The accumulated bonus becomes the next dice value. Note this
        // overwrites the rolled value, so a bonus chain supersedes the
        // six re-roll below.
        let bonus = next.bonus_moves.min(u8::MAX as u16) as u8;
        next.dice_value = bonus;
        next.bonus_moves = 0;
        next.valid_moves = valid_moves_for(&next, mover, bonus);
        if !next.valid_moves.is_empty() {
            next.game_phase = GamePhase::BonusMove;
            return next;
        }
        // No legal bonus move: the credit is forfeited and normal
        // turn-handoff logic applies.
    }

    if next.dice_value == DIE_FACES {
        next.game_phase = GamePhase::RollDice;
        next.valid_moves.clear();
    } else {
        advance_turn(&mut next);
    }
    next
}

/// Skip the active player's turn outright. Used for triple-timeout and
/// forfeited seats; a completed match is left untouched.
pub fn forfeit_turn(state: &GameState) -> GameState {
    let mut next = state.clone();
    if next.game_phase == GamePhase::Win {
        return next;
    }
    advance_turn(&mut next);
    next
}
