//! Ludovault execution layer.
//!
//! This crate contains the deterministic game logic for four-color token
//! race matches: board topology, the movement engine, the rules/turn state
//! machine, and the heuristic AI move selector.
//!
//! ## Determinism requirements
//! - No wall-clock time inside execution.
//! - No ambient randomness; dice and AI tie-breaks draw only from the
//!   [`DiceRng`] handed in by the caller.
//! - Transition functions are total and pure: they take a state by reference
//!   and return a new state, never mutating the caller's copy. The match
//!   server is the only component that replaces the authoritative state, and
//!   it does so exclusively through these functions.

pub mod ai;
pub mod board;
pub mod movement;
pub mod rng;
pub mod rules;

#[cfg(test)]
mod integration_tests;

pub use ai::select_move;
pub use board::{cell_at, is_safe_cell, path_for, start_cell, verify_board, Cell};
pub use movement::{calculate_move, is_blockade, valid_moves_for};
pub use rng::DiceRng;
pub use rules::{
    complete_move, create_initial_state, forfeit_turn, move_token, roll_dice, roll_dice_with,
    GameError,
};
