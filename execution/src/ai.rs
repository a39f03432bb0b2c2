//! Heuristic move selector for AI-controlled seats.
//!
//! Scores every candidate in the state's current `valid_moves` and picks
//! one, breaking near-ties with weighted randomness so AI play is not fully
//! scripted. Pure: reads state, draws only from the caller's [`DiceRng`].
//!
//! Danger is estimated with plain mod-52 distance on the shared loop,
//! deliberately ignoring each opponent's home-stretch peel-off point. The
//! estimate is slightly wrong near the peel-off boundary; it is kept
//! as-is because the selector is advisory, never authoritative.

use ludovault_types::{GameState, MoveCandidate, TokenPosition, HOME_STRETCH_START, LOOP_CELLS};

use crate::board::{cell_at, is_safe_cell, Cell};
use crate::rng::DiceRng;

const CAPTURE_WEIGHT: f64 = 40.0;
/// Per step of the victim's progress: late captures hurt opponents more.
const CAPTURE_ADVANCE_WEIGHT: f64 = 1.5;
const FINISH_WEIGHT: f64 = 35.0;
const HOME_STRETCH_WEIGHT: f64 = 25.0;
const SAFE_CELL_WEIGHT: f64 = 15.0;
const SAFE_ESCAPE_EXTRA: f64 = 10.0;
const ESCAPE_WEIGHT: f64 = 18.0;
const SPAWN_WEIGHT: f64 = 20.0;
const EMPTY_BOARD_SPAWN_EXTRA: f64 = 15.0;
const ADVANCE_WEIGHT: f64 = 0.5;
const DANGER_PENALTY: f64 = 12.0;
/// Candidates within this margin of the best score enter the random pick.
const TIE_MARGIN: f64 = 4.0;

/// True when an opponent could land exactly on `player`'s relative cell
/// with a single 1-6 roll. Home-stretch and safe cells are never dangerous.
fn is_dangerous(state: &GameState, player: u8, index: u8) -> bool {
    if index >= HOME_STRETCH_START {
        return false;
    }
    let cell = cell_at(player, index);
    if is_safe_cell(cell) {
        return false;
    }
    let Cell::Loop(absolute) = cell else {
        return false;
    };
    for color in &state.active_colors {
        if *color == player {
            continue;
        }
        for position in state.tokens_of(*color) {
            let Some(their_index) = position.path_index() else {
                continue;
            };
            if their_index >= HOME_STRETCH_START {
                continue;
            }
            let Cell::Loop(their_absolute) = cell_at(*color, their_index) else {
                continue;
            };
            let distance = (absolute + LOOP_CELLS - their_absolute) % LOOP_CELLS;
            if (1..=6).contains(&distance) {
                return true;
            }
        }
    }
    false
}

fn score_move(state: &GameState, candidate: &MoveCandidate) -> f64 {
    let player = state.active_player;
    let mut score = 0.0;

    for capture in &candidate.captures {
        let victim_progress = state.tokens[capture.player as usize][capture.token_index as usize]
            .path_index()
            .unwrap_or(0);
        score += CAPTURE_WEIGHT + victim_progress as f64 * CAPTURE_ADVANCE_WEIGHT;
    }

    if candidate.is_home {
        score += FINISH_WEIGHT;
    }

    let from_danger = candidate
        .from_position
        .path_index()
        .is_some_and(|index| is_dangerous(state, player, index));

    match candidate.to_position {
        TokenPosition::Finished => {
            score += 57.0 * ADVANCE_WEIGHT;
        }
        TokenPosition::OnPath(to_index) => {
            score += to_index as f64 * ADVANCE_WEIGHT;

            if is_safe_cell(cell_at(player, to_index)) {
                score += SAFE_CELL_WEIGHT;
                if from_danger {
                    score += SAFE_ESCAPE_EXTRA;
                }
            }
            if to_index >= HOME_STRETCH_START && !candidate.from_position.in_home_stretch() {
                score += HOME_STRETCH_WEIGHT;
            }

            let to_danger = is_dangerous(state, player, to_index);
            if from_danger && !to_danger {
                score += ESCAPE_WEIGHT;
            }
            if to_danger {
                score -= DANGER_PENALTY;
            }
        }
        TokenPosition::InYard => {}
    }

    if candidate.is_spawn {
        score += SPAWN_WEIGHT;
        if state.tokens_on_board(player) == 0 {
            score += EMPTY_BOARD_SPAWN_EXTRA;
        }
    }

    score
}

/// Pick a move for the active player from the current `valid_moves`.
/// Returns `None` only when no legal move exists.
pub fn select_move(state: &GameState, rng: &mut DiceRng) -> Option<MoveCandidate> {
    if state.valid_moves.is_empty() {
        return None;
    }

    let scored: Vec<(f64, &MoveCandidate)> = state
        .valid_moves
        .iter()
        .map(|candidate| (score_move(state, candidate), candidate))
        .collect();
    let best = scored
        .iter()
        .map(|(score, _)| *score)
        .fold(f64::NEG_INFINITY, f64::max);

    // Weighted random among near-ties; clearly dominated moves drop out.
    let contenders: Vec<&(f64, &MoveCandidate)> = scored
        .iter()
        .filter(|(score, _)| *score >= best - TIE_MARGIN)
        .collect();
    let weights: Vec<f64> = contenders
        .iter()
        .map(|(score, _)| score - best + TIE_MARGIN + 1.0)
        .collect();
    let picked = rng.pick_weighted(&weights);
    Some(contenders[picked].1.clone())
}
