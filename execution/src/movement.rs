//! Movement engine.
//!
//! Pure candidate-move computation: given a board layout and a step count,
//! resolve the destination, the traversed cells, blockade legality, and the
//! capture set. Nothing here mutates state; the rules engine consumes the
//! returned [`MoveCandidate`] values.

use ludovault_types::{
    CaptureEvent, GameState, MoveCandidate, TokenPosition, ENTRY_ROLL, FINAL_PATH_INDEX,
    TOKENS_PER_PLAYER,
};

use crate::board::{cell_at, is_safe_cell, start_cell, Cell};

/// Tokens of any active color occupying `cell`.
fn occupants_of(state: &GameState, cell: Cell) -> Vec<(u8, u8)> {
    let mut occupants = Vec::new();
    for color in &state.active_colors {
        for (token_index, position) in state.tokens_of(*color).iter().enumerate() {
            if let Some(index) = position.path_index() {
                if cell_at(*color, index) == cell {
                    occupants.push((*color, token_index as u8));
                }
            }
        }
    }
    occupants
}

/// A blockade is two or more same-color tokens on one shared-loop cell.
/// Home-stretch cells never form blockades, and a blockade blocks every
/// color, the owning color included.
pub fn is_blockade(state: &GameState, cell: Cell) -> bool {
    if !cell.is_loop() {
        return false;
    }
    for color in &state.active_colors {
        let stacked = state
            .tokens_of(*color)
            .iter()
            .filter_map(TokenPosition::path_index)
            .filter(|index| cell_at(*color, *index) == cell)
            .count();
        if stacked >= 2 {
            return true;
        }
    }
    false
}

/// Opposing tokens captured by landing on `cell`.
///
/// Safe cells grant immunity, with one exception: a spawning token captures
/// enemies sitting on its own start cell. Home-stretch cells are unreachable
/// by opponents, so the guard there is defensive.
fn captures_at(state: &GameState, player: u8, cell: Cell, is_spawn: bool) -> Vec<CaptureEvent> {
    if !cell.is_loop() {
        return Vec::new();
    }
    if is_safe_cell(cell) && !is_spawn {
        return Vec::new();
    }
    occupants_of(state, cell)
        .into_iter()
        .filter(|(color, _)| *color != player)
        .map(|(color, token_index)| CaptureEvent {
            player: color,
            token_index,
        })
        .collect()
}

/// Compute the candidate move for one token, or `None` when it is illegal.
///
/// Legality rules:
/// - yard exit requires the entry roll and an unblockaded start cell;
/// - finished tokens never move;
/// - exact entry: overshooting the final home cell invalidates the move;
/// - a move may neither pass through nor land on a blockade.
pub fn calculate_move(
    state: &GameState,
    player: u8,
    token_index: u8,
    steps: u8,
) -> Option<MoveCandidate> {
    if steps == 0 {
        return None;
    }
    let position = state.tokens_of(player)[token_index as usize];
    match position {
        TokenPosition::Finished => None,
        TokenPosition::InYard => {
            if steps != ENTRY_ROLL {
                return None;
            }
            let entry = start_cell(player);
            if is_blockade(state, entry) {
                return None;
            }
            Some(MoveCandidate {
                token_index,
                from_position: position,
                to_position: TokenPosition::OnPath(0),
                traverse_path: vec![TokenPosition::OnPath(0)],
                is_spawn: true,
                is_home: false,
                captures: captures_at(state, player, entry, true),
            })
        }
        TokenPosition::OnPath(from_index) => {
            let target = from_index as u16 + steps as u16;
            if target > FINAL_PATH_INDEX as u16 {
                return None;
            }
            let target = target as u8;

            // Movement cannot pass through a blockade even without landing
            // on it; the destination itself must be clear too.
            let mut traverse_path = Vec::with_capacity(steps as usize);
            for index in (from_index + 1)..=target {
                if index == FINAL_PATH_INDEX {
                    traverse_path.push(TokenPosition::Finished);
                } else {
                    if is_blockade(state, cell_at(player, index)) {
                        return None;
                    }
                    traverse_path.push(TokenPosition::OnPath(index));
                }
            }

            if target == FINAL_PATH_INDEX {
                Some(MoveCandidate {
                    token_index,
                    from_position: position,
                    to_position: TokenPosition::Finished,
                    traverse_path,
                    is_spawn: false,
                    is_home: true,
                    captures: Vec::new(),
                })
            } else {
                Some(MoveCandidate {
                    token_index,
                    from_position: position,
                    to_position: TokenPosition::OnPath(target),
                    traverse_path,
                    is_spawn: false,
                    is_home: false,
                    captures: captures_at(state, player, cell_at(player, target), false),
                })
            }
        }
    }
}

/// All legal moves for `player` given `steps`, in token order.
pub fn valid_moves_for(state: &GameState, player: u8, steps: u8) -> Vec<MoveCandidate> {
    (0..TOKENS_PER_PLAYER as u8)
        .filter_map(|token_index| calculate_move(state, player, token_index, steps))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::create_initial_state;
    use ludovault_types::GamePhase;

    fn two_player_state() -> GameState {
        create_initial_state(&[0, 1]).unwrap()
    }

    fn place(state: &mut GameState, player: u8, token_index: usize, position: TokenPosition) {
        state.tokens[player as usize][token_index] = position;
    }

    #[test]
    fn test_yard_exit_requires_entry_roll() {
        let state = two_player_state();
        for steps in 1..=5 {
            assert!(calculate_move(&state, 0, 0, steps).is_none());
        }
        let spawn = calculate_move(&state, 0, 0, 6).unwrap();
        assert!(spawn.is_spawn);
        assert_eq!(spawn.to_position, TokenPosition::OnPath(0));
        assert!(spawn.captures.is_empty());
    }

    #[test]
    fn test_finished_token_never_moves() {
        let mut state = two_player_state();
        place(&mut state, 0, 0, TokenPosition::Finished);
        for steps in 1..=6 {
            assert!(calculate_move(&state, 0, 0, steps).is_none());
        }
    }

    #[test]
    fn test_exact_entry_enforced() {
        let mut state = two_player_state();
        place(&mut state, 0, 0, TokenPosition::OnPath(55));
        // 55 + 2 = 57 lands exactly on the finish.
        let home = calculate_move(&state, 0, 0, 2).unwrap();
        assert!(home.is_home);
        assert_eq!(home.to_position, TokenPosition::Finished);
        // Any overshoot is illegal, not truncated.
        assert!(calculate_move(&state, 0, 0, 3).is_none());
        assert!(calculate_move(&state, 0, 0, 6).is_none());
    }

    #[test]
    fn test_blockade_blocks_pass_through_and_landing() {
        let mut state = two_player_state();
        // Player 1 stacks two tokens on absolute cell 20 (their index 7).
        place(&mut state, 1, 0, TokenPosition::OnPath(7));
        place(&mut state, 1, 1, TokenPosition::OnPath(7));
        place(&mut state, 0, 0, TokenPosition::OnPath(18));

        // Passing through absolute 20 is illegal...
        assert!(calculate_move(&state, 0, 0, 5).is_none());
        // ...as is landing on it exactly...
        assert!(calculate_move(&state, 0, 0, 2).is_none());
        // ...but stopping short is fine.
        assert!(calculate_move(&state, 0, 0, 1).is_some());
    }

    #[test]
    fn test_blockade_blocks_own_color() {
        let mut state = two_player_state();
        place(&mut state, 0, 0, TokenPosition::OnPath(10));
        place(&mut state, 0, 1, TokenPosition::OnPath(10));
        place(&mut state, 0, 2, TokenPosition::OnPath(8));
        // The strict rule: a blockade is impassable even for its own color.
        assert!(calculate_move(&state, 0, 2, 2).is_none());
        assert!(calculate_move(&state, 0, 2, 4).is_none());
    }

    #[test]
    fn test_blockade_on_start_cell_blocks_spawn() {
        let mut state = two_player_state();
        // Player 1 blockades player 0's start cell (absolute 0 = their index 39).
        place(&mut state, 1, 0, TokenPosition::OnPath(39));
        place(&mut state, 1, 1, TokenPosition::OnPath(39));
        assert!(calculate_move(&state, 0, 0, 6).is_none());
    }

    #[test]
    fn test_capture_on_landing() {
        let mut state = two_player_state();
        // Player 0 moving to absolute 15; player 1's token sits there (their index 2).
        place(&mut state, 0, 0, TokenPosition::OnPath(10));
        place(&mut state, 1, 0, TokenPosition::OnPath(2));
        let capture = calculate_move(&state, 0, 0, 5).unwrap();
        assert_eq!(
            capture.captures,
            vec![CaptureEvent {
                player: 1,
                token_index: 0
            }]
        );
    }

    #[test]
    fn test_safe_cell_grants_capture_immunity() {
        let mut state = two_player_state();
        // Absolute 21 is a star cell; player 1 sits there (their index 8).
        place(&mut state, 0, 0, TokenPosition::OnPath(16));
        place(&mut state, 1, 0, TokenPosition::OnPath(8));
        let landing = calculate_move(&state, 0, 0, 5).unwrap();
        assert_eq!(landing.to_position, TokenPosition::OnPath(21));
        assert!(landing.captures.is_empty());
    }

    #[test]
    fn test_spawn_captures_enemy_on_own_start() {
        let mut state = two_player_state();
        // Player 1 single sits on player 0's start (absolute 0 = their index 39).
        place(&mut state, 1, 0, TokenPosition::OnPath(39));
        let spawn = calculate_move(&state, 0, 0, 6).unwrap();
        assert_eq!(
            spawn.captures,
            vec![CaptureEvent {
                player: 1,
                token_index: 0
            }]
        );
    }

    #[test]
    fn test_own_tokens_are_never_captured() {
        let mut state = two_player_state();
        place(&mut state, 0, 0, TokenPosition::OnPath(10));
        place(&mut state, 0, 1, TokenPosition::OnPath(15));
        let landing = calculate_move(&state, 0, 0, 5).unwrap();
        assert!(landing.captures.is_empty());
    }

    #[test]
    fn test_home_stretch_cells_never_form_blockades() {
        let mut state = two_player_state();
        place(&mut state, 0, 0, TokenPosition::OnPath(50));
        // Two own tokens stacked inside the home stretch are not a blockade;
        // only shared-loop cells can be blockaded.
        place(&mut state, 0, 1, TokenPosition::OnPath(53));
        place(&mut state, 0, 2, TokenPosition::OnPath(53));
        let landing = calculate_move(&state, 0, 0, 4).unwrap();
        assert_eq!(landing.to_position, TokenPosition::OnPath(54));
        assert!(landing.captures.is_empty());
    }

    #[test]
    fn test_valid_moves_for_respects_phase_independent_layout() {
        let mut state = two_player_state();
        state.game_phase = GamePhase::SelectToken;
        place(&mut state, 0, 0, TokenPosition::OnPath(3));
        place(&mut state, 0, 1, TokenPosition::Finished);
        let moves = valid_moves_for(&state, 0, 4);
        // Token 0 can advance; tokens 1 (finished), 2 and 3 (yard, not a 6) cannot.
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].token_index, 0);

        let moves = valid_moves_for(&state, 0, 6);
        // A six offers the path move plus both yard exits.
        assert_eq!(moves.len(), 3);
    }

    #[test]
    fn test_traverse_path_lists_every_cell() {
        let mut state = two_player_state();
        place(&mut state, 0, 0, TokenPosition::OnPath(3));
        let candidate = calculate_move(&state, 0, 0, 3).unwrap();
        assert_eq!(
            candidate.traverse_path,
            vec![
                TokenPosition::OnPath(4),
                TokenPosition::OnPath(5),
                TokenPosition::OnPath(6)
            ]
        );
    }
}
