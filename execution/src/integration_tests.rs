//! Cross-module scenarios: full roll/move/complete flows and randomized
//! playouts checking the engine's reachable-state invariants.

use ludovault_types::{
    GamePhase, GameState, TokenPosition, CAPTURE_BONUS, MAX_PLAYERS, TOKENS_PER_PLAYER,
};
use proptest::prelude::*;

use crate::rng::DiceRng;
use crate::rules::{complete_move, create_initial_state, move_token, roll_dice, roll_dice_with};

#[test]
fn test_forced_six_spawn_round_trip() {
    let state = create_initial_state(&[0, 1]).unwrap();
    let before = state.clone();

    let rolled = roll_dice_with(&state, 6).unwrap();
    let spawn = rolled.valid_moves[0].clone();
    let moved = move_token(&rolled, &spawn).unwrap();
    let settled = complete_move(&moved);

    // The spawned token sits exactly on its start cell.
    assert_eq!(
        settled.tokens[0][spawn.token_index as usize],
        TokenPosition::OnPath(0)
    );
    // No other token moved.
    for player in 0..MAX_PLAYERS {
        for token_index in 0..TOKENS_PER_PLAYER {
            if player == 0 && token_index == spawn.token_index as usize {
                continue;
            }
            assert_eq!(
                settled.tokens[player][token_index],
                before.tokens[player][token_index]
            );
        }
    }
    // Six grants a re-roll.
    assert_eq!(settled.game_phase, GamePhase::RollDice);
    assert_eq!(settled.active_player, 0);
}

#[test]
fn test_capture_scenario_resets_victim_and_credits_bonus() {
    // Player 0 at relative 10; player 1's token aligned so a 5 lands on it
    // (absolute 15 = player 1's relative 2).
    let mut state = create_initial_state(&[0, 1]).unwrap();
    state.tokens[0][0] = TokenPosition::OnPath(10);
    state.tokens[1][0] = TokenPosition::OnPath(2);

    let rolled = roll_dice_with(&state, 5).unwrap();
    let capture = rolled
        .valid_moves
        .iter()
        .find(|candidate| !candidate.captures.is_empty())
        .cloned()
        .unwrap();
    let moved = move_token(&rolled, &capture).unwrap();

    assert_eq!(moved.tokens[1][0], TokenPosition::InYard);
    assert_eq!(moved.bonus_moves, CAPTURE_BONUS);
    assert!(moved.last_capture.is_some());
}

#[test]
fn test_blockade_scenario_empties_valid_moves_and_passes_turn() {
    // Player 1 blockades absolute 20; player 0's only board token at 18
    // cannot use a 5 (would cross the blockade) and nothing can spawn.
    let mut state = create_initial_state(&[0, 1]).unwrap();
    state.tokens[0][0] = TokenPosition::OnPath(18);
    state.tokens[1][0] = TokenPosition::OnPath(7);
    state.tokens[1][1] = TokenPosition::OnPath(7);

    let rolled = roll_dice_with(&state, 5).unwrap();
    assert!(rolled.valid_moves.is_empty());
    assert_eq!(rolled.active_player, 1);
    assert_eq!(rolled.game_phase, GamePhase::RollDice);
}

#[test]
fn test_three_player_turn_order_wraps() {
    let state = create_initial_state(&[0, 2, 3]).unwrap();
    // Nobody can move on a 2; the turn cycles through the roster.
    let state = roll_dice_with(&state, 2).unwrap();
    assert_eq!(state.active_player, 2);
    let state = roll_dice_with(&state, 2).unwrap();
    assert_eq!(state.active_player, 3);
    let state = roll_dice_with(&state, 2).unwrap();
    assert_eq!(state.active_player, 0);
}

#[test]
fn test_bonus_chain_can_finish_a_match() {
    // Three tokens home; the last one captures, then rides the 20-step
    // bonus into the finish.
    let mut state = create_initial_state(&[0, 1]).unwrap();
    state.tokens[0][0] = TokenPosition::Finished;
    state.tokens[0][1] = TokenPosition::Finished;
    state.tokens[0][2] = TokenPosition::Finished;
    state.tokens[0][3] = TokenPosition::OnPath(32);
    // Victim on absolute 37 (player 1's relative 24).
    state.tokens[1][0] = TokenPosition::OnPath(24);

    let rolled = roll_dice_with(&state, 5).unwrap();
    let capture = rolled
        .valid_moves
        .iter()
        .find(|candidate| !candidate.captures.is_empty())
        .cloned()
        .unwrap();
    let after_capture = complete_move(&move_token(&rolled, &capture).unwrap());
    assert_eq!(after_capture.game_phase, GamePhase::BonusMove);
    assert_eq!(after_capture.dice_value, 20);

    // 37 + 20 = 57: exact entry.
    let finisher = after_capture.valid_moves[0].clone();
    assert!(finisher.is_home);
    let done = complete_move(&move_token(&after_capture, &finisher).unwrap());
    assert_eq!(done.winner, Some(0));
    assert_eq!(done.game_phase, GamePhase::Win);
}

/// Drive a match with random rolls and random legal selections, checking
/// the reachable-state invariants at every step.
fn assert_invariants(state: &GameState, finished_before: &[(usize, usize)]) {
    assert!(state.is_active_color(state.active_player));
    for color in 0..MAX_PLAYERS as u8 {
        if !state.is_active_color(color) {
            assert!(
                state
                    .tokens_of(color)
                    .iter()
                    .all(TokenPosition::is_in_yard),
                "inactive color {color} has tokens on the board"
            );
        }
    }
    for (player, token_index) in finished_before {
        assert!(
            state.tokens[*player][*token_index].is_finished(),
            "finished token moved again"
        );
    }
    match state.game_phase {
        GamePhase::SelectToken | GamePhase::BonusMove => {
            assert!(!state.valid_moves.is_empty())
        }
        GamePhase::RollDice | GamePhase::Win => assert!(state.valid_moves.is_empty()),
    }
    assert_eq!(state.winner.is_some(), state.game_phase == GamePhase::Win);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn playout_upholds_invariants(seed in any::<u64>(), four_players in any::<bool>()) {
        let colors: Vec<u8> = if four_players { vec![0, 1, 2, 3] } else { vec![0, 1] };
        let mut state = create_initial_state(&colors).unwrap();
        let mut rng = DiceRng::new(seed);
        let mut finished: Vec<(usize, usize)> = Vec::new();

        for _ in 0..300 {
            state = match state.game_phase {
                GamePhase::RollDice => roll_dice(&state, &mut rng).unwrap(),
                GamePhase::SelectToken | GamePhase::BonusMove => {
                    let picked = state.valid_moves[rng.pick_index(state.valid_moves.len())].clone();
                    complete_move(&move_token(&state, &picked).unwrap())
                }
                GamePhase::Win => break,
            };
            assert_invariants(&state, &finished);
            for player in 0..MAX_PLAYERS {
                for token_index in 0..TOKENS_PER_PLAYER {
                    let slot = (player, token_index);
                    if state.tokens[player][token_index].is_finished()
                        && !finished.contains(&slot)
                    {
                        finished.push(slot);
                    }
                }
            }
        }
    }
}
