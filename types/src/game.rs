//! Authoritative game state for a four-color token race match.
//!
//! Token positions are tagged values but serialize as plain integers so that
//! clients receive the compact encoding the frontend consumes:
//! `-1` = in yard, `0..=56` = relative path index, `58` = finished.
//! All path arithmetic is relative to the owning player's own path, where
//! index 0 is that player's start cell.

use serde::{Deserialize, Serialize};

/// Cells on the shared loop.
pub const LOOP_CELLS: u8 = 52;

/// Occupiable cells on a player's path: 52 loop cells plus 5 home-stretch
/// cells. The sixth home cell is the finish itself.
pub const PATH_CELLS: u8 = 58;

/// Relative index of the final home cell. Reaching it finishes the token;
/// overshooting it is illegal (exact entry).
pub const FINAL_PATH_INDEX: u8 = PATH_CELLS - 1;

/// First relative index inside the home stretch.
pub const HOME_STRETCH_START: u8 = LOOP_CELLS;

/// Tokens per player.
pub const TOKENS_PER_PLAYER: usize = 4;

/// Maximum player slots on a board.
pub const MAX_PLAYERS: usize = 4;

/// Absolute loop offset of each player slot's start cell.
pub const START_OFFSETS: [u8; MAX_PLAYERS] = [0, 13, 26, 39];

/// Roll required to move a token out of the yard.
pub const ENTRY_ROLL: u8 = 6;

/// Bonus steps credited per captured token.
pub const CAPTURE_BONUS: u16 = 20;

/// Bonus steps credited for bringing a token home.
pub const HOME_BONUS: u16 = 10;

/// Rolling this many sixes in a row forfeits the turn.
pub const MAX_CONSECUTIVE_SIXES: u8 = 3;

/// Wire sentinel for a token still in its yard.
const YARD_SENTINEL: i16 = -1;

/// Wire sentinel for a finished token.
const FINISHED_SENTINEL: i16 = 58;

/// Position of one token along its owner's path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum TokenPosition {
    /// Not yet on the board.
    InYard,
    /// On the owner's path at the given relative index (0 = own start cell).
    OnPath(u8),
    /// Landed exactly on the final home cell.
    Finished,
}

impl TokenPosition {
    /// Relative path index, if the token is on the board.
    pub fn path_index(&self) -> Option<u8> {
        match self {
            TokenPosition::OnPath(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_in_yard(&self) -> bool {
        matches!(self, TokenPosition::InYard)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TokenPosition::Finished)
    }

    /// True when the token sits inside its own home stretch.
    pub fn in_home_stretch(&self) -> bool {
        matches!(self, TokenPosition::OnPath(index) if *index >= HOME_STRETCH_START)
    }
}

impl From<TokenPosition> for i16 {
    fn from(position: TokenPosition) -> Self {
        match position {
            TokenPosition::InYard => YARD_SENTINEL,
            TokenPosition::OnPath(index) => index as i16,
            TokenPosition::Finished => FINISHED_SENTINEL,
        }
    }
}

impl TryFrom<i16> for TokenPosition {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            YARD_SENTINEL => Ok(TokenPosition::InYard),
            FINISHED_SENTINEL => Ok(TokenPosition::Finished),
            index if (0..FINAL_PATH_INDEX as i16).contains(&index) => {
                Ok(TokenPosition::OnPath(index as u8))
            }
            other => Err(format!("invalid token position {other}")),
        }
    }
}

/// Phase of the per-room turn state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    RollDice,
    SelectToken,
    BonusMove,
    Win,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::RollDice => "ROLL_DICE",
            GamePhase::SelectToken => "SELECT_TOKEN",
            GamePhase::BonusMove => "BONUS_MOVE",
            GamePhase::Win => "WIN",
        }
    }

    /// Phases in which a `move_token` message is legal.
    pub fn accepts_move(&self) -> bool {
        matches!(self, GamePhase::SelectToken | GamePhase::BonusMove)
    }
}

/// One opposing token removed by a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEvent {
    /// Slot of the captured token's owner.
    pub player: u8,
    /// Index of the captured token within its owner's set.
    pub token_index: u8,
}

/// Most recent capture, kept for client commentary only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCapture {
    /// Slot of the capturing player.
    pub by: u8,
    /// Slot of the captured token's owner.
    pub player: u8,
    pub token_index: u8,
}

/// A fully-resolved candidate move. Ephemeral: computed per legality check,
/// consumed by the transition function, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCandidate {
    pub token_index: u8,
    pub from_position: TokenPosition,
    pub to_position: TokenPosition,
    /// Cells traversed after `from_position`, destination included.
    pub traverse_path: Vec<TokenPosition>,
    pub is_spawn: bool,
    /// True when the move lands the token on the final home cell.
    pub is_home: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<CaptureEvent>,
}

/// Root aggregate for one match. Owned exclusively by the room's session
/// orchestrator and only ever replaced wholesale by the pure transition
/// functions in `ludovault-execution`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Four positions per slot. Inactive slots stay all-`InYard`.
    pub tokens: [[TokenPosition; TOKENS_PER_PLAYER]; MAX_PLAYERS],
    pub active_player: u8,
    /// Slots actually playing this match, in turn order. Fixed for the
    /// match's lifetime; size 2-4.
    pub active_colors: Vec<u8>,
    pub game_phase: GamePhase,
    /// Last rolled value, or the pending bonus distance during `BONUS_MOVE`.
    pub dice_value: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_moves: Vec<MoveCandidate>,
    pub consecutive_sixes: u8,
    pub bonus_moves: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_capture: Option<LastCapture>,
}

impl GameState {
    pub fn is_active_color(&self, player: u8) -> bool {
        self.active_colors.contains(&player)
    }

    pub fn tokens_of(&self, player: u8) -> &[TokenPosition; TOKENS_PER_PLAYER] {
        &self.tokens[player as usize]
    }

    /// True when every token of `player` has finished.
    pub fn all_tokens_home(&self, player: u8) -> bool {
        self.tokens[player as usize].iter().all(TokenPosition::is_finished)
    }

    /// Count of `player`'s tokens currently on the board.
    pub fn tokens_on_board(&self, player: u8) -> usize {
        self.tokens[player as usize]
            .iter()
            .filter(|position| position.path_index().is_some())
            .count()
    }

    /// Next active color after `player`, wrapping in `active_colors` order.
    pub fn next_active_color(&self, player: u8) -> u8 {
        let index = self
            .active_colors
            .iter()
            .position(|color| *color == player)
            .unwrap_or(0);
        self.active_colors[(index + 1) % self.active_colors.len()]
    }
}
