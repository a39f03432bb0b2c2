//! Common types for the ludovault match platform.
//!
//! Defines the game state, room/roster records, and the JSON wire messages
//! shared between the execution layer and the match server. This crate is
//! pure data: all game-rule logic lives in `ludovault-execution`, and all
//! I/O lives in the match server.

pub mod api;
pub mod game;
pub mod room;

pub use api::{ClientMessage, CreateRoomRequest, CreateRoomResponse, PayoutTicket, ServerMessage};
pub use game::{
    CaptureEvent, GamePhase, GameState, LastCapture, MoveCandidate, TokenPosition, CAPTURE_BONUS,
    ENTRY_ROLL, FINAL_PATH_INDEX, HOME_BONUS, HOME_STRETCH_START, LOOP_CELLS, MAX_CONSECUTIVE_SIXES,
    MAX_PLAYERS, PATH_CELLS, START_OFFSETS, TOKENS_PER_PLAYER,
};
pub use room::{PlayerSeat, RoomRecord, RoomStatus};
