//! Room and roster records.
//!
//! A room is the unit of session lifecycle: a roster of seats, stake
//! metadata, and the authoritative [`crate::GameState`] owned by the match
//! server's orchestrator. Connection handles themselves never appear here;
//! seats carry only the connection status that gets broadcast to clients.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Created, waiting for the roster to fill.
    Waiting,
    /// All seats taken, match in progress.
    Active,
    /// Match completed with a winner.
    Finished,
    /// Torn down before completion.
    Cancelled,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Active => "active",
            RoomStatus::Finished => "finished",
            RoomStatus::Cancelled => "cancelled",
        }
    }
}

/// One roster slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSeat {
    /// Wallet address the seat is keyed by; reattachment matches on it.
    pub address: String,
    pub name: String,
    /// Player slot (color) on the board, 0..=3.
    pub slot: u8,
    pub connected: bool,
    pub is_ai: bool,
    /// Consecutive timeouts/absences. Reset by any genuine action.
    pub skip_count: u8,
    /// Forfeited seats stop receiving turns; their tokens stay in place.
    pub forfeited: bool,
}

impl PlayerSeat {
    pub fn human(address: impl Into<String>, name: impl Into<String>, slot: u8) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            slot,
            connected: false,
            is_ai: false,
            skip_count: 0,
            forfeited: false,
        }
    }

    pub fn ai(slot: u8) -> Self {
        Self {
            address: format!("ai-{slot}"),
            name: format!("Bot {}", slot + 1),
            slot,
            connected: true,
            is_ai: true,
            skip_count: 0,
            forfeited: false,
        }
    }
}

/// Room metadata as persisted and broadcast. The live `GameState` rides
/// alongside this record inside the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub id: String,
    pub status: RoomStatus,
    /// Stake per seat, in the vault's smallest unit.
    pub stake: u64,
    pub max_players: u8,
    pub created_at_ms: u64,
    pub seats: Vec<PlayerSeat>,
}

impl RoomRecord {
    pub fn seat_by_address(&self, address: &str) -> Option<&PlayerSeat> {
        self.seats.iter().find(|seat| seat.address == address)
    }

    pub fn seat_by_address_mut(&mut self, address: &str) -> Option<&mut PlayerSeat> {
        self.seats.iter_mut().find(|seat| seat.address == address)
    }

    pub fn seat_by_slot(&self, slot: u8) -> Option<&PlayerSeat> {
        self.seats.iter().find(|seat| seat.slot == slot)
    }

    pub fn seat_by_slot_mut(&mut self, slot: u8) -> Option<&mut PlayerSeat> {
        self.seats.iter_mut().find(|seat| seat.slot == slot)
    }

    /// Connected seats, AI seats excluded.
    pub fn connected_humans(&self) -> usize {
        self.seats
            .iter()
            .filter(|seat| !seat.is_ai && seat.connected)
            .count()
    }

    /// Total pot owed to the winner.
    pub fn pot(&self) -> u64 {
        self.stake.saturating_mul(self.max_players as u64)
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.max_players as usize
    }
}
